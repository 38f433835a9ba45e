pub mod column_codec;
pub mod compress_mode;
pub mod vint;

pub use column_codec::{ColumnCodec, MAX_BLOCK_VALUES, codec_for, decode_block};
pub use compress_mode::CompressMode;
pub use vint::{
    ByteRead, MAX_VUINT32_LEN, MAX_VUINT64_LEN, VarIntWrite, encode_vuint32, encode_vuint64,
    vuint_len, vuint64_bytes,
};

#[cfg(test)]
mod compress_mode_test;
