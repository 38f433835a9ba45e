use crate::engine::core::column::compression::compress_mode::CompressMode;
use crate::engine::core::column::compression::vint::{ByteRead, encode_vuint32, encode_vuint64};
use crate::engine::core::column::format::ScalarType;
use crate::engine::errors::PostingError;

/// Largest number of values one column block may carry.
pub const MAX_BLOCK_VALUES: usize = 128;

/// Encoder/decoder for one (scalar type, mode) pair.
///
/// A block is `[mode tag][VUInt32 count][body]`; the body layout is codec
/// specific. Blocks are self-describing, so a reader only needs the column's
/// scalar type to decode one.
pub trait ColumnCodec: Send + Sync {
    fn mode(&self) -> CompressMode;

    fn scalar(&self) -> ScalarType;

    /// Appends one block for `values` to `dst`, returning the bytes written.
    fn encode(&self, values: &[u64], dst: &mut Vec<u8>) -> Result<usize, PostingError>;

    /// Reads a block body of `count` values; the header is already consumed.
    fn decode_body(
        &self,
        src: &mut dyn ByteRead,
        count: usize,
        out: &mut Vec<u64>,
    ) -> Result<(), PostingError>;
}

fn write_header(mode: CompressMode, values: &[u64], dst: &mut Vec<u8>) -> Result<(), PostingError> {
    if values.len() > MAX_BLOCK_VALUES {
        return Err(PostingError::corruption(format!(
            "block of {} values exceeds {MAX_BLOCK_VALUES}",
            values.len()
        )));
    }
    dst.push(mode.into());
    encode_vuint32(values.len() as u32, dst);
    Ok(())
}

#[inline]
fn bit_width(max: u64) -> u8 {
    (64 - max.leading_zeros()) as u8
}

fn pack_bits(values: impl Iterator<Item = u64>, width: u8, dst: &mut Vec<u8>) {
    if width == 0 {
        return;
    }
    let width = width as u32;
    let mut acc: u128 = 0;
    let mut bits = 0u32;
    for v in values {
        acc |= (v as u128) << bits;
        bits += width;
        while bits >= 8 {
            dst.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        dst.push(acc as u8);
    }
}

fn unpack_bits(
    src: &mut dyn ByteRead,
    count: usize,
    width: u8,
    base: u64,
    out: &mut Vec<u64>,
) -> Result<(), PostingError> {
    if width > 64 {
        return Err(PostingError::corruption(format!("bit width {width} > 64")));
    }
    if width == 0 {
        out.extend(std::iter::repeat_n(base, count));
        return Ok(());
    }
    let width = width as u32;
    let mut packed = vec![0u8; (count * width as usize).div_ceil(8)];
    src.read_exact_into(&mut packed)?;

    let mask = if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    let mut bytes = packed.iter();
    let mut acc: u128 = 0;
    let mut bits = 0u32;
    for _ in 0..count {
        while bits < width {
            let b = bytes
                .next()
                .ok_or_else(|| PostingError::corruption("packed body truncated"))?;
            acc |= (*b as u128) << bits;
            bits += 8;
        }
        let v = (acc as u64) & mask;
        out.push(base.checked_add(v).ok_or_else(|| {
            PostingError::corruption("frame-of-reference value overflows u64")
        })?);
        acc >>= width;
        bits -= width;
    }
    Ok(())
}

pub struct ShortListCodec {
    scalar: ScalarType,
}

impl ColumnCodec for ShortListCodec {
    fn mode(&self) -> CompressMode {
        CompressMode::ShortList
    }

    fn scalar(&self) -> ScalarType {
        self.scalar
    }

    fn encode(&self, values: &[u64], dst: &mut Vec<u8>) -> Result<usize, PostingError> {
        let start = dst.len();
        write_header(self.mode(), values, dst)?;
        for &v in values {
            encode_vuint64(v, dst);
        }
        Ok(dst.len() - start)
    }

    fn decode_body(
        &self,
        src: &mut dyn ByteRead,
        count: usize,
        out: &mut Vec<u64>,
    ) -> Result<(), PostingError> {
        for _ in 0..count {
            out.push(src.read_vuint64()?);
        }
        Ok(())
    }
}

pub struct BlockCodec {
    scalar: ScalarType,
}

impl ColumnCodec for BlockCodec {
    fn mode(&self) -> CompressMode {
        CompressMode::Block
    }

    fn scalar(&self) -> ScalarType {
        self.scalar
    }

    fn encode(&self, values: &[u64], dst: &mut Vec<u8>) -> Result<usize, PostingError> {
        let start = dst.len();
        write_header(self.mode(), values, dst)?;
        let width = bit_width(values.iter().copied().max().unwrap_or(0));
        dst.push(width);
        pack_bits(values.iter().copied(), width, dst);
        Ok(dst.len() - start)
    }

    fn decode_body(
        &self,
        src: &mut dyn ByteRead,
        count: usize,
        out: &mut Vec<u64>,
    ) -> Result<(), PostingError> {
        let width = src.read_u8()?;
        unpack_bits(src, count, width, 0, out)
    }
}

pub struct ReferenceCodec {
    scalar: ScalarType,
}

impl ColumnCodec for ReferenceCodec {
    fn mode(&self) -> CompressMode {
        CompressMode::Reference
    }

    fn scalar(&self) -> ScalarType {
        self.scalar
    }

    fn encode(&self, values: &[u64], dst: &mut Vec<u8>) -> Result<usize, PostingError> {
        let start = dst.len();
        write_header(self.mode(), values, dst)?;
        let base = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);
        encode_vuint64(base, dst);
        let width = bit_width(max - base);
        dst.push(width);
        pack_bits(values.iter().map(|v| v - base), width, dst);
        Ok(dst.len() - start)
    }

    fn decode_body(
        &self,
        src: &mut dyn ByteRead,
        count: usize,
        out: &mut Vec<u64>,
    ) -> Result<(), PostingError> {
        let base = src.read_vuint64()?;
        let width = src.read_u8()?;
        unpack_bits(src, count, width, base, out)
    }
}

macro_rules! codec_statics {
    ($($name:ident: $codec:ident($scalar:expr);)*) => {
        $(static $name: $codec = $codec { scalar: $scalar };)*
    };
}

codec_statics! {
    SHORT_U8: ShortListCodec(ScalarType::U8);
    SHORT_U16: ShortListCodec(ScalarType::U16);
    SHORT_U32: ShortListCodec(ScalarType::U32);
    SHORT_U64: ShortListCodec(ScalarType::U64);
    BLOCK_U8: BlockCodec(ScalarType::U8);
    BLOCK_U16: BlockCodec(ScalarType::U16);
    BLOCK_U32: BlockCodec(ScalarType::U32);
    BLOCK_U64: BlockCodec(ScalarType::U64);
    REF_U8: ReferenceCodec(ScalarType::U8);
    REF_U16: ReferenceCodec(ScalarType::U16);
    REF_U32: ReferenceCodec(ScalarType::U32);
    REF_U64: ReferenceCodec(ScalarType::U64);
}

/// Compressor registry keyed by (scalar type, mode).
pub fn codec_for(scalar: ScalarType, mode: CompressMode) -> &'static dyn ColumnCodec {
    match (mode, scalar) {
        (CompressMode::ShortList, ScalarType::U8) => &SHORT_U8,
        (CompressMode::ShortList, ScalarType::U16) => &SHORT_U16,
        (CompressMode::ShortList, ScalarType::U32) => &SHORT_U32,
        (CompressMode::ShortList, ScalarType::U64) => &SHORT_U64,
        (CompressMode::Block, ScalarType::U8) => &BLOCK_U8,
        (CompressMode::Block, ScalarType::U16) => &BLOCK_U16,
        (CompressMode::Block, ScalarType::U32) => &BLOCK_U32,
        (CompressMode::Block, ScalarType::U64) => &BLOCK_U64,
        (CompressMode::Reference, ScalarType::U8) => &REF_U8,
        (CompressMode::Reference, ScalarType::U16) => &REF_U16,
        (CompressMode::Reference, ScalarType::U32) => &REF_U32,
        (CompressMode::Reference, ScalarType::U64) => &REF_U64,
    }
}

/// Decodes one self-describing block of a `scalar` column, appending to
/// `out`. Returns the block's mode and value count.
pub fn decode_block(
    scalar: ScalarType,
    src: &mut dyn ByteRead,
    out: &mut Vec<u64>,
) -> Result<(CompressMode, usize), PostingError> {
    let tag = src.read_u8()?;
    let mode = CompressMode::try_from(tag)
        .map_err(|t| PostingError::corruption(format!("unknown compress mode tag {t}")))?;
    let count = src.read_vuint32()? as usize;
    if count > MAX_BLOCK_VALUES {
        return Err(PostingError::corruption(format!(
            "block count {count} exceeds {MAX_BLOCK_VALUES}"
        )));
    }

    let start = out.len();
    codec_for(scalar, mode).decode_body(src, count, out)?;

    let max = scalar.max_value();
    if let Some(bad) = out[start..].iter().find(|v| **v > max) {
        return Err(PostingError::corruption(format!(
            "value {bad} does not fit {scalar:?}"
        )));
    }
    Ok((mode, count))
}
