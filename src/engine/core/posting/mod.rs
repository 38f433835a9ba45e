pub mod doc_list_encoder;
pub mod in_mem_doc_list_decoder;
pub mod in_mem_position_list_decoder;
pub mod position_bitmap;
pub mod position_list_encoder;
pub mod posting_dump;
pub mod posting_format;
pub mod posting_writer;

pub use doc_list_encoder::{DocListEncoder, DocListReader};
pub use in_mem_doc_list_decoder::{DocBufferInfo, InMemDocListDecoder};
pub use in_mem_position_list_decoder::InMemPositionListDecoder;
pub use position_bitmap::{BitmapHandle, PositionBitmapReader, PositionBitmapWriter};
pub use position_list_encoder::{PositionListEncoder, PositionListReader};
pub use posting_dump::{DocListDump, PositionListDump, PostingDump};
pub use posting_format::{
    DocColumns, DocListFormat, PositionColumns, PositionListFormat, PostingOptions, TermMeta,
    TfEncoding,
};
pub use posting_writer::PostingWriter;

#[cfg(test)]
mod in_mem_doc_list_decoder_test;
#[cfg(test)]
mod position_list_encoder_test;
#[cfg(test)]
mod posting_dump_test;
