use bytes::Bytes;

use crate::engine::core::column::compression::ByteRead;
use crate::engine::core::posting::position_bitmap::PositionBitmapReader;
use crate::engine::core::posting::posting_format::DocListFormat;
use crate::engine::errors::PostingError;

/// Reads the two length prefixes of a dump and returns
/// `(header length, first section length, second section length)`.
fn split_header(data: &Bytes) -> Result<(usize, usize, usize), PostingError> {
    let mut src: &[u8] = data;
    let first = src.read_vuint32()? as usize;
    let second = src.read_vuint32()? as usize;
    let header = data.len() - src.len();
    if header + first + second > data.len() {
        return Err(PostingError::corruption(format!(
            "dump sections of {first} + {second} bytes exceed {} available",
            data.len() - header
        )));
    }
    Ok((header, first, second))
}

/// Sections of a dumped doc list.
#[derive(Debug, Clone)]
pub struct DocListDump {
    pub skip: Bytes,
    pub doc: Bytes,
    pub bitmap: Option<Bytes>,
    /// Bytes of `data` the dump occupies.
    pub len: usize,
}

impl DocListDump {
    pub fn parse(data: &Bytes, format: &DocListFormat) -> Result<Self, PostingError> {
        let (header, skip_len, doc_len) = split_header(data)?;
        let doc_start = header + skip_len;
        let mut len = doc_start + doc_len;

        let bitmap = if format.has_tf_bitmap() {
            let mut src: &[u8] = &data[len..];
            let body = src.read_u32_le()? as usize;
            let end = len + 4 + body;
            if end > data.len() {
                return Err(PostingError::corruption(format!(
                    "tf bitmap of {body} bytes truncated"
                )));
            }
            let image = data.slice(len..end);
            len = end;
            Some(image)
        } else {
            None
        };

        Ok(Self {
            skip: data.slice(header..doc_start),
            doc: data.slice(doc_start..doc_start + doc_len),
            bitmap,
            len,
        })
    }

    /// Reader over the tf bitmap section, when present.
    pub fn tf_bitmap(&self, block_docs: usize) -> Result<Option<PositionBitmapReader>, PostingError> {
        self.bitmap
            .as_ref()
            .map(|image| PositionBitmapReader::parse(image, block_docs).map(|(reader, _)| reader))
            .transpose()
    }
}

/// Sections of a dumped position list.
#[derive(Debug, Clone)]
pub struct PositionListDump {
    pub skip: Bytes,
    pub positions: Bytes,
    pub len: usize,
}

impl PositionListDump {
    pub fn parse(data: &Bytes) -> Result<Self, PostingError> {
        let (header, skip_len, pos_len) = split_header(data)?;
        let pos_start = header + skip_len;
        Ok(Self {
            skip: data.slice(header..pos_start),
            positions: data.slice(pos_start..pos_start + pos_len),
            len: pos_start + pos_len,
        })
    }
}

/// A posting writer dump: the doc list, then the position list if any.
#[derive(Debug, Clone)]
pub struct PostingDump {
    pub doc: DocListDump,
    pub positions: Option<PositionListDump>,
    pub len: usize,
}

impl PostingDump {
    pub fn parse(
        data: &Bytes,
        format: &DocListFormat,
        with_positions: bool,
    ) -> Result<Self, PostingError> {
        let doc = DocListDump::parse(data, format)?;
        let mut len = doc.len;
        let positions = if with_positions {
            let dump = PositionListDump::parse(&data.slice(len..))?;
            len += dump.len;
            Some(dump)
        } else {
            None
        };
        Ok(Self {
            doc,
            positions,
            len,
        })
    }
}
