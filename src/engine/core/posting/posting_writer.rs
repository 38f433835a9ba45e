use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::doc_list_encoder::{DocListEncoder, DocListReader};
use crate::engine::core::posting::in_mem_doc_list_decoder::InMemDocListDecoder;
use crate::engine::core::posting::in_mem_position_list_decoder::InMemPositionListDecoder;
use crate::engine::core::posting::position_list_encoder::{PositionListEncoder, PositionListReader};
use crate::engine::core::posting::posting_format::{
    DocListFormat, PositionListFormat, PostingOptions, TermMeta,
};
use crate::engine::errors::PostingError;
use crate::shared::config::{MemoryConfig, PostingConfig};

/// Postings of one term: a doc list plus, when the options ask for it, a
/// position list kept in step with it.
#[derive(Debug)]
pub struct PostingWriter {
    options: PostingOptions,
    doc: DocListEncoder,
    positions: Option<PositionListEncoder>,
    doc_positions: u32,
}

impl PostingWriter {
    pub fn new(
        options: PostingOptions,
        posting: &PostingConfig,
        memory: &MemoryConfig,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        posting.validate()?;
        memory.validate()?;
        let doc_format = Arc::new(DocListFormat::new(options)?);
        let positions = PositionListFormat::from_options(options)?
            .map(|format| PositionListEncoder::new(Arc::new(format), posting, memory, pool));
        debug!(
            target = "postings::writer",
            options = ?options,
            pool = pool.name(),
            "Created posting writer"
        );
        Ok(Self {
            options,
            doc: DocListEncoder::new(doc_format, posting, memory, pool),
            positions,
            doc_positions: 0,
        })
    }

    #[inline]
    pub fn options(&self) -> PostingOptions {
        self.options
    }

    #[inline]
    pub fn has_position_list(&self) -> bool {
        self.positions.is_some()
    }

    pub fn doc_format(&self) -> &Arc<DocListFormat> {
        self.doc.format()
    }

    pub fn position_format(&self) -> Option<&Arc<PositionListFormat>> {
        self.positions.as_ref().map(PositionListEncoder::format)
    }

    pub fn add_position(
        &mut self,
        pos: u32,
        pos_payload: u8,
        field_idx: u8,
    ) -> Result<(), PostingError> {
        self.doc.check_field(field_idx)?;
        if let Some(positions) = self.positions.as_mut() {
            positions.add_position(pos, pos_payload)?;
        }
        self.doc.add_position(field_idx)?;
        self.doc_positions += 1;
        Ok(())
    }

    pub fn end_document(&mut self, doc_id: u32, doc_payload: u16) -> Result<(), PostingError> {
        if self.positions.is_some() && self.doc_positions == 0 {
            return Err(PostingError::InvalidFormat(format!(
                "document {doc_id} has no positions"
            )));
        }
        self.doc.end_document(doc_id, doc_payload)?;
        if let Some(positions) = self.positions.as_mut() {
            positions.end_document();
        }
        self.doc_positions = 0;
        Ok(())
    }

    /// Final flush of both lists.
    pub fn end_segment(&mut self) -> Result<(), PostingError> {
        self.doc.flush()?;
        if let Some(positions) = self.positions.as_mut() {
            positions.flush()?;
        }
        let meta = self.doc.term_meta();
        info!(
            target = "postings::writer",
            df = meta.df,
            total_tf = meta.total_tf,
            bytes = self.dump_length(),
            "Posting list complete"
        );
        Ok(())
    }

    pub fn set_term_payload(&mut self, payload: u32) {
        self.doc.set_term_payload(payload);
    }

    pub fn term_meta(&self) -> TermMeta {
        self.doc.term_meta()
    }

    pub fn dump_length(&self) -> usize {
        self.doc.dump_length() + self.positions.as_ref().map_or(0, PositionListEncoder::dump_length)
    }

    /// Doc list dump followed by the position list dump.
    pub fn dump<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), PostingError> {
        self.doc.dump(writer)?;
        if let Some(positions) = &self.positions {
            positions.dump(writer)?;
        }
        Ok(())
    }

    pub fn doc_list_reader(&self) -> DocListReader {
        self.doc.reader()
    }

    pub fn position_list_reader(&self) -> Option<PositionListReader> {
        self.positions.as_ref().map(PositionListEncoder::reader)
    }

    pub fn in_mem_doc_decoder(
        &self,
        pool: &Arc<MemoryPool>,
    ) -> Result<InMemDocListDecoder, PostingError> {
        self.doc.in_mem_decoder(pool)
    }

    /// `None` without a position list.
    pub fn in_mem_position_decoder(
        &self,
        pool: &Arc<MemoryPool>,
    ) -> Result<Option<InMemPositionListDecoder>, PostingError> {
        self.positions
            .as_ref()
            .map(|positions| positions.in_mem_decoder(pool))
            .transpose()
    }
}
