use std::io::Write;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::engine::core::buffer::{BufferedColumnStore, StoreHandle};
use crate::engine::core::column::compression::{CompressMode, VarIntWrite, vuint_len};
use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::in_mem_position_list_decoder::InMemPositionListDecoder;
use crate::engine::core::posting::posting_format::PositionListFormat;
use crate::engine::core::skiplist::{SkipListHandle, SkipListKind, SkipListWriter};
use crate::engine::errors::PostingError;
use crate::shared::config::{MemoryConfig, PostingConfig};

#[derive(Debug)]
pub struct PositionListShared {
    pub(crate) format: Arc<PositionListFormat>,
    pub(crate) store: StoreHandle,
    pub(crate) skip: OnceLock<SkipListHandle>,
}

/// Cloneable, thread-safe reader side of a [`PositionListEncoder`].
#[derive(Debug, Clone)]
pub struct PositionListReader(Arc<PositionListShared>);

impl PositionListReader {
    pub fn format(&self) -> &Arc<PositionListFormat> {
        &self.0.format
    }

    pub fn in_mem_decoder(
        &self,
        pool: &Arc<MemoryPool>,
    ) -> Result<InMemPositionListDecoder, PostingError> {
        InMemPositionListDecoder::open(&self.0, pool)
    }
}

/// Builds the position list of one term. Positions are stored as deltas
/// within a document; the first position of every document is absolute.
#[derive(Debug)]
pub struct PositionListEncoder {
    format: Arc<PositionListFormat>,
    posting: PostingConfig,
    memory: MemoryConfig,
    pool: Arc<MemoryPool>,
    store: BufferedColumnStore,
    shared: Arc<PositionListShared>,
    skip: Option<SkipListWriter>,
    last_pos: Option<u32>,
    total_positions: u32,
}

impl PositionListEncoder {
    pub fn new(
        format: Arc<PositionListFormat>,
        posting: &PostingConfig,
        memory: &MemoryConfig,
        pool: &Arc<MemoryPool>,
    ) -> Self {
        let store = BufferedColumnStore::new(Arc::clone(&format.columns().schema), pool, memory);
        let shared = Arc::new(PositionListShared {
            format: Arc::clone(&format),
            store: store.handle(),
            skip: OnceLock::new(),
        });
        Self {
            format,
            posting: posting.clone(),
            memory: memory.clone(),
            pool: Arc::clone(pool),
            store,
            shared,
            skip: None,
            last_pos: None,
            total_positions: 0,
        }
    }

    pub fn format(&self) -> &Arc<PositionListFormat> {
        &self.format
    }

    #[inline]
    pub fn total_positions(&self) -> u32 {
        self.total_positions
    }

    pub fn add_position(&mut self, pos: u32, payload: u8) -> Result<(), PostingError> {
        let cell = match self.last_pos {
            None => pos,
            Some(last) => pos.checked_sub(last).ok_or(PostingError::OutOfOrder {
                previous: last as u64,
                current: pos as u64,
            })?,
        };
        let cols = self.format.columns();
        let (pos_col, payload_col) = (cols.position, cols.payload);

        self.store.push_back(pos_col, cell)?;
        if let Some(column) = payload_col {
            self.store.push_back(column, payload)?;
        }
        self.store.end_push_back()?;

        self.last_pos = Some(pos);
        self.total_positions += 1;

        if self.store.need_flush(self.posting.pos_block_size) {
            self.flush_block(CompressMode::Block)?;
        }
        Ok(())
    }

    pub fn end_document(&mut self) {
        self.last_pos = None;
    }

    fn flush_block(&mut self, mode: CompressMode) -> Result<(), PostingError> {
        let emitted = self.store.flush(mode)?;
        if emitted == 0 || mode == CompressMode::ShortList {
            return Ok(());
        }

        if self.skip.is_none() {
            let writer = SkipListWriter::new(
                SkipListKind::Pair,
                false,
                &self.posting,
                &self.memory,
                &self.pool,
            )?;
            self.shared
                .skip
                .set(writer.handle())
                .map_err(|_| PostingError::corruption("position skip list created twice"))?;
            debug!(
                target = "postings::position_list",
                positions = self.total_positions,
                "Created position skip list"
            );
            self.skip = Some(writer);
        }

        let end = self.store.flush_info().flush_length() as u32;
        if let Some(skip) = self.skip.as_mut() {
            skip.add_item(self.total_positions, end)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PostingError> {
        let mode = CompressMode::for_final_flush(
            false,
            self.total_positions as usize,
            self.posting.short_list_max_positions,
            self.store.flush_info().flush_count() > 0,
        );
        self.flush_block(mode)?;
        if let Some(skip) = self.skip.as_mut() {
            skip.finish()?;
        }
        debug!(
            target = "postings::position_list",
            positions = self.total_positions,
            mode = ?mode,
            bytes = self.store.dump_length(),
            "Flushed position list"
        );
        Ok(())
    }

    fn skip_length(&self) -> usize {
        self.skip.as_ref().map_or(0, SkipListWriter::dump_length)
    }

    pub fn dump_length(&self) -> usize {
        let skip = self.skip_length();
        let positions = self.store.dump_length();
        vuint_len(skip as u64) + vuint_len(positions as u64) + skip + positions
    }

    /// `VUInt32 skipLen | VUInt32 posLen | skip | positions`
    pub fn dump<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), PostingError> {
        writer.write_vuint32(self.skip_length() as u32)?;
        writer.write_vuint32(self.store.dump_length() as u32)?;
        if let Some(skip) = &self.skip {
            skip.dump(writer)?;
        }
        self.store.dump(writer)
    }

    pub fn reader(&self) -> PositionListReader {
        PositionListReader(Arc::clone(&self.shared))
    }

    pub fn in_mem_decoder(
        &self,
        pool: &Arc<MemoryPool>,
    ) -> Result<InMemPositionListDecoder, PostingError> {
        self.reader().in_mem_decoder(pool)
    }
}
