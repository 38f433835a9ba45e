use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::engine::core::buffer::{BufferedColumnStore, StoreHandle};
use crate::engine::core::column::compression::CompressMode;
use crate::engine::core::column::{ColumnId, RowSchema};
use crate::engine::core::memory::MemoryPool;
use crate::engine::errors::PostingError;
use crate::shared::config::{MemoryConfig, PostingConfig};

/// Layout of a skip entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipListKind {
    /// (key, value)
    Pair,
    /// (key, total term frequency, value)
    Triple,
}

/// Columns of a skip-list store, rebuilt identically by readers.
#[derive(Debug, Clone)]
pub struct SkipColumns {
    pub schema: Arc<RowSchema>,
    pub key: ColumnId<u32>,
    pub ttf: Option<ColumnId<u32>>,
    pub value: ColumnId<u32>,
}

impl SkipListKind {
    pub fn columns(self) -> Result<SkipColumns, PostingError> {
        let mut b = RowSchema::builder();
        let key = b.column::<u32>();
        let ttf = match self {
            SkipListKind::Pair => None,
            SkipListKind::Triple => Some(b.column::<u32>()),
        };
        let value = b.column::<u32>();
        Ok(SkipColumns {
            schema: b.build()?,
            key,
            ttf,
            value,
        })
    }
}

/// What a reader needs to snapshot a live skip list.
#[derive(Debug, Clone)]
pub struct SkipListHandle {
    pub store: StoreHandle,
    pub kind: SkipListKind,
    pub reference: bool,
}

/// Appends skip entries for one indexed stream.
///
/// Callers pass absolute keys and values; entries are stored as deltas
/// against the previous entry, or raw under reference compression.
#[derive(Debug)]
pub struct SkipListWriter {
    kind: SkipListKind,
    reference: bool,
    columns: SkipColumns,
    store: BufferedColumnStore,
    block_size: usize,
    short_list_max: usize,
    items: usize,
    last_key: u32,
    last_ttf: u32,
    last_value: u32,
}

impl SkipListWriter {
    pub fn new(
        kind: SkipListKind,
        reference: bool,
        posting: &PostingConfig,
        memory: &MemoryConfig,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        let columns = kind.columns()?;
        let store = BufferedColumnStore::new(Arc::clone(&columns.schema), pool, memory);
        Ok(Self {
            kind,
            reference,
            columns,
            store,
            block_size: posting.skip_block_size,
            short_list_max: posting.short_list_max_skip_items,
            items: 0,
            last_key: 0,
            last_ttf: 0,
            last_value: 0,
        })
    }

    #[inline]
    pub fn kind(&self) -> SkipListKind {
        self.kind
    }

    #[inline]
    pub fn item_count(&self) -> usize {
        self.items
    }

    pub fn handle(&self) -> SkipListHandle {
        SkipListHandle {
            store: self.store.handle(),
            kind: self.kind,
            reference: self.reference,
        }
    }

    pub fn add_item(&mut self, key: u32, value: u32) -> Result<(), PostingError> {
        if self.kind != SkipListKind::Pair {
            return Err(PostingError::InvalidFormat(
                "pair item added to a triple skip list".into(),
            ));
        }
        self.push_entry(key, None, value)
    }

    pub fn add_triple_item(&mut self, key: u32, ttf: u32, value: u32) -> Result<(), PostingError> {
        if self.kind != SkipListKind::Triple {
            return Err(PostingError::InvalidFormat(
                "triple item added to a pair skip list".into(),
            ));
        }
        self.push_entry(key, Some(ttf), value)
    }

    fn encoded(&self, current: u32, last: u32) -> Result<u32, PostingError> {
        if self.reference {
            return Ok(current);
        }
        current
            .checked_sub(last)
            .ok_or(PostingError::OutOfOrder {
                previous: last as u64,
                current: current as u64,
            })
    }

    fn push_entry(&mut self, key: u32, ttf: Option<u32>, value: u32) -> Result<(), PostingError> {
        let key_cell = self.encoded(key, self.last_key)?;
        let value_cell = self.encoded(value, self.last_value)?;
        let ttf_cell = ttf.map(|t| self.encoded(t, self.last_ttf)).transpose()?;

        self.store.push_back(self.columns.key, key_cell)?;
        if let (Some(column), Some(cell)) = (self.columns.ttf, ttf_cell) {
            self.store.push_back(column, cell)?;
        }
        self.store.push_back(self.columns.value, value_cell)?;
        self.store.end_push_back()?;

        self.last_key = key;
        self.last_value = value;
        if let Some(t) = ttf {
            self.last_ttf = t;
        }
        self.items += 1;

        if self.store.need_flush(self.block_size) {
            self.store
                .flush(CompressMode::for_inline_flush(self.reference))?;
        }
        Ok(())
    }

    /// Compresses the remaining entries. Returns the bytes emitted.
    pub fn finish(&mut self) -> Result<usize, PostingError> {
        let mode = CompressMode::for_final_flush(
            self.reference,
            self.items,
            self.short_list_max,
            self.store.flush_info().flush_count() > 0,
        );
        let emitted = self.store.flush(mode)?;
        debug!(
            target = "postings::skip_list",
            kind = ?self.kind,
            items = self.items,
            mode = ?mode,
            bytes = self.store.dump_length(),
            "Finished skip list"
        );
        Ok(emitted)
    }

    #[inline]
    pub fn dump_length(&self) -> usize {
        self.store.dump_length()
    }

    pub fn dump<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), PostingError> {
        self.store.dump(writer)
    }
}
