use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::engine::core::buffer::byte_slice_list::{ByteSliceList, ColdHandle, ColdView};
use crate::engine::core::buffer::flush_info::{AtomicFlushInfo, FlushInfo};
use crate::engine::core::column::compression::CompressMode;
use crate::engine::core::column::format::{ColumnId, ColumnValue};
use crate::engine::core::column::hot_buffer::{HotBuffer, HotBufferShared, HotBufferSnapshot};
use crate::engine::core::column::row_schema::RowSchema;
use crate::engine::core::memory::MemoryPool;
use crate::engine::errors::PostingError;
use crate::shared::config::MemoryConfig;

/// A hot buffer of recent rows in front of an append-only compressed store.
///
/// Rows are pushed column by column into the hot buffer; [`flush`](Self::flush)
/// compresses them, one block per column in schema order, into the cold
/// store and publishes the new [`FlushInfo`]. The owner is the only writer,
/// readers snapshot through a [`StoreHandle`].
#[derive(Debug)]
pub struct BufferedColumnStore {
    schema: Arc<RowSchema>,
    hot: HotBuffer,
    cold: ByteSliceList,
    info: FlushInfo,
    shared: Arc<BufferedStoreShared>,
    scratch: Vec<u8>,
    values: Vec<u64>,
}

impl BufferedColumnStore {
    pub fn new(schema: Arc<RowSchema>, pool: &Arc<MemoryPool>, memory: &MemoryConfig) -> Self {
        let hot = HotBuffer::new(Arc::clone(&schema), pool);
        let cold = ByteSliceList::new(pool, memory);
        let shared = Arc::new(BufferedStoreShared {
            schema: Arc::clone(&schema),
            hot: hot.handle(),
            cold: cold.handle(),
            info: AtomicFlushInfo::default(),
        });
        Self {
            schema,
            hot,
            cold,
            info: FlushInfo::new(),
            shared,
            scratch: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    #[inline]
    pub fn push_back<T: ColumnValue>(
        &mut self,
        column: ColumnId<T>,
        value: T,
    ) -> Result<(), PostingError> {
        self.hot.push_back(column, value)
    }

    pub fn end_push_back(&mut self) -> Result<(), PostingError> {
        self.hot.end_push_back()?;
        if !self.info.is_valid_short_buffer() {
            self.info.set_valid_short_buffer(true);
            self.shared.info.store(self.info);
        }
        Ok(())
    }

    /// Rows buffered in the hot buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.hot.size()
    }

    #[inline]
    pub fn need_flush(&self, threshold: usize) -> bool {
        self.hot.size() >= threshold
    }

    /// Rows ever pushed, flushed or buffered.
    pub fn total_count(&self) -> u64 {
        self.info.flush_count() + self.hot.size() as u64
    }

    #[inline]
    pub fn flush_info(&self) -> FlushInfo {
        self.info
    }

    /// Compresses the hot rows into the cold store with `mode`.
    /// Returns the bytes emitted, 0 when nothing was buffered.
    pub fn flush(&mut self, mode: CompressMode) -> Result<usize, PostingError> {
        let rows = self.hot.size();
        if rows == 0 {
            return Ok(0);
        }

        self.scratch.clear();
        for desc in self.schema.columns() {
            self.values.clear();
            self.hot.read_column(desc.index, &mut self.values);
            desc.codec(mode).encode(&self.values, &mut self.scratch)?;
        }
        let emitted = self.scratch.len();

        let mut info = self.info;
        info.set_flush_count(info.flush_count() + rows as u64)?;
        info.set_flush_length(self.cold.len() + emitted)?;
        info.set_compress_mode(mode);
        info.set_valid_short_buffer(false);

        self.cold.write(&self.scratch)?;
        self.cold.publish()?;
        self.info = info;
        self.shared.info.store(info);
        self.hot.clear();

        debug!(
            target = "postings::buffered_store",
            rows,
            bytes = emitted,
            mode = ?mode,
            flush_count = info.flush_count(),
            flush_length = info.flush_length(),
            "Flushed hot buffer"
        );
        Ok(emitted)
    }

    pub fn handle(&self) -> StoreHandle {
        StoreHandle(Arc::clone(&self.shared))
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.shared.snapshot()
    }

    /// Length of the flushed region, the bytes [`dump`](Self::dump) writes.
    #[inline]
    pub fn dump_length(&self) -> usize {
        self.info.flush_length()
    }

    pub fn dump<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), PostingError> {
        self.cold
            .snapshot()
            .truncated(self.info.flush_length())
            .write_to(writer)?;
        Ok(())
    }

    /// Bytes this store has charged to its pool.
    pub fn cold_allocated(&self) -> usize {
        self.cold.allocated()
    }
}

#[derive(Debug)]
pub struct BufferedStoreShared {
    schema: Arc<RowSchema>,
    hot: Arc<HotBufferShared>,
    cold: ColdHandle,
    info: AtomicFlushInfo,
}

impl BufferedStoreShared {
    fn snapshot(&self) -> StoreSnapshot {
        let info = self.info.load();
        let cold = self.cold.snapshot_bounded(info.flush_length());
        let hot = if info.is_valid_short_buffer() {
            self.hot.snapshot()
        } else {
            HotBufferSnapshot::empty(&self.schema)
        };

        let mut again = self.info.load();
        if again.flush_length() != info.flush_length() || again.flush_count() != info.flush_count()
        {
            // A flush moved the copied rows into the cold region.
            trace!(
                target = "postings::buffered_store",
                before = info.flush_count(),
                after = again.flush_count(),
                "Snapshot raced with flush, dropping hot copy"
            );
            again.set_valid_short_buffer(false);
            return StoreSnapshot {
                schema: Arc::clone(&self.schema),
                cold: self.cold.snapshot_bounded(again.flush_length()),
                flush_info: again,
                hot: HotBufferSnapshot::empty(&self.schema),
            };
        }

        StoreSnapshot {
            schema: Arc::clone(&self.schema),
            cold,
            flush_info: info,
            hot,
        }
    }
}

/// Cloneable reader handle of a [`BufferedColumnStore`].
#[derive(Debug, Clone)]
pub struct StoreHandle(Arc<BufferedStoreShared>);

impl StoreHandle {
    pub fn snapshot(&self) -> StoreSnapshot {
        self.0.snapshot()
    }

    pub fn flush_info(&self) -> FlushInfo {
        self.0.info.load()
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.0.schema
    }
}

/// Stable, private view of a store: a bounded cold prefix plus an owned copy
/// of the hot rows when they were valid.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    schema: Arc<RowSchema>,
    cold: ColdView,
    flush_info: FlushInfo,
    hot: HotBufferSnapshot,
}

impl StoreSnapshot {
    /// Snapshot over a dumped cold region. Dumps carry no hot rows.
    pub fn from_dump(schema: Arc<RowSchema>, data: Bytes) -> Result<Self, PostingError> {
        let mut flush_info = FlushInfo::new();
        flush_info.set_flush_length(data.len())?;
        Ok(Self {
            hot: HotBufferSnapshot::empty(&schema),
            schema,
            cold: ColdView::from_bytes(data),
            flush_info,
        })
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn cold(&self) -> &ColdView {
        &self.cold
    }

    pub fn hot(&self) -> &HotBufferSnapshot {
        &self.hot
    }

    pub fn flush_info(&self) -> FlushInfo {
        self.flush_info
    }

    /// Rows visible through this snapshot; meaningless for dumps.
    pub fn total_count(&self) -> u64 {
        self.flush_info.flush_count() + self.hot.len() as u64
    }

    /// Pool bytes a reader should charge for holding this snapshot.
    pub fn owned_bytes(&self) -> usize {
        self.hot.byte_size()
    }
}
