use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering, fence};
use std::sync::{Arc, OnceLock};

use crossbeam::utils::Backoff;
use tracing::trace;

use crate::engine::core::column::format::{ColumnId, ColumnValue};
use crate::engine::core::column::row_schema::RowSchema;
use crate::engine::core::memory::{MemoryPool, PoolReservation};
use crate::engine::errors::PostingError;

/// Capacities a hot buffer moves through, in order.
pub const CAPACITY_TIERS: [usize; 3] = [2, 16, 128];
pub const MAX_HOT_CAPACITY: usize = CAPACITY_TIERS[CAPACITY_TIERS.len() - 1];

const NO_TIER: usize = usize::MAX;

#[derive(Debug)]
struct HotAllocation {
    capacity: usize,
    /// Columnar: column `c` occupies `c * capacity .. (c + 1) * capacity`.
    cells: Box<[AtomicU64]>,
}

impl HotAllocation {
    fn new(capacity: usize, columns: usize) -> Self {
        Self {
            capacity,
            cells: (0..capacity * columns).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    fn cell(&self, column: usize, row: usize) -> &AtomicU64 {
        &self.cells[column * self.capacity + row]
    }
}

/// Reader-visible half of a [`HotBuffer`].
///
/// Allocations are never freed before the buffer itself, so a reader holding
/// a tier keeps reading valid cells even while the writer grows. Consistency
/// of the copied rows is checked with `version`.
#[derive(Debug)]
pub struct HotBufferShared {
    schema: Arc<RowSchema>,
    tiers: [OnceLock<HotAllocation>; CAPACITY_TIERS.len()],
    tier: AtomicUsize,
    size: AtomicUsize,
    version: AtomicU64,
}

impl HotBufferShared {
    fn current(&self) -> Option<&HotAllocation> {
        match self.tier.load(Ordering::Acquire) {
            NO_TIER => None,
            t => self.tiers[t].get(),
        }
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.current().map_or(0, |a| a.capacity)
    }

    /// Copy of the buffered rows as of one instant. Retries while the writer
    /// clears or grows underneath the copy.
    pub fn snapshot(&self) -> HotBufferSnapshot {
        let columns = self.schema.len();
        let backoff = Backoff::new();
        loop {
            let before = self.version.load(Ordering::Acquire);
            let rows = self.size.load(Ordering::Acquire);
            let Some(alloc) = self.current() else {
                return HotBufferSnapshot::empty(&self.schema);
            };
            if rows <= alloc.capacity {
                let mut values = Vec::with_capacity(rows * columns);
                for c in 0..columns {
                    for r in 0..rows {
                        values.push(alloc.cell(c, r).load(Ordering::Relaxed));
                    }
                }
                fence(Ordering::Acquire);
                if self.version.load(Ordering::Relaxed) == before {
                    return HotBufferSnapshot {
                        schema: Arc::clone(&self.schema),
                        rows,
                        values,
                    };
                }
            }
            trace!(target = "postings::hot_buffer", rows, "Snapshot raced with writer, retrying");
            backoff.snooze();
        }
    }
}

/// Small growable columnar buffer for records not yet compressed.
/// Only the owner writes; readers go through [`HotBuffer::handle`].
#[derive(Debug)]
pub struct HotBuffer {
    shared: Arc<HotBufferShared>,
    reservation: PoolReservation,
    tier: Option<usize>,
    size: usize,
}

impl HotBuffer {
    pub fn new(schema: Arc<RowSchema>, pool: &Arc<MemoryPool>) -> Self {
        Self {
            shared: Arc::new(HotBufferShared {
                schema,
                tiers: Default::default(),
                tier: AtomicUsize::new(NO_TIER),
                size: AtomicUsize::new(0),
                version: AtomicU64::new(0),
            }),
            reservation: PoolReservation::empty(pool),
            tier: None,
            size: 0,
        }
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.shared.schema
    }

    pub fn handle(&self) -> Arc<HotBufferShared> {
        Arc::clone(&self.shared)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.tier.map_or(0, |t| CAPACITY_TIERS[t])
    }

    fn alloc(&self) -> Option<&HotAllocation> {
        self.tier.and_then(|t| self.shared.tiers[t].get())
    }

    /// Writes `value` into the current row, growing the buffer when the row
    /// has no slot yet.
    pub fn push_back<T: ColumnValue>(
        &mut self,
        column: ColumnId<T>,
        value: T,
    ) -> Result<(), PostingError> {
        self.shared.schema.check(column)?;
        if self.size == self.capacity() {
            self.grow()?;
        }
        let alloc = self
            .alloc()
            .ok_or_else(|| PostingError::corruption("hot buffer has no allocation"))?;
        alloc
            .cell(column.index(), self.size)
            .store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Commits the current row. Columns never pushed for it read as zero.
    pub fn end_push_back(&mut self) -> Result<(), PostingError> {
        if self.size == self.capacity() {
            self.grow()?;
        }
        self.size += 1;
        self.shared.size.store(self.size, Ordering::Release);
        Ok(())
    }

    /// Drops all rows, keeping the capacity.
    pub fn clear(&mut self) {
        self.size = 0;
        self.shared.size.store(0, Ordering::Relaxed);
        self.shared.version.fetch_add(1, Ordering::Release);
        // Rows pushed from here on overwrite cells a reader may be copying.
        fence(Ordering::Release);
    }

    pub fn snapshot(&self) -> HotBufferSnapshot {
        self.shared.snapshot()
    }

    /// Appends column `index` of all committed rows to `out`.
    pub fn read_column(&self, index: usize, out: &mut Vec<u64>) {
        if let Some(alloc) = self.alloc() {
            out.extend((0..self.size).map(|r| alloc.cell(index, r).load(Ordering::Relaxed)));
        }
    }

    fn grow(&mut self) -> Result<(), PostingError> {
        let next = match self.tier {
            None => 0,
            Some(t) if t + 1 < CAPACITY_TIERS.len() => t + 1,
            Some(_) => return Err(PostingError::HotBufferFull(MAX_HOT_CAPACITY)),
        };
        let capacity = CAPACITY_TIERS[next];
        let columns = self.shared.schema.len();
        self.reservation
            .grow(capacity * columns * std::mem::size_of::<u64>())?;

        let fresh = HotAllocation::new(capacity, columns);
        if let Some(old) = self.alloc() {
            for c in 0..columns {
                for r in 0..self.size {
                    fresh
                        .cell(c, r)
                        .store(old.cell(c, r).load(Ordering::Relaxed), Ordering::Relaxed);
                }
            }
        }
        self.shared.tiers[next]
            .set(fresh)
            .map_err(|_| PostingError::corruption("hot buffer tier allocated twice"))?;
        self.shared.tier.store(next, Ordering::Release);
        self.shared.version.fetch_add(1, Ordering::Release);
        self.tier = Some(next);

        trace!(target = "postings::hot_buffer", capacity, rows = self.size, "Grew hot buffer");
        Ok(())
    }
}

/// Owned, point-in-time copy of a hot buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotBufferSnapshot {
    schema: Arc<RowSchema>,
    rows: usize,
    /// Columnar with stride `rows`.
    values: Vec<u64>,
}

impl HotBufferSnapshot {
    pub fn empty(schema: &Arc<RowSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            rows: 0,
            values: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn column(&self, index: usize) -> &[u64] {
        if index >= self.schema.len() {
            return &[];
        }
        &self.values[index * self.rows..(index + 1) * self.rows]
    }

    pub fn get<T: ColumnValue>(&self, column: ColumnId<T>, row: usize) -> Option<T> {
        self.column(column.index())
            .get(row)
            .map(|bits| T::from_bits(*bits))
    }

    pub fn byte_size(&self) -> usize {
        self.values.len() * std::mem::size_of::<u64>()
    }
}
