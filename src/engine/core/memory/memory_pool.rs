use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::engine::errors::PostingError;

/// Byte budget shared by the components of one segment builder (writer side)
/// or one query session (reader side).
#[derive(Debug)]
pub struct MemoryPool {
    name: String,
    limit: Option<usize>,
    used: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, limit: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            limit,
            used: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn unbounded(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn allocate(&self, size: usize) -> Result<(), PostingError> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(size);
            if let Some(limit) = self.limit {
                if next > limit {
                    warn!(
                        target = "postings::memory",
                        pool = %self.name,
                        requested = size,
                        used = current,
                        limit,
                        "Memory pool exhausted"
                    );
                    return Err(PostingError::PoolExhausted {
                        pool: self.name.clone(),
                        requested: size,
                        available: limit.saturating_sub(current),
                    });
                }
            }
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::Relaxed);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn deallocate(&self, size: usize) {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_sub(size);
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Allocates `size` bytes that are handed back when the guard drops.
    pub fn reserve(self: &Arc<Self>, size: usize) -> Result<PoolReservation, PostingError> {
        self.allocate(size)?;
        Ok(PoolReservation {
            pool: Arc::clone(self),
            size,
        })
    }
}

/// RAII share of a [`MemoryPool`].
#[derive(Debug)]
pub struct PoolReservation {
    pool: Arc<MemoryPool>,
    size: usize,
}

impl PoolReservation {
    pub fn empty(pool: &Arc<MemoryPool>) -> Self {
        Self {
            pool: Arc::clone(pool),
            size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    pub fn grow(&mut self, extra: usize) -> Result<(), PostingError> {
        self.pool.allocate(extra)?;
        self.size += extra;
        Ok(())
    }
}

impl Drop for PoolReservation {
    fn drop(&mut self) {
        if self.size > 0 {
            self.pool.deallocate(self.size);
        }
    }
}
