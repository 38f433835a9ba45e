use std::io;
use thiserror::Error;
use tracing::{debug, error};

/// Faults raised while encoding or decoding a posting list.
///
/// End-of-stream is never reported here; readers return `Ok(None)` or
/// `Ok(false)` for it.
#[derive(Debug, Error)]
pub enum PostingError {
    #[error("Byte range {start}..{end} out of bounds (len {len})")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("Corrupted posting stream: {0}")]
    Corruption(String),

    #[error("Memory pool '{pool}' exhausted: requested {requested} bytes, {available} available")]
    PoolExhausted {
        pool: String,
        requested: usize,
        available: usize,
    },

    #[error("Hot buffer full at capacity {0}")]
    HotBufferFull(usize),

    #[error("Flush metadata overflow: {0}")]
    FlushInfoOverflow(String),

    #[error("Column decoded out of schema order: expected {expected}, got {got}")]
    ColumnOrder { expected: usize, got: usize },

    #[error("Key out of order: {current} after {previous}")]
    OutOfOrder { previous: u64, current: u64 },

    #[error("Invalid row schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid posting format: {0}")]
    InvalidFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PostingError {
    pub fn corruption(msg: impl Into<String>) -> Self {
        PostingError::Corruption(msg.into())
    }

    /// Structural faults abort the current term only; callers treat the
    /// segment's contribution as unavailable.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            PostingError::InvalidSchema(_)
                | PostingError::InvalidFormat(_)
                | PostingError::Config(_)
                | PostingError::Io(_)
        )
    }

    pub fn log_error(&self) {
        match self {
            PostingError::OutOfRange { start, end, len } => {
                error!("Byte range out of bounds: {}..{} (len {})", start, end, len);
            }
            PostingError::Corruption(e) => {
                error!("Corrupted posting stream: {}", e);
                debug!("Corruption details: {:?}", e);
            }
            PostingError::PoolExhausted {
                pool,
                requested,
                available,
            } => {
                error!(
                    "Memory pool '{}' exhausted (requested {}, available {})",
                    pool, requested, available
                );
            }
            PostingError::HotBufferFull(cap) => {
                error!("Hot buffer full at capacity {}", cap);
            }
            PostingError::FlushInfoOverflow(e) => {
                error!("Flush metadata overflow: {}", e);
            }
            PostingError::ColumnOrder { expected, got } => {
                error!("Column order violated: expected {}, got {}", expected, got);
            }
            PostingError::OutOfOrder { previous, current } => {
                error!("Key out of order: {} after {}", current, previous);
            }
            PostingError::InvalidSchema(e) => {
                error!("Invalid row schema: {}", e);
            }
            PostingError::InvalidFormat(e) => {
                error!("Invalid posting format: {}", e);
            }
            PostingError::Config(e) => {
                error!("Invalid configuration: {}", e);
            }
            PostingError::Io(e) => {
                error!("I/O error: {}", e);
                debug!("I/O error details: {:?}", e);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
