use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

use crate::engine::core::column::compression::CompressMode;
use crate::engine::errors::PostingError;

const VALID_SHORT_BUFFER_BIT: u64 = 1;
const MODE_SHIFT: u32 = 1;
const MODE_MASK: u64 = 0b11;
const COUNT_SHIFT: u32 = 3;
const COUNT_BITS: u32 = 31;
const LENGTH_SHIFT: u32 = COUNT_SHIFT + COUNT_BITS;
const LENGTH_BITS: u32 = 30;

pub const MAX_FLUSH_COUNT: u64 = (1 << COUNT_BITS) - 1;
pub const MAX_FLUSH_LENGTH: u64 = (1 << LENGTH_BITS) - 1;

/// Flush metadata of a buffered column store, packed into one word so it can
/// be published with a single atomic store.
///
/// ```text
/// bit 0       short-buffer-valid
/// bits 1..3   compression mode
/// bits 3..34  flush count
/// bits 34..64 flush length (bytes)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FlushInfo(u64);

impl FlushInfo {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn from_raw(raw: u64) -> Result<Self, PostingError> {
        let mode = ((raw >> MODE_SHIFT) & MODE_MASK) as u8;
        CompressMode::try_from(mode).map_err(|m| {
            PostingError::FlushInfoOverflow(format!("compression mode bits {m} are not a mode"))
        })?;
        Ok(Self(raw))
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_valid_short_buffer(self) -> bool {
        self.0 & VALID_SHORT_BUFFER_BIT != 0
    }

    pub fn set_valid_short_buffer(&mut self, valid: bool) {
        if valid {
            self.0 |= VALID_SHORT_BUFFER_BIT;
        } else {
            self.0 &= !VALID_SHORT_BUFFER_BIT;
        }
    }

    pub fn compress_mode(self) -> CompressMode {
        CompressMode::try_from(((self.0 >> MODE_SHIFT) & MODE_MASK) as u8).unwrap_or_default()
    }

    pub fn set_compress_mode(&mut self, mode: CompressMode) {
        self.0 = (self.0 & !(MODE_MASK << MODE_SHIFT)) | ((u8::from(mode) as u64) << MODE_SHIFT);
    }

    #[inline]
    pub fn flush_count(self) -> u64 {
        (self.0 >> COUNT_SHIFT) & MAX_FLUSH_COUNT
    }

    pub fn set_flush_count(&mut self, count: u64) -> Result<(), PostingError> {
        if count > MAX_FLUSH_COUNT {
            return Err(PostingError::FlushInfoOverflow(format!(
                "flush count {count} exceeds {MAX_FLUSH_COUNT}"
            )));
        }
        self.0 = (self.0 & !(MAX_FLUSH_COUNT << COUNT_SHIFT)) | (count << COUNT_SHIFT);
        Ok(())
    }

    #[inline]
    pub fn flush_length(self) -> usize {
        ((self.0 >> LENGTH_SHIFT) & MAX_FLUSH_LENGTH) as usize
    }

    pub fn set_flush_length(&mut self, length: usize) -> Result<(), PostingError> {
        let length = length as u64;
        if length > MAX_FLUSH_LENGTH {
            return Err(PostingError::FlushInfoOverflow(format!(
                "flush length {length} exceeds {MAX_FLUSH_LENGTH}"
            )));
        }
        self.0 = (self.0 & !(MAX_FLUSH_LENGTH << LENGTH_SHIFT)) | (length << LENGTH_SHIFT);
        Ok(())
    }
}

impl fmt::Debug for FlushInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushInfo")
            .field("valid_short_buffer", &self.is_valid_short_buffer())
            .field("mode", &self.compress_mode())
            .field("flush_count", &self.flush_count())
            .field("flush_length", &self.flush_length())
            .finish()
    }
}

/// [`FlushInfo`] published by the writer, read by any number of readers.
#[derive(Debug, Default)]
pub struct AtomicFlushInfo(CachePadded<AtomicU64>);

impl AtomicFlushInfo {
    pub fn new(info: FlushInfo) -> Self {
        Self(CachePadded::new(AtomicU64::new(info.raw())))
    }

    #[inline]
    pub fn load(&self) -> FlushInfo {
        FlushInfo(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, info: FlushInfo) {
        self.0.store(info.raw(), Ordering::Release);
    }
}
