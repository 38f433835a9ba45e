use std::sync::Arc;

use crate::engine::core::buffer::{BufferedStoreReader, StoreSnapshot};
use crate::engine::core::column::compression::MAX_BLOCK_VALUES;
use crate::engine::core::memory::{MemoryPool, PoolReservation};
use crate::engine::core::posting::position_list_encoder::PositionListShared;
use crate::engine::core::posting::posting_dump::PositionListDump;
use crate::engine::core::posting::posting_format::PositionListFormat;
use crate::engine::core::skiplist::{SkipListKind, SkipListReader};
use crate::engine::errors::PostingError;

/// Reads a position list record by record from a private snapshot.
///
/// Occurrences are addressed by ttf, the number of occurrences of the term
/// before them. A record is one decoded block; values inside it are raw
/// deltas, see [`InMemPositionListDecoder::positions`] for absolute ones.
#[derive(Debug)]
pub struct InMemPositionListDecoder {
    format: Arc<PositionListFormat>,
    skip: Option<SkipListReader>,
    reader: BufferedStoreReader,
    /// ttf of the first value of the current record.
    record_start: u32,
    /// ttf right after the current record.
    next_start: u32,
    /// The current record was located but not yet handed out.
    pending: bool,
    positions: Vec<u32>,
    payloads: Vec<u8>,
    _reservation: PoolReservation,
}

impl InMemPositionListDecoder {
    fn from_parts(
        format: Arc<PositionListFormat>,
        skip: Option<SkipListReader>,
        snapshot: &StoreSnapshot,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        let reservation = pool.reserve(
            snapshot.owned_bytes() + MAX_BLOCK_VALUES * format.columns().schema.row_width(),
        )?;
        Ok(Self {
            reader: BufferedStoreReader::open(snapshot),
            format,
            skip,
            record_start: 0,
            next_start: 0,
            pending: false,
            positions: Vec::with_capacity(MAX_BLOCK_VALUES),
            payloads: Vec::new(),
            _reservation: reservation,
        })
    }

    pub(crate) fn open(
        shared: &PositionListShared,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        let skip = shared.skip.get().map(SkipListReader::load).transpose()?;
        let snapshot = shared.store.snapshot();
        Self::from_parts(Arc::clone(&shared.format), skip, &snapshot, pool)
    }

    pub fn open_dump(
        dump: &PositionListDump,
        format: Arc<PositionListFormat>,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        let skip = if dump.skip.is_empty() {
            None
        } else {
            Some(SkipListReader::open_dump(
                dump.skip.clone(),
                SkipListKind::Pair,
                false,
            )?)
        };
        let snapshot =
            StoreSnapshot::from_dump(Arc::clone(&format.columns().schema), dump.positions.clone())?;
        Self::from_parts(format, skip, &snapshot, pool)
    }

    #[inline]
    pub fn record_start(&self) -> u32 {
        self.record_start
    }

    fn covers(&self, ttf: u32) -> bool {
        ttf >= self.record_start && ttf < self.next_start
    }

    /// Moves the cursor to the record holding occurrence `ttf` using the skip
    /// list. The record is decoded by [`Self::locate_record`].
    pub fn skip_to(&mut self, ttf: u32) -> Result<(), PostingError> {
        if self.covers(ttf) {
            return Ok(());
        }
        let Some(skip) = self.skip.as_mut() else {
            return Ok(());
        };
        let (offset, base) = if skip.skip_to(ttf.saturating_add(1))? {
            (skip.prev_value(), skip.prev_key())
        } else {
            (skip.last_value_in_buffer(), skip.last_key_in_buffer())
        };
        if offset as usize > self.reader.tell() {
            self.reader.seek(offset as usize)?;
            self.record_start = base;
            self.next_start = base;
            self.pending = false;
            self.positions.clear();
            self.payloads.clear();
        }
        Ok(())
    }

    /// Decodes records until one covers `ttf` and makes it the record the
    /// next [`Self::decode_record`] returns. `false` when the list ends
    /// first. Occurrences behind the current record cannot be reached.
    pub fn locate_record(&mut self, ttf: u32) -> Result<bool, PostingError> {
        if self.covers(ttf) {
            self.pending = true;
            return Ok(true);
        }
        if ttf < self.record_start {
            return Err(PostingError::OutOfRange {
                start: ttf as usize,
                end: ttf as usize + 1,
                len: self.record_start as usize,
            });
        }
        self.skip_to(ttf)?;
        while !self.covers(ttf) {
            if self.load_record()? == 0 {
                return Ok(false);
            }
        }
        self.pending = true;
        Ok(true)
    }

    fn load_record(&mut self) -> Result<usize, PostingError> {
        let cols = self.format.columns();
        let (pos_col, payload_col) = (cols.position, cols.payload);

        let Some(count) = self.reader.decode(pos_col, &mut self.positions)? else {
            return Ok(0);
        };
        self.payloads.clear();
        if let Some(column) = payload_col {
            self.reader.decode(column, &mut self.payloads)?;
        }
        self.record_start = self.next_start;
        self.next_start = self.next_start.wrapping_add(count as u32);
        Ok(count)
    }

    /// Copies out the raw values of the record found by the last
    /// [`Self::locate_record`], or of the next record when that one was
    /// already returned. Returns the values copied, 0 at the end of the list.
    pub fn decode_record(
        &mut self,
        positions: &mut Vec<u32>,
        payloads: &mut Vec<u8>,
    ) -> Result<usize, PostingError> {
        let count = if self.pending {
            self.positions.len()
        } else {
            self.load_record()?
        };
        self.pending = false;
        positions.clear();
        payloads.clear();
        if count == 0 {
            return Ok(0);
        }
        positions.extend_from_slice(&self.positions);
        payloads.extend_from_slice(&self.payloads);
        Ok(count)
    }

    /// Absolute positions (and payloads, when stored) of the document whose
    /// first occurrence is `ttf` and which holds `tf` occurrences.
    pub fn positions(
        &mut self,
        ttf: u32,
        tf: u32,
        pos_out: &mut Vec<u32>,
        payload_out: &mut Vec<u8>,
    ) -> Result<(), PostingError> {
        pos_out.clear();
        payload_out.clear();
        let has_payload = self.format.has_payload();
        let mut acc = 0u32;
        for i in 0..tf {
            let idx = ttf + i;
            if !self.locate_record(idx)? {
                return Err(PostingError::corruption(format!(
                    "position list ends before occurrence {idx}"
                )));
            }
            let at = (idx - self.record_start) as usize;
            let value = self.positions[at];
            acc = if i == 0 { value } else { acc.wrapping_add(value) };
            pos_out.push(acc);
            if has_payload {
                payload_out.push(self.payloads[at]);
            }
        }
        Ok(())
    }
}
