use std::sync::Arc;

use crate::engine::core::buffer::{BufferedStoreReader, StoreSnapshot};
use crate::engine::core::column::compression::MAX_BLOCK_VALUES;
use crate::engine::core::memory::{MemoryPool, PoolReservation};
use crate::engine::core::posting::doc_list_encoder::DocListShared;
use crate::engine::core::posting::position_bitmap::PositionBitmapReader;
use crate::engine::core::posting::posting_dump::DocListDump;
use crate::engine::core::posting::posting_format::DocListFormat;
use crate::engine::core::skiplist::SkipListReader;
use crate::engine::errors::PostingError;

/// One decoded doc block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocBufferInfo {
    pub first: u32,
    pub last: u32,
    /// Occurrences of the term before the block's first document.
    pub ttf: u32,
    pub len: usize,
}

/// How the decoder moves between blocks, fixed at open time.
#[derive(Debug)]
enum DocSeek {
    /// Block after block; used without a skip list and for raw doc ids,
    /// which need not be ordered.
    Sequential,
    Skip(SkipListReader),
}

/// Reads a doc list block by block from a private snapshot.
#[derive(Debug)]
pub struct InMemDocListDecoder {
    format: Arc<DocListFormat>,
    seek: DocSeek,
    reader: BufferedStoreReader,
    base_doc: u32,
    base_ttf: u32,
    doc_ids: Vec<u32>,
    tfs: Vec<u32>,
    payloads: Vec<u16>,
    field_maps: Vec<u8>,
    has_block: bool,
    tf_bitmap: Option<PositionBitmapReader>,
    reservation: PoolReservation,
}

impl InMemDocListDecoder {
    fn from_parts(
        format: Arc<DocListFormat>,
        skip: Option<SkipListReader>,
        snapshot: &StoreSnapshot,
        tf_bitmap: Option<PositionBitmapReader>,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        let reservation = pool.reserve(
            snapshot.owned_bytes()
                + MAX_BLOCK_VALUES * format.columns().schema.row_width()
                + tf_bitmap.as_ref().map_or(0, PositionBitmapReader::byte_size),
        )?;
        let seek = match skip {
            Some(skip) if !format.reference_compress() => DocSeek::Skip(skip),
            _ => DocSeek::Sequential,
        };
        Ok(Self {
            reader: BufferedStoreReader::open(snapshot),
            format,
            seek,
            base_doc: 0,
            base_ttf: 0,
            doc_ids: Vec::with_capacity(MAX_BLOCK_VALUES),
            tfs: Vec::new(),
            payloads: Vec::new(),
            field_maps: Vec::new(),
            has_block: false,
            tf_bitmap,
            reservation,
        })
    }

    pub(crate) fn open(shared: &DocListShared, pool: &Arc<MemoryPool>) -> Result<Self, PostingError> {
        // Skip entries point into the doc store, so they must not be newer
        // than the doc snapshot.
        let skip = shared.skip.get().map(SkipListReader::load).transpose()?;
        let snapshot = shared.store.snapshot();
        // Copied after the doc store so it covers every visible document.
        let tf_bitmap = shared.bitmap.as_ref().map(|b| b.snapshot());
        Self::from_parts(Arc::clone(&shared.format), skip, &snapshot, tf_bitmap, pool)
    }

    pub fn open_dump(
        dump: &DocListDump,
        format: Arc<DocListFormat>,
        pool: &Arc<MemoryPool>,
    ) -> Result<Self, PostingError> {
        let skip = if dump.skip.is_empty() {
            None
        } else {
            Some(SkipListReader::open_dump(
                dump.skip.clone(),
                format.skip_kind(),
                format.reference_compress(),
            )?)
        };
        let snapshot = StoreSnapshot::from_dump(Arc::clone(&format.columns().schema), dump.doc.clone())?;
        Self::from_parts(format, skip, &snapshot, None, pool)
    }

    /// Attaches the tf bitmap of a dumped list, see [`DocListDump::tf_bitmap`].
    pub fn with_tf_bitmap(mut self, tf_bitmap: PositionBitmapReader) -> Result<Self, PostingError> {
        self.reservation.grow(tf_bitmap.byte_size())?;
        self.tf_bitmap = Some(tf_bitmap);
        Ok(self)
    }

    pub fn tf_bitmap(&self) -> Option<&PositionBitmapReader> {
        self.tf_bitmap.as_ref()
    }

    /// `(positions before the document, its tf)` for document `doc_ordinal`
    /// of a tf bitmap list.
    pub fn pos_count_info(&self, doc_ordinal: u32) -> Result<(u32, u32), PostingError> {
        self.tf_bitmap
            .as_ref()
            .ok_or_else(|| PostingError::InvalidFormat("doc list has no tf bitmap".into()))?
            .pos_count_info(doc_ordinal)
    }

    fn decode_block(&mut self) -> Result<Option<usize>, PostingError> {
        let cols = self.format.columns();
        let (doc_col, tf_col, payload_col, field_map_col) =
            (cols.doc_id, cols.tf, cols.payload, cols.field_map);

        let Some(count) = self.reader.decode(doc_col, &mut self.doc_ids)? else {
            return Ok(None);
        };
        if count == 0 {
            return Err(PostingError::corruption("empty doc block"));
        }
        self.tfs.clear();
        if let Some(tf) = tf_col {
            self.reader.decode(tf, &mut self.tfs)?;
        }
        self.payloads.clear();
        if let Some(payload) = payload_col {
            self.reader.decode(payload, &mut self.payloads)?;
        }
        self.field_maps.clear();
        if let Some(field_map) = field_map_col {
            self.reader.decode(field_map, &mut self.field_maps)?;
        }
        Ok(Some(count))
    }

    /// Decodes the next block that may hold `start_doc_id` or a later id into
    /// `out`. `None` once the list is exhausted.
    pub fn decode_doc_buffer(
        &mut self,
        start_doc_id: u32,
        out: &mut Vec<u32>,
    ) -> Result<Option<DocBufferInfo>, PostingError> {
        self.has_block = false;

        if let DocSeek::Skip(skip) = &mut self.seek {
            let (offset, base_doc, base_ttf) = if skip.skip_to(start_doc_id)? {
                (skip.prev_value(), skip.prev_key(), skip.prev_ttf())
            } else {
                (
                    skip.last_value_in_buffer(),
                    skip.last_key_in_buffer(),
                    skip.last_ttf_in_buffer(),
                )
            };
            if offset as usize > self.reader.tell() {
                self.reader.seek(offset as usize)?;
                self.base_doc = base_doc;
                self.base_ttf = base_ttf;
            }
        }

        let reference = self.format.reference_compress();
        loop {
            let Some(count) = self.decode_block()? else {
                return Ok(None);
            };
            let ttf = self.base_ttf;
            self.base_ttf = self.base_ttf.wrapping_add(self.tfs.iter().sum::<u32>());

            if !reference {
                let mut acc = self.base_doc;
                for id in self.doc_ids.iter_mut() {
                    acc = acc.wrapping_add(*id);
                    *id = acc;
                }
                self.base_doc = acc;
                if acc < start_doc_id {
                    continue;
                }
            }

            out.clear();
            out.extend_from_slice(&self.doc_ids);
            self.has_block = true;
            return Ok(Some(DocBufferInfo {
                first: self.doc_ids[0],
                last: self.doc_ids[count - 1],
                ttf,
                len: count,
            }));
        }
    }

    /// Tfs of the last decoded block. `false` without a tf list, including
    /// tf bitmap lists.
    pub fn decode_current_tf_buffer(&self, out: &mut Vec<u32>) -> bool {
        if !self.has_block || !self.format.has_tf_list() {
            return false;
        }
        out.clear();
        out.extend_from_slice(&self.tfs);
        true
    }

    pub fn decode_current_doc_payload_buffer(&self, out: &mut Vec<u16>) -> bool {
        if !self.has_block || !self.format.has_doc_payload() {
            return false;
        }
        out.clear();
        out.extend_from_slice(&self.payloads);
        true
    }

    pub fn decode_current_field_map_buffer(&self, out: &mut Vec<u8>) -> bool {
        if !self.has_block || !self.format.has_field_map() {
            return false;
        }
        out.clear();
        out.extend_from_slice(&self.field_maps);
        true
    }
}
