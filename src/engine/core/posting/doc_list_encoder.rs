use std::io::Write;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::engine::core::buffer::{BufferedColumnStore, ByteSliceList, StoreHandle};
use crate::engine::core::column::compression::{CompressMode, VarIntWrite, vuint_len};
use crate::engine::core::memory::MemoryPool;
use crate::engine::core::posting::in_mem_doc_list_decoder::InMemDocListDecoder;
use crate::engine::core::posting::position_bitmap::{BitmapHandle, PositionBitmapWriter};
use crate::engine::core::posting::posting_format::{DocListFormat, TermMeta};
use crate::engine::core::skiplist::{SkipListHandle, SkipListKind, SkipListWriter};
use crate::engine::errors::PostingError;
use crate::shared::config::{MemoryConfig, PostingConfig};

/// State readers share with a live doc-list encoder.
#[derive(Debug)]
pub struct DocListShared {
    pub(crate) format: Arc<DocListFormat>,
    pub(crate) store: StoreHandle,
    pub(crate) skip: OnceLock<SkipListHandle>,
    pub(crate) bitmap: Option<BitmapHandle>,
}

/// Cloneable, thread-safe reader side of a [`DocListEncoder`].
#[derive(Debug, Clone)]
pub struct DocListReader(Arc<DocListShared>);

impl DocListReader {
    pub fn format(&self) -> &Arc<DocListFormat> {
        &self.0.format
    }

    /// Decoder over a private snapshot, charging its buffers to `pool`.
    pub fn in_mem_decoder(&self, pool: &Arc<MemoryPool>) -> Result<InMemDocListDecoder, PostingError> {
        InMemDocListDecoder::open(&self.0, pool)
    }
}

/// Builds the doc list of one term: doc ids plus the optional tf list,
/// doc payload and field map columns, a skip list over flushed blocks and
/// the tf bitmap when that encoding is chosen.
#[derive(Debug)]
pub struct DocListEncoder {
    format: Arc<DocListFormat>,
    posting: PostingConfig,
    memory: MemoryConfig,
    pool: Arc<MemoryPool>,
    store: BufferedColumnStore,
    shared: Arc<DocListShared>,
    skip: Option<SkipListWriter>,
    bitmap: Option<PositionBitmapWriter>,
    current_tf: u32,
    total_tf: u32,
    df: u32,
    last_doc_id: u32,
    last_doc_payload: u16,
    field_map: u8,
    term_payload: u32,
}

impl DocListEncoder {
    pub fn new(
        format: Arc<DocListFormat>,
        posting: &PostingConfig,
        memory: &MemoryConfig,
        pool: &Arc<MemoryPool>,
    ) -> Self {
        let store = BufferedColumnStore::new(Arc::clone(&format.columns().schema), pool, memory);
        let bitmap = format
            .has_tf_bitmap()
            .then(|| PositionBitmapWriter::new(posting.tf_bitmap_block_docs));
        let shared = Arc::new(DocListShared {
            format: Arc::clone(&format),
            store: store.handle(),
            skip: OnceLock::new(),
            bitmap: bitmap.as_ref().map(PositionBitmapWriter::handle),
        });
        Self {
            format,
            posting: posting.clone(),
            memory: memory.clone(),
            pool: Arc::clone(pool),
            store,
            shared,
            skip: None,
            bitmap,
            current_tf: 0,
            total_tf: 0,
            df: 0,
            last_doc_id: 0,
            last_doc_payload: 0,
            field_map: 0,
            term_payload: 0,
        }
    }

    pub fn format(&self) -> &Arc<DocListFormat> {
        &self.format
    }

    pub fn check_field(&self, field_idx: u8) -> Result<(), PostingError> {
        if self.format.has_field_map() && field_idx >= u8::BITS as u8 {
            return Err(PostingError::InvalidFormat(format!(
                "field index {field_idx} does not fit the field map"
            )));
        }
        Ok(())
    }

    /// Records one occurrence in field `field_idx` of the current document.
    pub fn add_position(&mut self, field_idx: u8) -> Result<(), PostingError> {
        self.check_field(field_idx)?;
        if self.format.has_field_map() {
            self.field_map |= 1 << field_idx;
        }
        self.current_tf += 1;
        self.total_tf += 1;
        Ok(())
    }

    pub fn end_document(&mut self, doc_id: u32, doc_payload: u16) -> Result<(), PostingError> {
        let doc_cell = if self.format.reference_compress() {
            doc_id
        } else if self.df > 0 && doc_id <= self.last_doc_id {
            return Err(PostingError::OutOfOrder {
                previous: self.last_doc_id as u64,
                current: doc_id as u64,
            });
        } else {
            doc_id - self.last_doc_id
        };

        let tf = self.current_tf.max(1);
        let total_tf = self.total_tf - self.current_tf + tf;
        let first_bit = total_tf - tf;

        // The bitmap goes first: readers copy it after the doc store, so it
        // must never lag a row they can see.
        if let Some(bitmap) = self.bitmap.as_mut() {
            bitmap.set(first_bit);
            bitmap.end_document(self.df + 1, total_tf);
        }
        if let Err(e) = self.push_row(doc_cell, tf, doc_payload) {
            if let Some(bitmap) = self.bitmap.as_mut() {
                bitmap.undo_document(first_bit, self.df, self.total_tf - self.current_tf);
            }
            return Err(e);
        }

        self.df += 1;
        self.total_tf = total_tf;
        self.last_doc_id = doc_id;
        self.last_doc_payload = doc_payload;
        self.current_tf = 0;
        self.field_map = 0;

        if self.store.need_flush(self.posting.doc_block_size) {
            self.flush_block(CompressMode::for_inline_flush(
                self.format.reference_compress(),
            ))?;
        }
        Ok(())
    }

    fn push_row(&mut self, doc_cell: u32, tf: u32, doc_payload: u16) -> Result<(), PostingError> {
        let cols = self.format.columns();
        let (doc_col, tf_col, payload_col, field_map_col) =
            (cols.doc_id, cols.tf, cols.payload, cols.field_map);
        self.store.push_back(doc_col, doc_cell)?;
        if let Some(tf_col) = tf_col {
            self.store.push_back(tf_col, tf)?;
        }
        if let Some(payload) = payload_col {
            self.store.push_back(payload, doc_payload)?;
        }
        if let Some(field_map) = field_map_col {
            self.store.push_back(field_map, self.field_map)?;
        }
        self.store.end_push_back()
    }

    fn flush_block(&mut self, mode: CompressMode) -> Result<(), PostingError> {
        let emitted = self.store.flush(mode)?;
        if emitted == 0 || mode == CompressMode::ShortList {
            return Ok(());
        }

        if self.skip.is_none() {
            let writer = SkipListWriter::new(
                self.format.skip_kind(),
                self.format.reference_compress(),
                &self.posting,
                &self.memory,
                &self.pool,
            )?;
            self.shared
                .skip
                .set(writer.handle())
                .map_err(|_| PostingError::corruption("doc skip list created twice"))?;
            debug!(
                target = "postings::doc_list",
                kind = ?writer.kind(),
                df = self.df,
                "Created doc skip list"
            );
            self.skip = Some(writer);
        }

        let end = self.store.flush_info().flush_length() as u32;
        if let Some(skip) = self.skip.as_mut() {
            match skip.kind() {
                SkipListKind::Triple => skip.add_triple_item(self.last_doc_id, self.total_tf, end)?,
                SkipListKind::Pair => skip.add_item(self.last_doc_id, end)?,
            }
        }
        Ok(())
    }

    /// Closing flush of the term.
    pub fn flush(&mut self) -> Result<(), PostingError> {
        let mode = CompressMode::for_final_flush(
            self.format.reference_compress(),
            self.df as usize,
            self.posting.short_list_max_docs,
            self.store.flush_info().flush_count() > 0,
        );
        self.flush_block(mode)?;
        if let Some(skip) = self.skip.as_mut() {
            skip.finish()?;
        }
        debug!(
            target = "postings::doc_list",
            df = self.df,
            total_tf = self.total_tf,
            mode = ?mode,
            bytes = self.store.dump_length(),
            "Flushed doc list"
        );
        Ok(())
    }

    pub fn set_term_payload(&mut self, payload: u32) {
        self.term_payload = payload;
    }

    pub fn term_meta(&self) -> TermMeta {
        TermMeta {
            df: self.df,
            total_tf: self.total_tf,
            payload: self.term_payload,
        }
    }

    #[inline]
    pub fn df(&self) -> u32 {
        self.df
    }

    #[inline]
    pub fn last_doc_payload(&self) -> u16 {
        self.last_doc_payload
    }

    fn skip_length(&self) -> usize {
        self.skip.as_ref().map_or(0, SkipListWriter::dump_length)
    }

    pub fn dump_length(&self) -> usize {
        let skip = self.skip_length();
        let doc = self.store.dump_length();
        vuint_len(skip as u64)
            + vuint_len(doc as u64)
            + skip
            + doc
            + self.bitmap.as_ref().map_or(0, PositionBitmapWriter::dump_length)
    }

    /// `VUInt32 skipLen | VUInt32 docLen | skip | doc | tf bitmap?`
    pub fn dump<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), PostingError> {
        writer.write_vuint32(self.skip_length() as u32)?;
        writer.write_vuint32(self.store.dump_length() as u32)?;
        if let Some(skip) = &self.skip {
            skip.dump(writer)?;
        }
        self.store.dump(writer)?;
        if let Some(bitmap) = &self.bitmap {
            let mut image = ByteSliceList::new(&self.pool, &self.memory);
            bitmap.dump(&mut image)?;
            image.publish()?;
            image.snapshot().write_to(writer)?;
        }
        Ok(())
    }

    pub fn reader(&self) -> DocListReader {
        DocListReader(Arc::clone(&self.shared))
    }

    pub fn in_mem_decoder(&self, pool: &Arc<MemoryPool>) -> Result<InMemDocListDecoder, PostingError> {
        self.reader().in_mem_decoder(pool)
    }
}
