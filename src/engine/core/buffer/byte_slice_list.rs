use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::{BufMut, Bytes, BytesMut};

use crate::engine::core::buffer::byte_slice_reader::ByteSliceReader;
use crate::engine::core::column::compression::vuint64_bytes;
use crate::engine::core::memory::{MemoryPool, PoolReservation};
use crate::engine::errors::PostingError;
use crate::shared::config::MemoryConfig;

/// One immutable published segment of a cold store.
#[derive(Debug)]
pub struct SliceNode {
    data: Bytes,
    next: OnceLock<Arc<SliceNode>>,
}

impl Drop for SliceNode {
    // Unlink iteratively; long chains would otherwise recurse once per node.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            next = match Arc::try_unwrap(node) {
                Ok(mut n) => n.next.take(),
                Err(_) => None,
            };
        }
    }
}

#[derive(Debug, Default)]
struct ColdShared {
    head: OnceLock<Arc<SliceNode>>,
    published: AtomicUsize,
}

impl ColdShared {
    fn view(&self, bound: usize) -> ColdView {
        let published = self.published.load(Ordering::Acquire);
        ColdView {
            head: self.head.get().cloned(),
            len: bound.min(published),
        }
    }
}

/// Reader handle onto a cold store's published bytes.
#[derive(Debug, Clone)]
pub struct ColdHandle(Arc<ColdShared>);

impl ColdHandle {
    pub fn snapshot(&self) -> ColdView {
        self.0.view(usize::MAX)
    }

    /// View of the first `len` published bytes.
    pub fn snapshot_bounded(&self, len: usize) -> ColdView {
        self.0.view(len)
    }

    pub fn published_len(&self) -> usize {
        self.0.published.load(Ordering::Acquire)
    }
}

/// Placeholder bytes written ahead of a value known only later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub offset: usize,
    pub len: usize,
}

/// Append-only chunked byte store with a single writer.
///
/// Bytes are written into pool-charged chunks that never reallocate. Readers
/// only see bytes up to the last [`publish`](Self::publish); until then the
/// tail may still be patched through a [`Reservation`]. Every write charges
/// the pool for all the chunks it needs before copying, so a failed write
/// leaves the store unchanged.
#[derive(Debug)]
pub struct ByteSliceList {
    shared: Arc<ColdShared>,
    last_node: Option<Arc<SliceNode>>,
    /// Full chunks not yet published, oldest first.
    sealed: Vec<BytesMut>,
    current: BytesMut,
    /// Charged chunks not yet written to, in opening order.
    spare: VecDeque<BytesMut>,
    next_chunk: usize,
    max_chunk: usize,
    len: usize,
    published: usize,
    reservation: PoolReservation,
}

impl ByteSliceList {
    pub fn new(pool: &Arc<MemoryPool>, memory: &MemoryConfig) -> Self {
        Self {
            shared: Arc::new(ColdShared::default()),
            last_node: None,
            sealed: Vec::new(),
            current: BytesMut::new(),
            spare: VecDeque::new(),
            next_chunk: memory.cold_chunk_init_bytes.max(1),
            max_chunk: memory.cold_chunk_max_bytes.max(1),
            len: 0,
            published: 0,
            reservation: PoolReservation::empty(pool),
        }
    }

    /// Total bytes written, published or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn published_len(&self) -> usize {
        self.published
    }

    /// Bytes currently charged to the pool.
    pub fn allocated(&self) -> usize {
        self.reservation.size()
    }

    pub fn handle(&self) -> ColdHandle {
        ColdHandle(Arc::clone(&self.shared))
    }

    pub fn snapshot(&self) -> ColdView {
        self.shared.view(usize::MAX)
    }

    fn grown(&self, size: usize) -> usize {
        (size + size / 4).min(self.max_chunk).max(1)
    }

    fn room(&self) -> usize {
        self.current.capacity() - self.current.len()
            + self.spare.iter().map(BytesMut::capacity).sum::<usize>()
    }

    /// Charges and opens enough chunks for `len` more bytes. On error
    /// nothing is charged.
    fn reserve_room(&mut self, len: usize) -> Result<(), PostingError> {
        let mut room = self.room();
        if room >= len {
            return Ok(());
        }
        let (mut size, mut total, mut chunks) = (self.next_chunk, 0, 0);
        while room < len {
            room += size;
            total += size;
            chunks += 1;
            size = self.grown(size);
        }
        self.reservation.grow(total)?;

        let mut size = self.next_chunk;
        for _ in 0..chunks {
            self.spare.push_back(BytesMut::with_capacity(size));
            size = self.grown(size);
        }
        self.next_chunk = size;
        Ok(())
    }

    fn open_spare(&mut self) -> Result<(), PostingError> {
        let next = self
            .spare
            .pop_front()
            .ok_or_else(|| PostingError::corruption("cold store ran out of charged chunks"))?;
        let full = std::mem::replace(&mut self.current, next);
        if !full.is_empty() {
            self.sealed.push(full);
        }
        Ok(())
    }

    pub fn write(&mut self, mut src: &[u8]) -> Result<(), PostingError> {
        self.reserve_room(src.len())?;
        while !src.is_empty() {
            let room = self.current.capacity() - self.current.len();
            if room == 0 {
                self.open_spare()?;
                continue;
            }
            let n = room.min(src.len());
            self.current.put_slice(&src[..n]);
            self.len += n;
            src = &src[n..];
        }
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), PostingError> {
        self.write(&[v])
    }

    pub fn write_u16_le(&mut self, v: u16) -> Result<(), PostingError> {
        self.write(&v.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, v: u32) -> Result<(), PostingError> {
        self.write(&v.to_le_bytes())
    }

    pub fn write_vuint32(&mut self, v: u32) -> Result<usize, PostingError> {
        self.write_vuint64(v as u64)
    }

    pub fn write_vuint64(&mut self, v: u64) -> Result<usize, PostingError> {
        let (buf, n) = vuint64_bytes(v);
        self.write(&buf[..n])?;
        Ok(n)
    }

    /// Writes `len` zero bytes to be filled later with [`patch`](Self::patch).
    pub fn hold(&mut self, len: usize) -> Result<Reservation, PostingError> {
        let offset = self.len;
        self.reserve_room(len)?;
        const ZEROS: [u8; 16] = [0; 16];
        let mut left = len;
        while left > 0 {
            let n = left.min(ZEROS.len());
            self.write(&ZEROS[..n])?;
            left -= n;
        }
        Ok(Reservation { offset, len })
    }

    /// Overwrites a held range. Only unpublished bytes can change.
    pub fn patch(&mut self, reservation: Reservation, bytes: &[u8]) -> Result<(), PostingError> {
        let Reservation { offset, len } = reservation;
        if bytes.len() != len || offset + len > self.len {
            return Err(PostingError::OutOfRange {
                start: offset,
                end: offset + bytes.len(),
                len: self.len,
            });
        }
        if offset < self.published {
            return Err(PostingError::corruption(format!(
                "cannot patch published bytes at {offset} (published {})",
                self.published
            )));
        }

        let mut chunk_start = self.published;
        let mut src = bytes;
        let mut at = offset;
        for chunk in self.sealed.iter_mut().chain(std::iter::once(&mut self.current)) {
            let chunk_end = chunk_start + chunk.len();
            if !src.is_empty() && at < chunk_end {
                let from = at - chunk_start;
                let n = (chunk_end - at).min(src.len());
                chunk[from..from + n].copy_from_slice(&src[..n]);
                src = &src[n..];
                at += n;
            }
            chunk_start = chunk_end;
        }
        Ok(())
    }

    /// Makes every written byte visible to readers.
    pub fn publish(&mut self) -> Result<(), PostingError> {
        let mut pending: Vec<Bytes> = self.sealed.drain(..).map(BytesMut::freeze).collect();
        if !self.current.is_empty() {
            pending.push(self.current.split().freeze());
        }
        for data in pending {
            let size = data.len();
            let node = Arc::new(SliceNode {
                data,
                next: OnceLock::new(),
            });
            let linked = match &self.last_node {
                None => self.shared.head.set(Arc::clone(&node)),
                Some(last) => last.next.set(Arc::clone(&node)),
            };
            linked.map_err(|_| PostingError::corruption("cold segment linked twice"))?;
            self.last_node = Some(node);
            self.published += size;
        }
        self.shared.published.store(self.published, Ordering::Release);
        Ok(())
    }

    /// Appends bytes `[start, end)` of another store's view.
    pub fn copy_range(&mut self, src: &ColdView, start: usize, end: usize) -> Result<(), PostingError> {
        if start >= end || end > src.len() {
            return Err(PostingError::OutOfRange {
                start,
                end,
                len: src.len(),
            });
        }
        self.reserve_room(end - start)?;
        let mut seg_start = 0;
        for seg in src.segments() {
            let seg_end = seg_start + seg.len();
            if seg_end > start && seg_start < end {
                let from = start.saturating_sub(seg_start);
                let to = end.min(seg_end) - seg_start;
                self.write(&seg[from..to])?;
            }
            if seg_end >= end {
                break;
            }
            seg_start = seg_end;
        }
        Ok(())
    }
}

/// Shallow, immutable view of a cold store prefix.
///
/// Holds shared ownership of the segments it covers, so it stays readable
/// after the writer is gone.
#[derive(Debug, Clone, Default)]
pub struct ColdView {
    head: Option<Arc<SliceNode>>,
    len: usize,
}

impl ColdView {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps a dumped byte image.
    pub fn from_bytes(data: Bytes) -> Self {
        let len = data.len();
        if len == 0 {
            return Self::empty();
        }
        Self {
            head: Some(Arc::new(SliceNode {
                data,
                next: OnceLock::new(),
            })),
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The first `len` bytes of this view.
    pub fn truncated(&self, len: usize) -> ColdView {
        ColdView {
            head: self.head.clone(),
            len: len.min(self.len),
        }
    }

    pub fn segments(&self) -> Segments<'_> {
        Segments {
            node: self.head.as_deref(),
            remaining: self.len,
        }
    }

    /// Owned segment handles, cheap clones of the published chunks.
    pub fn bytes_segments(&self) -> Vec<Bytes> {
        let mut out = Vec::new();
        let mut node = self.head.as_deref();
        let mut remaining = self.len;
        while let Some(n) = node {
            if remaining == 0 {
                break;
            }
            let take = n.data.len().min(remaining);
            out.push(n.data.slice(..take));
            remaining -= take;
            node = n.next.get().map(Arc::as_ref);
        }
        out
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for seg in self.segments() {
            out.extend_from_slice(seg);
        }
        out
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        for seg in self.segments() {
            writer.write_all(seg)?;
        }
        Ok(())
    }

    pub fn reader(&self) -> ByteSliceReader {
        ByteSliceReader::new(self)
    }
}

/// Borrowed walk over the segments of a [`ColdView`].
pub struct Segments<'a> {
    node: Option<&'a SliceNode>,
    remaining: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.node?;
        let take = node.data.len().min(self.remaining);
        self.remaining -= take;
        self.node = node.next.get().map(Arc::as_ref);
        Some(&node.data[..take])
    }
}
