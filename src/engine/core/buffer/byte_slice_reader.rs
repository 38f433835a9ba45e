use bytes::Bytes;

use crate::engine::core::buffer::byte_slice_list::ColdView;
use crate::engine::core::column::compression::ByteRead;
use crate::engine::errors::PostingError;

/// Sequential, seekable reader over a [`ColdView`].
#[derive(Debug, Clone)]
pub struct ByteSliceReader {
    segments: Vec<Bytes>,
    /// Absolute offset of each segment's first byte.
    starts: Vec<usize>,
    len: usize,
    seg: usize,
    seg_pos: usize,
}

impl ByteSliceReader {
    pub fn new(view: &ColdView) -> Self {
        let segments = view.bytes_segments();
        let mut starts = Vec::with_capacity(segments.len());
        let mut at = 0;
        for s in &segments {
            starts.push(at);
            at += s.len();
        }
        Self {
            segments,
            starts,
            len: at,
            seg: 0,
            seg_pos: 0,
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

    pub fn tell(&self) -> usize {
        match self.starts.get(self.seg) {
            Some(start) => start + self.seg_pos,
            None => self.len,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.tell()
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), PostingError> {
        if offset > self.len {
            return Err(PostingError::OutOfRange {
                start: offset,
                end: offset,
                len: self.len,
            });
        }
        if offset == self.len {
            self.seg = self.segments.len();
            self.seg_pos = 0;
            return Ok(());
        }
        let idx = self.starts.partition_point(|s| *s <= offset) - 1;
        self.seg = idx;
        self.seg_pos = offset - self.starts[idx];
        Ok(())
    }

    fn advance(&mut self, n: usize) {
        self.seg_pos += n;
        if self
            .segments
            .get(self.seg)
            .is_some_and(|s| self.seg_pos == s.len())
        {
            self.seg += 1;
            self.seg_pos = 0;
        }
    }
}

impl ByteRead for ByteSliceReader {
    fn read_u8(&mut self) -> Result<u8, PostingError> {
        let byte = self
            .segments
            .get(self.seg)
            .and_then(|s| s.get(self.seg_pos).copied())
            .ok_or_else(|| PostingError::corruption("read past end of cold bytes"))?;
        self.advance(1);
        Ok(byte)
    }

    fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<(), PostingError> {
        if dst.len() > self.remaining() {
            return Err(PostingError::corruption(format!(
                "need {} bytes, {} left in cold bytes",
                dst.len(),
                self.remaining()
            )));
        }
        let mut filled = 0;
        while filled < dst.len() {
            let seg = &self.segments[self.seg];
            let n = (seg.len() - self.seg_pos).min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&seg[self.seg_pos..self.seg_pos + n]);
            filled += n;
            self.advance(n);
        }
        Ok(())
    }
}
