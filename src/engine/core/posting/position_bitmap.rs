use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::engine::core::buffer::ByteSliceList;
use crate::engine::core::column::compression::{ByteRead, vuint_len};
use crate::engine::errors::PostingError;

const PAGE_WORDS: usize = 256;

/// Fixed page of words; pages never move once linked.
#[derive(Debug)]
struct WordPage {
    words: Box<[AtomicU32]>,
    next: OnceLock<Arc<WordPage>>,
}

impl WordPage {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            words: (0..PAGE_WORDS).map(|_| AtomicU32::new(0)).collect(),
            next: OnceLock::new(),
        })
    }
}

/// Append-only word array written by one writer and copied by readers.
#[derive(Debug, Default)]
struct WordChain {
    head: OnceLock<Arc<WordPage>>,
}

impl WordChain {
    fn copy_prefix(&self, len: usize, out: &mut Vec<u32>) {
        let mut page = self.head.get();
        while out.len() < len {
            let Some(p) = page else { break };
            let take = (len - out.len()).min(PAGE_WORDS);
            out.extend(p.words[..take].iter().map(|w| w.load(Ordering::Relaxed)));
            page = p.next.get();
        }
    }
}

/// Writer-side index over the pages of a [`WordChain`].
#[derive(Debug, Default)]
struct WordPages(Vec<Arc<WordPage>>);

impl WordPages {
    fn slot(&mut self, chain: &WordChain, idx: usize) -> &AtomicU32 {
        while self.0.len() <= idx / PAGE_WORDS {
            let page = WordPage::new();
            match self.0.last() {
                None => chain.head.get_or_init(|| Arc::clone(&page)),
                Some(last) => last.next.get_or_init(|| Arc::clone(&page)),
            };
            self.0.push(page);
        }
        &self.0[idx / PAGE_WORDS].words[idx % PAGE_WORDS]
    }

    fn get(&self, idx: usize) -> u32 {
        self.0
            .get(idx / PAGE_WORDS)
            .map_or(0, |p| p.words[idx % PAGE_WORDS].load(Ordering::Relaxed))
    }
}

fn pack_counts(blocks: u32, bit_count: u32) -> u64 {
    (blocks as u64) << 32 | bit_count as u64
}

/// Bitmap state readers copy while the writer appends.
#[derive(Debug)]
pub struct BitmapShared {
    block_docs: usize,
    words: WordChain,
    block_offsets: WordChain,
    /// Block count in the high half, bit count in the low half.
    counts: AtomicU64,
}

/// Cloneable reader handle onto a live [`PositionBitmapWriter`].
#[derive(Debug, Clone)]
pub struct BitmapHandle(Arc<BitmapShared>);

impl BitmapHandle {
    /// Copies the bitmap as of the last finished document.
    pub fn snapshot(&self) -> PositionBitmapReader {
        let shared = &self.0;
        let counts = shared.counts.load(Ordering::Acquire);
        let (blocks, bit_count) = ((counts >> 32) as usize, counts as u32);

        let mut block_offsets = Vec::with_capacity(blocks);
        shared.block_offsets.copy_prefix(blocks, &mut block_offsets);
        let word_count = (bit_count as usize).div_ceil(32);
        let mut words = Vec::with_capacity(word_count);
        shared.words.copy_prefix(word_count, &mut words);
        // bits of documents still being written
        if bit_count % 32 != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u32 << (bit_count % 32)) - 1;
            }
        }
        PositionBitmapReader {
            block_docs: shared.block_docs,
            block_offsets,
            bit_count,
            words,
        }
    }
}

/// First-occurrence bitmap used instead of a tf list.
///
/// Bit `i` is set when occurrence `i` of the term starts a document, so the
/// set bits enumerate documents and the gaps between them are their tfs.
/// Every `block_docs` documents the starting bit of the next document is
/// recorded to bound the scan of [`PositionBitmapReader::pos_count_info`].
/// Finished documents are visible through [`Self::handle`].
#[derive(Debug)]
pub struct PositionBitmapWriter {
    shared: Arc<BitmapShared>,
    words: WordPages,
    block_offsets: WordPages,
    bit_count: u32,
    blocks: u32,
}

impl PositionBitmapWriter {
    pub fn new(block_docs: usize) -> Self {
        Self {
            shared: Arc::new(BitmapShared {
                block_docs: block_docs.max(1),
                words: WordChain::default(),
                block_offsets: WordChain::default(),
                counts: AtomicU64::new(0),
            }),
            words: WordPages::default(),
            block_offsets: WordPages::default(),
            bit_count: 0,
            blocks: 0,
        }
    }

    pub fn handle(&self) -> BitmapHandle {
        BitmapHandle(Arc::clone(&self.shared))
    }

    pub fn set(&mut self, bit: u32) {
        self.words
            .slot(&self.shared.words, (bit / 32) as usize)
            .fetch_or(1 << (bit % 32), Ordering::Relaxed);
    }

    fn publish(&self) {
        self.shared
            .counts
            .store(pack_counts(self.blocks, self.bit_count), Ordering::Release);
    }

    /// Closes document number `df` (1-based); `total_tf` bits are now in use.
    pub fn end_document(&mut self, df: u32, total_tf: u32) {
        if total_tf > 0 {
            // zero words up to the last bit must exist for readers
            self.words
                .slot(&self.shared.words, (total_tf as usize - 1) / 32);
        }
        self.bit_count = total_tf;
        if df as usize % self.shared.block_docs == 0 {
            self.block_offsets
                .slot(&self.shared.block_offsets, self.blocks as usize)
                .store(total_tf, Ordering::Relaxed);
            self.blocks += 1;
        }
        self.publish();
    }

    /// Takes back the last [`Self::end_document`], whose first bit was
    /// `first_bit`. `df` and `total_tf` describe the document before it.
    pub fn undo_document(&mut self, first_bit: u32, df: u32, total_tf: u32) {
        self.words
            .slot(&self.shared.words, (first_bit / 32) as usize)
            .fetch_and(!(1 << (first_bit % 32)), Ordering::Relaxed);
        if (df + 1) as usize % self.shared.block_docs == 0 {
            self.blocks -= 1;
        }
        self.bit_count = total_tf;
        self.publish();
    }

    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    fn word_count(&self) -> usize {
        (self.bit_count as usize).div_ceil(32)
    }

    /// Bytes after the leading length word.
    fn body_length(&self) -> usize {
        vuint_len(self.blocks as u64)
            + 4 * self.blocks as usize
            + vuint_len(self.bit_count as u64)
            + 4 * self.word_count()
    }

    pub fn dump_length(&self) -> usize {
        4 + self.body_length()
    }

    /// Appends the bitmap image to `dst`, back-patching its length.
    pub fn dump(&self, dst: &mut ByteSliceList) -> Result<usize, PostingError> {
        let start = dst.len();
        let slot = dst.hold(4)?;
        dst.write_vuint32(self.blocks)?;
        for i in 0..self.blocks as usize {
            dst.write_u32_le(self.block_offsets.get(i))?;
        }
        dst.write_vuint32(self.bit_count)?;
        for i in 0..self.word_count() {
            dst.write_u32_le(self.words.get(i))?;
        }
        let body = dst.len() - start - 4;
        dst.patch(slot, &(body as u32).to_le_bytes())?;
        Ok(dst.len() - start)
    }
}

#[derive(Debug, Clone)]
pub struct PositionBitmapReader {
    block_docs: usize,
    block_offsets: Vec<u32>,
    bit_count: u32,
    words: Vec<u32>,
}

impl PositionBitmapReader {
    /// Parses a bitmap image, returning the reader and the bytes consumed.
    pub fn parse(data: &[u8], block_docs: usize) -> Result<(Self, usize), PostingError> {
        let mut src = data;
        let body = src.read_u32_le()? as usize;
        if body > src.len() {
            return Err(PostingError::corruption(format!(
                "bitmap body of {body} bytes, {} available",
                src.len()
            )));
        }
        let mut body_src = &src[..body];
        let blocks = body_src.read_vuint32()? as usize;
        let mut block_offsets = Vec::with_capacity(blocks.min(body / 4));
        for _ in 0..blocks {
            block_offsets.push(body_src.read_u32_le()?);
        }
        let bit_count = body_src.read_vuint32()?;
        let word_count = (bit_count as usize).div_ceil(32);
        let mut words = Vec::with_capacity(word_count.min(body / 4));
        for _ in 0..word_count {
            words.push(body_src.read_u32_le()?);
        }
        if !body_src.is_empty() {
            return Err(PostingError::corruption("trailing bytes in bitmap body"));
        }
        Ok((
            Self {
                block_docs: block_docs.max(1),
                block_offsets,
                bit_count,
                words,
            },
            4 + body,
        ))
    }

    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Heap bytes held by the copy.
    pub fn byte_size(&self) -> usize {
        4 * (self.words.len() + self.block_offsets.len())
    }

    fn nth_set_bit_from(&self, start: u32, mut n: u32) -> Option<u32> {
        let mut word_idx = (start / 32) as usize;
        let mut word = *self.words.get(word_idx)? & (!0u32 << (start % 32));
        loop {
            let ones = word.count_ones();
            if n < ones {
                for _ in 0..n {
                    word &= word - 1;
                }
                let bit = word_idx as u32 * 32 + word.trailing_zeros();
                return (bit < self.bit_count).then_some(bit);
            }
            n -= ones;
            word_idx += 1;
            word = *self.words.get(word_idx)?;
        }
    }

    /// `(positions before the document, its tf)` for document `doc_ordinal`
    /// (0-based).
    pub fn pos_count_info(&self, doc_ordinal: u32) -> Result<(u32, u32), PostingError> {
        let block = doc_ordinal as usize / self.block_docs;
        let start = match block {
            0 => 0,
            b => *self.block_offsets.get(b - 1).ok_or(PostingError::OutOfRange {
                start: doc_ordinal as usize,
                end: doc_ordinal as usize + 1,
                len: self.block_offsets.len() * self.block_docs,
            })?,
        };
        let in_block = (doc_ordinal as usize % self.block_docs) as u32;
        let out_of_range = || PostingError::OutOfRange {
            start: doc_ordinal as usize,
            end: doc_ordinal as usize + 1,
            len: self.words.iter().map(|w| w.count_ones() as usize).sum(),
        };
        let first = self.nth_set_bit_from(start, in_block).ok_or_else(out_of_range)?;
        let next = self
            .nth_set_bit_from(first + 1, 0)
            .unwrap_or(self.bit_count);
        Ok((first, next - first))
    }
}
