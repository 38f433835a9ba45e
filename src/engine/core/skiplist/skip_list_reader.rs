use bytes::Bytes;

use crate::engine::core::buffer::{BufferedStoreReader, StoreSnapshot};
use crate::engine::core::skiplist::skip_list_writer::{SkipColumns, SkipListHandle, SkipListKind};
use crate::engine::errors::PostingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipListState {
    /// Nothing loaded yet.
    Empty,
    Buffered,
    /// Every entry was consumed and the last query passed them all.
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Entry {
    key: u32,
    ttf: u32,
    value: u32,
}

/// Forward-only cursor over skip entries with absolute keys.
#[derive(Debug)]
pub struct SkipListReader {
    kind: SkipListKind,
    reference: bool,
    columns: SkipColumns,
    reader: BufferedStoreReader,
    state: SkipListState,
    block: Vec<Entry>,
    pos: usize,
    current: Entry,
    prev: Entry,
    /// Absolute values of the last entry loaded so far.
    last_in_buffer: Entry,
    keys: Vec<u32>,
    ttfs: Vec<u32>,
    values: Vec<u32>,
}

impl SkipListReader {
    pub fn open(
        snapshot: &StoreSnapshot,
        kind: SkipListKind,
        reference: bool,
    ) -> Result<Self, PostingError> {
        let columns = kind.columns()?;
        if snapshot.schema().as_ref() != columns.schema.as_ref() {
            return Err(PostingError::InvalidSchema(format!(
                "snapshot is not a {kind:?} skip list"
            )));
        }
        Ok(Self {
            kind,
            reference,
            columns,
            reader: BufferedStoreReader::open(snapshot),
            state: SkipListState::Empty,
            block: Vec::new(),
            pos: 0,
            current: Entry::default(),
            prev: Entry::default(),
            last_in_buffer: Entry::default(),
            keys: Vec::new(),
            ttfs: Vec::new(),
            values: Vec::new(),
        })
    }

    /// Reads a live skip list through a private snapshot.
    pub fn load(handle: &SkipListHandle) -> Result<Self, PostingError> {
        Self::open(&handle.store.snapshot(), handle.kind, handle.reference)
    }

    /// Reads a dumped skip list.
    pub fn open_dump(data: Bytes, kind: SkipListKind, reference: bool) -> Result<Self, PostingError> {
        let columns = kind.columns()?;
        let snapshot = StoreSnapshot::from_dump(columns.schema, data)?;
        Self::open(&snapshot, kind, reference)
    }

    #[inline]
    pub fn kind(&self) -> SkipListKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> SkipListState {
        self.state
    }

    fn load_block(&mut self) -> Result<bool, PostingError> {
        let Some(count) = self.reader.decode(self.columns.key, &mut self.keys)? else {
            return Ok(false);
        };
        self.ttfs.clear();
        if let Some(ttf) = self.columns.ttf {
            self.reader.decode(ttf, &mut self.ttfs)?;
        }
        self.reader.decode(self.columns.value, &mut self.values)?;

        self.block.clear();
        let mut acc = self.last_in_buffer;
        for i in 0..count {
            let ttf = self.ttfs.get(i).copied().unwrap_or(0);
            acc = if self.reference {
                Entry {
                    key: self.keys[i],
                    ttf,
                    value: self.values[i],
                }
            } else {
                Entry {
                    key: acc.key.wrapping_add(self.keys[i]),
                    ttf: acc.ttf.wrapping_add(ttf),
                    value: acc.value.wrapping_add(self.values[i]),
                }
            };
            self.block.push(acc);
        }
        self.last_in_buffer = acc;
        self.pos = 0;
        Ok(true)
    }

    /// Moves to the first entry whose key is `>= query`. Returns `false` when
    /// every entry is below `query`; `prev_*` then name the last entry.
    pub fn skip_to(&mut self, query: u32) -> Result<bool, PostingError> {
        if self.state == SkipListState::Exhausted {
            return Ok(false);
        }
        loop {
            while let Some(entry) = self.block.get(self.pos).copied() {
                if entry.key >= query {
                    self.current = entry;
                    self.state = SkipListState::Buffered;
                    return Ok(true);
                }
                self.prev = entry;
                self.pos += 1;
            }
            if !self.load_block()? {
                self.state = SkipListState::Exhausted;
                return Ok(false);
            }
        }
    }

    pub fn prev_key(&self) -> u32 {
        self.prev.key
    }

    pub fn prev_ttf(&self) -> u32 {
        self.prev.ttf
    }

    pub fn prev_value(&self) -> u32 {
        self.prev.value
    }

    pub fn current_key(&self) -> u32 {
        self.current.key
    }

    pub fn current_ttf(&self) -> u32 {
        self.current.ttf
    }

    pub fn current_value(&self) -> u32 {
        self.current.value
    }

    pub fn last_key_in_buffer(&self) -> u32 {
        self.last_in_buffer.key
    }

    pub fn last_ttf_in_buffer(&self) -> u32 {
        self.last_in_buffer.ttf
    }

    pub fn last_value_in_buffer(&self) -> u32 {
        self.last_in_buffer.value
    }
}
