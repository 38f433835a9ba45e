use std::sync::Arc;

use crate::engine::core::buffer::buffered_column_store::StoreSnapshot;
use crate::engine::core::buffer::byte_slice_reader::ByteSliceReader;
use crate::engine::core::column::compression::decode_block;
use crate::engine::core::column::format::{ColumnId, ColumnValue};
use crate::engine::core::column::hot_buffer::HotBufferSnapshot;
use crate::engine::core::column::row_schema::RowSchema;
use crate::engine::errors::PostingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Cold,
    Hot,
}

/// Decodes a [`StoreSnapshot`] one record block at a time.
///
/// Every column of a block is decoded once, in schema order, before the next
/// block starts. Cold blocks come first; the hot copy is served raw once the
/// cold region is exhausted.
#[derive(Debug)]
pub struct BufferedStoreReader {
    schema: Arc<RowSchema>,
    cold: ByteSliceReader,
    hot: HotBufferSnapshot,
    hot_consumed: bool,
    next_column: usize,
    source: Source,
    block_len: usize,
    block: Vec<u64>,
}

impl BufferedStoreReader {
    pub fn open(snapshot: &StoreSnapshot) -> Self {
        Self {
            schema: Arc::clone(snapshot.schema()),
            cold: snapshot.cold().reader(),
            hot: snapshot.hot().clone(),
            hot_consumed: false,
            next_column: 0,
            source: Source::Cold,
            block_len: 0,
            block: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    /// Decodes the current block of `column` into `out`, replacing its
    /// contents. `None` once cold and hot rows are both consumed.
    pub fn decode<T: ColumnValue>(
        &mut self,
        column: ColumnId<T>,
        out: &mut Vec<T>,
    ) -> Result<Option<usize>, PostingError> {
        self.schema.check(column)?;
        let index = column.index();
        if index != self.next_column {
            return Err(PostingError::ColumnOrder {
                expected: self.next_column,
                got: index,
            });
        }

        if index == 0 {
            self.source = if !self.cold.is_eof() {
                Source::Cold
            } else if !self.hot_consumed && !self.hot.is_empty() {
                Source::Hot
            } else {
                return Ok(None);
            };
        }

        out.clear();
        let count = match self.source {
            Source::Cold => {
                if self.cold.is_eof() {
                    return Err(PostingError::corruption(format!(
                        "cold bytes end before column {index} of a record block"
                    )));
                }
                let scalar = T::SCALAR;
                self.block.clear();
                let (_, count) = decode_block(scalar, &mut self.cold, &mut self.block)?;
                if index > 0 && count != self.block_len {
                    return Err(PostingError::corruption(format!(
                        "column {index} block holds {count} values, column 0 held {}",
                        self.block_len
                    )));
                }
                out.extend(self.block.iter().map(|bits| T::from_bits(*bits)));
                count
            }
            Source::Hot => {
                let values = self.hot.column(index);
                out.extend(values.iter().map(|bits| T::from_bits(*bits)));
                values.len()
            }
        };

        if index == 0 {
            self.block_len = count;
        }
        self.next_column = (index + 1) % self.schema.len();
        if self.source == Source::Hot && self.next_column == 0 {
            self.hot_consumed = true;
        }
        Ok(Some(count))
    }

    /// Moves the cold cursor to `offset`, a block boundary recorded by a skip
    /// list, and restarts at column 0.
    pub fn seek(&mut self, offset: usize) -> Result<(), PostingError> {
        self.cold.seek(offset)?;
        self.next_column = 0;
        self.hot_consumed = false;
        Ok(())
    }

    #[inline]
    pub fn tell(&self) -> usize {
        self.cold.tell()
    }

    #[inline]
    pub fn cold_len(&self) -> usize {
        self.cold.len()
    }

    /// Whether the next column-0 decode would return `None`.
    pub fn is_exhausted(&self) -> bool {
        self.next_column == 0 && self.cold.is_eof() && (self.hot_consumed || self.hot.is_empty())
    }
}
