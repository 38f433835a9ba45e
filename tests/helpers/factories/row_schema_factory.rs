use std::sync::Arc;

use crate::engine::core::buffer::{BufferedColumnStore, BufferedStoreReader};
use crate::engine::core::column::{ColumnId, RowSchema, ScalarType};
use crate::engine::errors::PostingError;

/// Type-erased column handle for schemas built at test time.
#[derive(Debug, Clone, Copy)]
pub enum AnyColumn {
    U8(ColumnId<u8>),
    U16(ColumnId<u16>),
    U32(ColumnId<u32>),
    U64(ColumnId<u64>),
}

impl AnyColumn {
    pub fn scalar(&self) -> ScalarType {
        match self {
            AnyColumn::U8(_) => ScalarType::U8,
            AnyColumn::U16(_) => ScalarType::U16,
            AnyColumn::U32(_) => ScalarType::U32,
            AnyColumn::U64(_) => ScalarType::U64,
        }
    }

    pub fn push(&self, store: &mut BufferedColumnStore, v: u64) -> Result<(), PostingError> {
        match *self {
            AnyColumn::U8(c) => store.push_back(c, v as u8),
            AnyColumn::U16(c) => store.push_back(c, v as u16),
            AnyColumn::U32(c) => store.push_back(c, v as u32),
            AnyColumn::U64(c) => store.push_back(c, v),
        }
    }

    pub fn decode(
        &self,
        reader: &mut BufferedStoreReader,
        out: &mut Vec<u64>,
    ) -> Result<Option<usize>, PostingError> {
        macro_rules! decode_as {
            ($c:expr) => {{
                let mut typed = Vec::new();
                let n = reader.decode($c, &mut typed)?;
                out.extend(typed.into_iter().map(|v| v as u64));
                Ok(n)
            }};
        }
        match *self {
            AnyColumn::U8(c) => decode_as!(c),
            AnyColumn::U16(c) => decode_as!(c),
            AnyColumn::U32(c) => decode_as!(c),
            AnyColumn::U64(c) => decode_as!(c),
        }
    }
}

/// Schema plus handles, with a deterministic value for every cell.
#[derive(Debug, Clone)]
pub struct MixedSchema {
    pub schema: Arc<RowSchema>,
    pub columns: Vec<AnyColumn>,
}

impl MixedSchema {
    /// Value stored at (`row`, `col`), kept inside the column's range.
    pub fn value(&self, row: usize, col: usize) -> u64 {
        let raw = (row as u64).wrapping_mul(2_654_435_761).wrapping_add(col as u64 * 97);
        raw & self.columns[col].scalar().max_value()
    }

    pub fn push_row(&self, store: &mut BufferedColumnStore, row: usize) -> Result<(), PostingError> {
        for (col, c) in self.columns.iter().enumerate() {
            c.push(store, self.value(row, col))?;
        }
        store.end_push_back()
    }

    /// Decodes every block of `reader`, returning rows as `u64` cells.
    pub fn read_all(&self, reader: &mut BufferedStoreReader) -> Result<Vec<Vec<u64>>, PostingError> {
        let mut rows = Vec::new();
        loop {
            let mut block: Vec<Vec<u64>> = Vec::with_capacity(self.columns.len());
            for c in &self.columns {
                let mut out = Vec::new();
                match c.decode(reader, &mut out)? {
                    Some(_) => block.push(out),
                    None => return Ok(rows),
                }
            }
            for r in 0..block[0].len() {
                rows.push(block.iter().map(|col| col[r]).collect());
            }
        }
    }

    pub fn expected_rows(&self, n: usize) -> Vec<Vec<u64>> {
        (0..n)
            .map(|r| (0..self.columns.len()).map(|c| self.value(r, c)).collect())
            .collect()
    }
}

/// Factory for schemas of 1..=8 columns cycling through the scalar types.
pub struct RowSchemaFactory {
    scalars: Vec<ScalarType>,
}

impl RowSchemaFactory {
    pub fn new() -> Self {
        Self { scalars: vec![] }
    }

    pub fn with_column(mut self, scalar: ScalarType) -> Self {
        self.scalars.push(scalar);
        self
    }

    /// `n` columns cycling `u32, u8, u64, u16`.
    pub fn mixed(n: usize) -> Self {
        const CYCLE: [ScalarType; 4] = [
            ScalarType::U32,
            ScalarType::U8,
            ScalarType::U64,
            ScalarType::U16,
        ];
        Self {
            scalars: (0..n).map(|i| CYCLE[i % CYCLE.len()]).collect(),
        }
    }

    pub fn create(self) -> MixedSchema {
        let mut b = RowSchema::builder();
        let columns = self
            .scalars
            .iter()
            .map(|s| match s {
                ScalarType::U8 => AnyColumn::U8(b.column::<u8>()),
                ScalarType::U16 => AnyColumn::U16(b.column::<u16>()),
                ScalarType::U32 => AnyColumn::U32(b.column::<u32>()),
                ScalarType::U64 => AnyColumn::U64(b.column::<u64>()),
            })
            .collect();
        MixedSchema {
            schema: b.build().expect("factory schema"),
            columns,
        }
    }
}
