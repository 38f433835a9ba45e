use std::sync::Arc;

use crate::engine::core::column::format::{ColumnDescriptor, ColumnId, ColumnValue, ScalarType};
use crate::engine::errors::PostingError;

pub const MAX_COLUMNS: usize = 8;

/// Ordered, fixed set of columns shared by a hot buffer and its flushed blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    columns: Vec<ColumnDescriptor>,
    row_width: usize,
}

impl RowSchema {
    pub fn builder() -> RowSchemaBuilder {
        RowSchemaBuilder::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Sum of all column widths in bytes.
    #[inline]
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub(crate) fn check<T: ColumnValue>(&self, column: ColumnId<T>) -> Result<(), PostingError> {
        match self.columns.get(column.index()) {
            Some(desc) if desc.scalar == T::SCALAR => Ok(()),
            Some(desc) => Err(PostingError::InvalidSchema(format!(
                "column {} holds {:?}, not {:?}",
                column.index(),
                desc.scalar,
                T::SCALAR
            ))),
            None => Err(PostingError::InvalidSchema(format!(
                "column {} not in schema of {} columns",
                column.index(),
                self.columns.len()
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct RowSchemaBuilder {
    scalars: Vec<ScalarType>,
}

impl RowSchemaBuilder {
    /// Appends a column of type `T` and returns its typed handle.
    pub fn column<T: ColumnValue>(&mut self) -> ColumnId<T> {
        let id = ColumnId::new(self.scalars.len());
        self.scalars.push(T::SCALAR);
        id
    }

    pub fn build(self) -> Result<Arc<RowSchema>, PostingError> {
        if self.scalars.is_empty() {
            return Err(PostingError::InvalidSchema("schema has no columns".into()));
        }
        if self.scalars.len() > MAX_COLUMNS {
            return Err(PostingError::InvalidSchema(format!(
                "{} columns exceed the limit of {MAX_COLUMNS}",
                self.scalars.len()
            )));
        }

        let mut row_offset = 0;
        let columns = self
            .scalars
            .into_iter()
            .enumerate()
            .map(|(index, scalar)| {
                let desc = ColumnDescriptor {
                    index,
                    scalar,
                    row_offset,
                };
                row_offset += scalar.width();
                desc
            })
            .collect();

        Ok(Arc::new(RowSchema {
            columns,
            row_width: row_offset,
        }))
    }
}
