pub mod compression;
pub mod format;
pub mod hot_buffer;
pub mod row_schema;

pub use format::{ColumnDescriptor, ColumnId, ColumnValue, ScalarType};
pub use hot_buffer::{HotBuffer, HotBufferShared, HotBufferSnapshot, MAX_HOT_CAPACITY};
pub use row_schema::{MAX_COLUMNS, RowSchema, RowSchemaBuilder};

#[cfg(test)]
mod hot_buffer_test;
