pub mod posting_factory;
pub mod row_schema_factory;

pub use posting_factory::{ExpectedDoc, PostingFactory};
pub use row_schema_factory::{AnyColumn, MixedSchema, RowSchemaFactory};

#[cfg(test)]
mod posting_factory_test;
#[cfg(test)]
mod row_schema_factory_test;
