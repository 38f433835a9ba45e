pub use super::factories::{PostingFactory, RowSchemaFactory};

pub struct Factory;

impl Factory {
    pub fn posting() -> PostingFactory {
        PostingFactory::new()
    }

    pub fn row_schema() -> RowSchemaFactory {
        RowSchemaFactory::new()
    }
}
