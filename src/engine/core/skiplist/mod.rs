pub mod skip_list_reader;
pub mod skip_list_writer;

pub use skip_list_reader::{SkipListReader, SkipListState};
pub use skip_list_writer::{SkipColumns, SkipListHandle, SkipListKind, SkipListWriter};
