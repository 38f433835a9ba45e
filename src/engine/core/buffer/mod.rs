pub mod buffered_column_store;
pub mod buffered_store_reader;
pub mod byte_slice_list;
pub mod byte_slice_reader;
pub mod flush_info;

pub use buffered_column_store::{BufferedColumnStore, StoreHandle, StoreSnapshot};
pub use buffered_store_reader::BufferedStoreReader;
pub use byte_slice_list::{ByteSliceList, ColdHandle, ColdView, Reservation};
pub use byte_slice_reader::ByteSliceReader;
pub use flush_info::{AtomicFlushInfo, FlushInfo};
