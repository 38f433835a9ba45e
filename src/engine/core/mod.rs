pub mod buffer;
pub mod column;
pub mod memory;
pub mod posting;
pub mod skiplist;
