pub mod core;
pub mod errors;

pub use errors::*;
