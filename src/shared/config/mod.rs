pub mod global;
pub mod model;

pub use global::CONFIG;
pub use model::{
    LoggingConfig, MemoryConfig, PostingConfig, Settings, load_settings, load_settings_from,
    settings_path,
};
