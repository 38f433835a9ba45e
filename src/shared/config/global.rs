use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::shared::config::model::{Settings, load_settings_from, settings_path};

/// Process-wide settings, loaded and validated on first use. Both the tool
/// and the logging layer read from here, so a bad file stops the process
/// before any posting list is built.
pub static CONFIG: Lazy<Arc<Settings>> = Lazy::new(|| {
    let path = settings_path();
    match load_settings_from(&path) {
        Ok(settings) => Arc::new(settings),
        Err(e) => panic!("Failed to load postings configuration from {path}: {e}"),
    }
});
