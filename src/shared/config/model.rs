use serde::Deserialize;

use crate::engine::core::column::hot_buffer::MAX_HOT_CAPACITY;
use crate::engine::errors::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub posting: PostingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Block cadences and short-list thresholds for doc, position and skip lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Documents per compressed doc-list block.
    pub doc_block_size: usize,
    /// Positions per compressed position-list block.
    pub pos_block_size: usize,
    /// Skip entries per compressed skip-list block.
    pub skip_block_size: usize,
    pub short_list_max_docs: usize,
    pub short_list_max_positions: usize,
    pub short_list_max_skip_items: usize,
    /// Documents between two recorded TF bitmap block offsets.
    pub tf_bitmap_block_docs: usize,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            doc_block_size: 128,
            pos_block_size: 128,
            skip_block_size: 32,
            short_list_max_docs: 5,
            short_list_max_positions: 5,
            short_list_max_skip_items: 10,
            tf_bitmap_block_docs: 128,
        }
    }
}

impl PostingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("posting.doc_block_size", self.doc_block_size),
            ("posting.pos_block_size", self.pos_block_size),
            ("posting.skip_block_size", self.skip_block_size),
        ] {
            if value == 0 || value > MAX_HOT_CAPACITY {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be within 1..={MAX_HOT_CAPACITY}, got {value}"),
                });
            }
        }
        if self.tf_bitmap_block_docs == 0 {
            return Err(ConfigError::Invalid {
                field: "posting.tf_bitmap_block_docs",
                reason: "must be non-zero".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub cold_chunk_init_bytes: usize,
    pub cold_chunk_max_bytes: usize,
    /// Budget of the writer-side pool; `None` means unbounded.
    pub pool_limit_bytes: Option<usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cold_chunk_init_bytes: 64,
            cold_chunk_max_bytes: 64 * 1024,
            pool_limit_bytes: None,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cold_chunk_init_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "memory.cold_chunk_init_bytes",
                reason: "must be non-zero".into(),
            });
        }
        if self.cold_chunk_max_bytes < self.cold_chunk_init_bytes {
            return Err(ConfigError::Invalid {
                field: "memory.cold_chunk_max_bytes",
                reason: format!(
                    "must be >= cold_chunk_init_bytes ({})",
                    self.cold_chunk_init_bytes
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling log file; stdout only when unset.
    pub log_dir: Option<String>,
    pub stdout_level: String,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            stdout_level: "info".into(),
            file_level: "debug".into(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.posting.validate()?;
        self.memory.validate()
    }
}

use std::env;

/// Where settings are read from: `POSTINGS_CONFIG`, else `config/postings`.
pub fn settings_path() -> String {
    env::var("POSTINGS_CONFIG").unwrap_or_else(|_| "config/postings".to_string())
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Reads and validates settings from `path`. A missing file yields defaults.
pub fn load_settings_from(path: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}

pub fn settings_from_toml(source: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::from_str(source, config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}
