use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::error::{ImportError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "workout_import.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Lines per concurrent parse task
    pub chunk_size: usize,
    /// Workouts per persistence batch
    pub batch_size: usize,
    /// How long `Completed` stays visible before the status resets
    pub completed_reset_delay_ms: u64,
    pub database_path: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: 50,
            completed_reset_delay_ms: 2_000,
            database_path: PathBuf::from("data/workouts.db"),
        }
    }
}

impl ImportConfig {
    /// Load `workout_import.toml` when present, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ImportConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(db) = std::env::var("WORKOUT_IMPORT_DB") {
            if !db.trim().is_empty() {
                self.database_path = PathBuf::from(db);
            }
        }
        if let Some(v) = env_number("WORKOUT_IMPORT_CHUNK_SIZE")? {
            self.chunk_size = v as usize;
        }
        if let Some(v) = env_number("WORKOUT_IMPORT_BATCH_SIZE")? {
            self.batch_size = v as usize;
        }
        if let Some(v) = env_number("WORKOUT_IMPORT_RESET_DELAY_MS")? {
            self.completed_reset_delay_ms = v;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ImportError::Config("chunk_size must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ImportError::Config("batch_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn completed_reset_delay(&self) -> Duration {
        Duration::from_millis(self.completed_reset_delay_ms)
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ImportError::Config(format!("{key}='{v}' is not a number: {e}"))),
        _ => Ok(None),
    }
}
