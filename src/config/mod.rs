//! Configuration for linkdex

mod filters;
mod import;
mod logging;

pub use filters::{FilterTables, FILE_EXTENSIONS, IGNORE_DOMAINS, IGNORE_QUERY, IGNORE_TLD};
pub use import::{
    ImportConfig, ENV_DATA_PATH, ENV_MAX_THREADS, ENV_MAX_WAT_FILES, MAX_THREADS, MAX_WAT_FILES,
    MIN_THREADS, MIN_WAT_FILES,
};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level configuration for a linkdex process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Import pipeline configuration
    #[serde(default)]
    pub import: ImportConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import: ImportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !(MIN_THREADS..=MAX_THREADS).contains(&self.import.max_threads) {
            errors.push(format!(
                "max_threads must be between {} and {}",
                MIN_THREADS, MAX_THREADS
            ));
        }
        if !(MIN_WAT_FILES..=MAX_WAT_FILES).contains(&self.import.max_wat_files) {
            errors.push(format!(
                "max_wat_files must be between {} and {}",
                MIN_WAT_FILES, MAX_WAT_FILES
            ));
        }
        if self.import.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }
        if self.import.download_retries == 0 {
            errors.push("download_retries must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_threads() {
        let mut cfg = valid_config();
        cfg.import.max_threads = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_threads must be between"));
    }

    #[test]
    fn validate_rejects_oversized_pool() {
        let mut cfg = valid_config();
        cfg.import.max_threads = 64;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_data_dir() {
        let mut cfg = valid_config();
        cfg.import.data_dir = PathBuf::from("");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("data_dir must not be empty"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = valid_config();
        cfg.import.max_threads = 0;
        cfg.import.max_wat_files = 0;
        cfg.import.download_retries = 0;
        let msg = cfg.validate().unwrap_err().to_string();
        assert!(msg.contains("max_threads"));
        assert!(msg.contains("max_wat_files"));
        assert!(msg.contains("download_retries"));
    }
}
