//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - Environment variables
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod types;

pub use types::{DisplayConfig, LoggingConfig, ServiceConfig, WindowConfig};

/// Allowed magnitude of the off-screen window offset, in pixels
pub const OFFSET_RANGE: std::ops::RangeInclusive<u32> = 600..=800;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Control surface configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Virtual display configuration
    #[serde(default)]
    pub display: DisplayConfig,
    /// Overlay window configuration
    #[serde(default)]
    pub window: WindowConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.service.socket_path.as_os_str().is_empty() {
            anyhow::bail!("Invalid config: service.socket_path is empty");
        }

        if self.display.name.is_empty() {
            anyhow::bail!("Invalid config: display.name is empty");
        }

        // The raw backing surface must stay off-screen
        if !OFFSET_RANGE.contains(&self.window.offset_x.unsigned_abs()) {
            anyhow::bail!(
                "Invalid config: window.offset_x {} outside ±{}..={}",
                self.window.offset_x,
                OFFSET_RANGE.start(),
                OFFSET_RANGE.end()
            );
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(
        mut self,
        socket_path: Option<PathBuf>,
        log_format: Option<String>,
        log_file: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = socket_path {
            self.service.socket_path = path;
        }
        if let Some(format) = log_format {
            self.logging.format = format;
        }
        if log_file.is_some() {
            self.logging.log_file = log_file;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default_config().unwrap();
        assert_eq!(config.display.name, "virtual-display");
        assert_eq!(config.window.offset_x, -640);
        assert_eq!(config.window.title, "display-container");
        assert!(!config.display.auto_create);
        assert_eq!(config.service.primary_user, 0);
    }

    #[test]
    fn test_config_validation_offset_out_of_range() {
        let mut config = Config::default_config().unwrap();
        config.window.offset_x = -100;
        assert!(config.validate().is_err());

        config.window.offset_x = 900;
        assert!(config.validate().is_err());

        config.window.offset_x = 700;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_display_name() {
        let mut config = Config::default_config().unwrap();
        config.display.name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default_config().unwrap();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
socket_path = "/tmp/broker-test.sock"

[display]
auto_create = true
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.service.socket_path, PathBuf::from("/tmp/broker-test.sock"));
        assert!(config.display.auto_create);
        assert_eq!(config.display.name, "virtual-display");
        assert_eq!(config.window.offset_x, -640);
    }

    #[test]
    fn test_load_rejects_display_geometry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[display]\ndensity_dpi = 320").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[window]\noffset_x = 10").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/builtin-broker.toml").is_err());
    }

    #[test]
    fn test_with_overrides() {
        let config = Config::default_config().unwrap().with_overrides(
            Some(PathBuf::from("/run/broker.sock")),
            Some("json".to_string()),
            None,
        );
        assert_eq!(config.service.socket_path, PathBuf::from("/run/broker.sock"));
        assert_eq!(config.logging.format, "json");
        assert!(config.logging.log_file.is_none());
    }
}
