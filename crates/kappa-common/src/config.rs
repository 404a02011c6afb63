//! Viewer configuration
//!
//! Optional TOML file controlling poll timing, output format and logging.

use crate::error::{Error, Result};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `label: value` lines
    #[default]
    Text,
    /// One JSON array of rows per poll
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Delay between polls while attached
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay between attach attempts while the target is not running
    #[serde(default = "default_attach_interval_ms")]
    pub attach_interval_ms: u64,
    /// Give up waiting for the target after this long (0 = wait forever)
    #[serde(default)]
    pub attach_timeout_ms: u64,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub logging: LogConfig,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_attach_interval_ms() -> u64 {
    50
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            attach_interval_ms: default_attach_interval_ms(),
            attach_timeout_ms: 0,
            output: OutputFormat::default(),
            logging: LogConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.attach_interval_ms, 50);
        assert_eq!(config.attach_timeout_ms, 0);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            poll_interval_ms = 100
            output = "json"

            [logging]
            level = "debug"
            ansi_colors = false
        "#;
        let config = ViewerConfig::from_toml(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.attach_interval_ms, 50);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.ansi_colors);
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = ViewerConfig::from_toml("output = \"xml\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "attach_timeout_ms = 5000").unwrap();
        let config = ViewerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.attach_timeout_ms, 5000);
    }

    #[test]
    fn test_from_missing_file() {
        let err = ViewerConfig::from_file("/nonexistent/kappa.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
