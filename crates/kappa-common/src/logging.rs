//! Logging utilities for KappaView
//!
//! Console and/or file output through `tracing-subscriber`, configured from
//! the `[logging]` table of the viewer config.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Logging configuration matching the config file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable console logging (stderr)
    #[serde(default = "default_true")]
    pub console_enabled: bool,

    /// Enable file logging
    #[serde(default)]
    pub file_enabled: bool,

    /// Log file path
    #[serde(default = "default_log_path")]
    pub file_path: String,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include file/line info
    #[serde(default)]
    pub file_info: bool,

    /// Include module target
    #[serde(default = "default_true")]
    pub show_target: bool,

    /// Use ANSI colors on the console
    #[serde(default = "default_true")]
    pub ansi_colors: bool,

    /// Log level as string
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "kappa-view.log".to_string()
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: default_log_path(),
            timestamps: true,
            file_info: false,
            show_target: true,
            ansi_colors: true,
            level: default_level(),
        }
    }
}

impl LogConfig {
    pub fn with_file(mut self, path: &str) -> Self {
        self.file_enabled = true;
        self.file_path = path.to_string();
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    /// Parse level string to tracing Level
    pub fn get_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` takes precedence over the configured level. Only the first call
/// installs a subscriber; later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(config.get_level()).into())
    });

    let file = if config.file_enabled && !config.file_path.is_empty() {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file_path)
            .ok()
    } else {
        None
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_enabled {
        let layer = fmt::layer()
            .with_ansi(config.ansi_colors)
            .with_target(config.show_target)
            .with_file(config.file_info)
            .with_line_number(config.file_info)
            .with_writer(std::io::stderr);
        if config.timestamps {
            layers.push(layer.boxed());
        } else {
            layers.push(layer.without_time().boxed());
        }
    }

    if let Some(file) = file {
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(config.show_target)
                .with_file(config.file_info)
                .with_line_number(config.file_info)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);
    let _ = tracing::subscriber::set_global_default(subscriber);
}
