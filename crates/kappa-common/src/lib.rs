//! KappaView Common Types
//!
//! Error taxonomy, data model, logging and configuration shared by the engine
//! and the viewer.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{OutputFormat, ViewerConfig};
pub use error::{
    ConversionError, DecodeError, Error, MemoryError, ProfileError, Result, ScriptError,
};
pub use logging::{init_logging, LogConfig};
pub use types::*;

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
