//! Data model shared by the engine and its front ends
//!
//! - `data_type` - base kinds and type descriptors
//! - `value` - decoded values
//! - `profile` - validated profile and resource definitions
//! - `snapshot` - rows emitted by a poll

pub mod data_type;
pub mod profile;
pub mod snapshot;
pub mod value;

pub use data_type::*;
pub use profile::*;
pub use snapshot::*;
pub use value::*;
