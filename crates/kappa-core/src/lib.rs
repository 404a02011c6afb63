//! KappaView Core Library
//!
//! Resolves the resources described by a profile against a live process:
//! a typed codec for raw bytes, the profile validator, a Lua scripting bridge,
//! pointer-chain memory access and the polling engine that ties them together.

pub mod codec;
pub mod engine;
pub mod memory;
pub mod profile;
pub mod script;
pub mod traits;

pub use engine::{Engine, ResourceState};
pub use kappa_common::{Error, Result};
pub use memory::ProcessMemory;
pub use script::{ScriptBridge, ScriptFunction};
pub use traits::*;
