//! Error types for KappaView
//!
//! Every failure domain gets its own enum; [`Error`] wraps them so engine
//! operations can return a single `Result` type.

use crate::types::BaseKind;
use thiserror::Error;

/// A malformed or incomplete profile. Fatal to loading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("Failed to read profile {path}: {message}")]
    Read { path: String, message: String },

    #[error("Profile is not valid JSON: {0}")]
    Syntax(String),

    #[error("Profile root must be an object")]
    NotAnObject,

    #[error("Duplicate key defined: {0}")]
    DuplicateKey(String),

    #[error("Invalid value for \"{field}\" in {scope}")]
    InvalidField { field: String, scope: String },

    #[error("Unknown key defined: {attribute}. In resource: {resource}")]
    UnknownAttribute { attribute: String, resource: String },

    #[error("\"Name\" not defined. In resource: {0}")]
    MissingName(String),

    #[error("\"DataType\" not defined. In resource: {0}")]
    MissingDataType(String),

    #[error("Invalid data type in resource {resource}: {source}")]
    InvalidDataType {
        resource: String,
        #[source]
        source: DecodeError,
    },

    #[error("\"Type\" not defined. In resource: {0}")]
    MissingType(String),

    #[error("Unknown resource type defined: {value}. In resource: {resource}")]
    UnknownResourceType { value: String, resource: String },

    #[error("\"Address\" not defined. In resource: {0}")]
    MissingAddress(String),

    #[error("Invalid address offset \"{offset}\". In resource: {resource}")]
    InvalidOffset { offset: String, resource: String },

    #[error("Parameters for custom function not defined. In resource: {0}")]
    MissingParameters(String),

    #[error("Parameter \"{parameter}\" does not name a resource. In: {resource}")]
    UnknownParameter { parameter: String, resource: String },

    #[error("\"Version\" not defined")]
    MissingVersion,

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("\"Target\" not defined")]
    MissingTarget,

    #[error("\"Platform\" not defined")]
    MissingPlatform,

    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("\"Import\" not defined")]
    MissingImport,

    #[error("Parameters for reset function not defined")]
    MissingResetParameters,

    #[error("{} errors in profile, first: {}", .0.len(), first_message(.0))]
    Many(Vec<ProfileError>),
}

fn first_message(errors: &[ProfileError]) -> String {
    errors.first().map(|e| e.to_string()).unwrap_or_default()
}

/// Script loading or invocation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("Failed to load script {path}: {message}")]
    Load { path: String, message: String },

    #[error("Function \"{0}\" not found")]
    MissingFunction(String),

    #[error("Call to \"{function}\" failed: {message}")]
    Call { function: String, message: String },

    #[error("\"{function}\" returned an unsupported {kind} value")]
    UnsupportedReturn { function: String, kind: String },
}

/// Foreign process access failure. Fatal to the current poll only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process {pid}: {message}")]
    Open { pid: u32, message: String },

    #[error("Not attached to a process")]
    NotAttached,

    #[error("Invalid address offset: {0}")]
    InvalidOffset(String),

    #[error("Address chain is empty")]
    EmptyChain,

    #[error("Failed to read pointer at {address:#x}: {message}")]
    PointerRead { address: u64, message: String },

    #[error("Failed to read {size} bytes at {address:#x}: {message}")]
    Read {
        address: u64,
        size: usize,
        message: String,
    },
}

/// Raw bytes or a type string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    #[error("Invalid array length: {0}")]
    InvalidArrayLength(String),

    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// A value could not be converted to a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Array conversion is not supported")]
    ArrayConversionUnsupported,

    #[error("Cannot convert {from} value to {to}")]
    Incompatible { from: String, to: BaseKind },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Resource {resource}: {source}")]
    Resource {
        resource: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Attach the key of the resource whose resolution failed.
    pub fn in_resource(self, resource: impl Into<String>) -> Self {
        Error::Resource {
            resource: resource.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through resource wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Resource { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_attribute_display() {
        let err = ProfileError::UnknownAttribute {
            attribute: "Adress".to_string(),
            resource: "HP".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Adress"));
        assert!(msg.contains("HP"));
    }

    #[test]
    fn test_pointer_read_display() {
        let err = MemoryError::PointerRead {
            address: 0xDEADBEEF,
            message: "Access denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0xdeadbeef"));
        assert!(msg.contains("Access denied"));
    }

    #[test]
    fn test_buffer_too_short_display() {
        let err = DecodeError::BufferTooShort {
            expected: 8,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Buffer too short: expected 8 bytes, got 4");
    }

    #[test]
    fn test_many_display_mentions_first() {
        let err = ProfileError::Many(vec![
            ProfileError::MissingName("A".to_string()),
            ProfileError::MissingType("B".to_string()),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 errors"));
        assert!(msg.contains("In resource: A"));
    }

    #[test]
    fn test_from_profile_error() {
        let err: Error = ProfileError::MissingTarget.into();
        assert!(matches!(err, Error::Profile(ProfileError::MissingTarget)));
    }

    #[test]
    fn test_in_resource_keeps_root() {
        let err = Error::from(MemoryError::NotAttached).in_resource("HP");
        assert!(err.to_string().contains("HP"));
        assert!(matches!(err.root(), Error::Memory(MemoryError::NotAttached)));
    }
}
