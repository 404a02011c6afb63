//! Type descriptors for resource values
//!
//! A descriptor is written in a profile as `<BaseKind>` or `<BaseKind>:<N>`,
//! e.g. `Int32` or `Float:3`.

use crate::error::DecodeError;
use std::fmt;
use std::str::FromStr;

/// The twelve primitive kinds a resource can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    Bool,
    Float32,
    Float64,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl BaseKind {
    pub const ALL: [BaseKind; 12] = [
        BaseKind::Bool,
        BaseKind::Float32,
        BaseKind::Float64,
        BaseKind::Char,
        BaseKind::Int8,
        BaseKind::UInt8,
        BaseKind::Int16,
        BaseKind::UInt16,
        BaseKind::Int32,
        BaseKind::UInt32,
        BaseKind::Int64,
        BaseKind::UInt64,
    ];

    /// Natural binary width in bytes
    pub fn size(self) -> usize {
        match self {
            BaseKind::Bool | BaseKind::Char | BaseKind::Int8 | BaseKind::UInt8 => 1,
            BaseKind::Int16 | BaseKind::UInt16 => 2,
            BaseKind::Float32 | BaseKind::Int32 | BaseKind::UInt32 => 4,
            BaseKind::Float64 | BaseKind::Int64 | BaseKind::UInt64 => 8,
        }
    }

    /// Name as written in profiles
    pub fn name(self) -> &'static str {
        match self {
            BaseKind::Bool => "Bool",
            BaseKind::Float32 => "Float",
            BaseKind::Float64 => "Double",
            BaseKind::Char => "Char",
            BaseKind::Int8 => "Int8",
            BaseKind::UInt8 => "UInt8",
            BaseKind::Int16 => "Int16",
            BaseKind::UInt16 => "UInt16",
            BaseKind::Int32 => "Int32",
            BaseKind::UInt32 => "UInt32",
            BaseKind::Int64 => "Int64",
            BaseKind::UInt64 => "UInt64",
        }
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BaseKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| DecodeError::UnknownDataType(s.to_string()))
    }
}

/// Largest value a single resource may occupy in the target, in bytes
pub const MAX_VALUE_BYTES: usize = 1024 * 1024;

/// Base kind plus array length. `array_length` is always at least 1 and
/// the whole value never exceeds [`MAX_VALUE_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub base: BaseKind,
    array_length: usize,
}

impl TypeDescriptor {
    pub fn scalar(base: BaseKind) -> Self {
        Self {
            base,
            array_length: 1,
        }
    }

    pub fn array(base: BaseKind, length: usize) -> Result<Self, DecodeError> {
        match base.size().checked_mul(length) {
            Some(bytes) if length > 0 && bytes <= MAX_VALUE_BYTES => {}
            _ => return Err(DecodeError::InvalidArrayLength(length.to_string())),
        }
        Ok(Self {
            base,
            array_length: length,
        })
    }

    pub fn array_length(&self) -> usize {
        self.array_length
    }

    pub fn is_array(&self) -> bool {
        self.array_length > 1
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array() {
            write!(f, "{}:{}", self.base, self.array_length)
        } else {
            write!(f, "{}", self.base)
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, length)) => {
                let base = kind.parse()?;
                let length: usize = length
                    .trim()
                    .parse()
                    .map_err(|_| DecodeError::InvalidArrayLength(length.to_string()))?;
                TypeDescriptor::array(base, length)
            }
            None => Ok(TypeDescriptor::scalar(s.parse()?)),
        }
    }
}
