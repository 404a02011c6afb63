//! Decoded resource values
//!
//! A resource's type is only known once its profile is loaded, so values are a
//! closed union over the base kinds in scalar, array or text shape.

use super::data_type::BaseKind;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Float32(f32),
    Float64(f64),
    Char(char),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
}

impl Scalar {
    pub fn kind(&self) -> BaseKind {
        match self {
            Scalar::Bool(_) => BaseKind::Bool,
            Scalar::Float32(_) => BaseKind::Float32,
            Scalar::Float64(_) => BaseKind::Float64,
            Scalar::Char(_) => BaseKind::Char,
            Scalar::Int8(_) => BaseKind::Int8,
            Scalar::UInt8(_) => BaseKind::UInt8,
            Scalar::Int16(_) => BaseKind::Int16,
            Scalar::UInt16(_) => BaseKind::UInt16,
            Scalar::Int32(_) => BaseKind::Int32,
            Scalar::UInt32(_) => BaseKind::UInt32,
            Scalar::Int64(_) => BaseKind::Int64,
            Scalar::UInt64(_) => BaseKind::UInt64,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Float32(v) => write!(f, "{}", v),
            Scalar::Float64(v) => write!(f, "{}", v),
            Scalar::Char(v) => write!(f, "{}", v),
            Scalar::Int8(v) => write!(f, "{}", v),
            Scalar::UInt8(v) => write!(f, "{}", v),
            Scalar::Int16(v) => write!(f, "{}", v),
            Scalar::UInt16(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::UInt32(v) => write!(f, "{}", v),
            Scalar::Int64(v) => write!(f, "{}", v),
            Scalar::UInt64(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Scalar::Bool(v) => serializer.serialize_bool(v),
            Scalar::Float32(v) => serializer.serialize_f32(v),
            Scalar::Float64(v) => serializer.serialize_f64(v),
            Scalar::Char(v) => serializer.serialize_char(v),
            Scalar::Int8(v) => serializer.serialize_i8(v),
            Scalar::UInt8(v) => serializer.serialize_u8(v),
            Scalar::Int16(v) => serializer.serialize_i16(v),
            Scalar::UInt16(v) => serializer.serialize_u16(v),
            Scalar::Int32(v) => serializer.serialize_i32(v),
            Scalar::UInt32(v) => serializer.serialize_u32(v),
            Scalar::Int64(v) => serializer.serialize_i64(v),
            Scalar::UInt64(v) => serializer.serialize_u64(v),
        }
    }
}

/// A typed resource value.
///
/// `Array` elements all share one kind. `Text` is what a `Char` run of more
/// than one element decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Scalar>),
    Text(String),
}

impl Value {
    /// Short shape/kind name used in error messages
    pub fn kind_name(&self) -> String {
        match self {
            Value::Scalar(s) => s.kind().to_string(),
            Value::Array(items) => match items.first() {
                Some(first) => format!("{}[{}]", first.kind(), items.len()),
                None => "array".to_string(),
            },
            Value::Text(_) => "Text".to_string(),
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Text(text) => f.write_str(text.trim_end_matches('\0')),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::Array(items) => serializer.collect_seq(items),
            Value::Text(text) => serializer.serialize_str(text.trim_end_matches('\0')),
        }
    }
}
