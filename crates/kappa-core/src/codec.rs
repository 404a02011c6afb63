//! Type codec
//!
//! Pure functions from a [`TypeDescriptor`] to sizes, zero values, decoded
//! buffers and converted values. Scalars use the host's native byte order.

use kappa_common::{BaseKind, ConversionError, DecodeError, Scalar, TypeDescriptor, Value};

/// Byte size of a value of this type. Descriptors are bounded by
/// [`kappa_common::MAX_VALUE_BYTES`] so this never saturates in practice.
pub fn size(desc: &TypeDescriptor) -> usize {
    desc.base.size().saturating_mul(desc.array_length())
}

/// Zero value for the type. A `Char` run decodes to text, so its zero value is
/// a string of NULs.
pub fn default_value(desc: &TypeDescriptor) -> Value {
    if desc.base == BaseKind::Char && desc.is_array() {
        return Value::Text("\0".repeat(desc.array_length()));
    }
    let zero = zero_scalar(desc.base);
    if desc.is_array() {
        Value::Array(vec![zero; desc.array_length()])
    } else {
        Value::Scalar(zero)
    }
}

fn zero_scalar(kind: BaseKind) -> Scalar {
    match kind {
        BaseKind::Bool => Scalar::Bool(false),
        BaseKind::Float32 => Scalar::Float32(0.0),
        BaseKind::Float64 => Scalar::Float64(0.0),
        BaseKind::Char => Scalar::Char('\0'),
        BaseKind::Int8 => Scalar::Int8(0),
        BaseKind::UInt8 => Scalar::UInt8(0),
        BaseKind::Int16 => Scalar::Int16(0),
        BaseKind::UInt16 => Scalar::UInt16(0),
        BaseKind::Int32 => Scalar::Int32(0),
        BaseKind::UInt32 => Scalar::UInt32(0),
        BaseKind::Int64 => Scalar::Int64(0),
        BaseKind::UInt64 => Scalar::UInt64(0),
    }
}

/// Decode `buffer` as a value of the given type.
///
/// Bytes past `size(desc)` are ignored. A `Char` run longer than one element
/// decodes to a single text string rather than an array of characters.
pub fn decode(desc: &TypeDescriptor, buffer: &[u8]) -> Result<Value, DecodeError> {
    let expected = size(desc);
    if buffer.len() < expected {
        return Err(DecodeError::BufferTooShort {
            expected,
            actual: buffer.len(),
        });
    }
    let buffer = &buffer[..expected];

    if desc.base == BaseKind::Char && desc.is_array() {
        return Ok(Value::Text(buffer.iter().map(|&b| ascii_char(b)).collect()));
    }

    let width = desc.base.size();
    if desc.is_array() {
        Ok(Value::Array(
            buffer
                .chunks_exact(width)
                .map(|chunk| decode_scalar(desc.base, chunk))
                .collect(),
        ))
    } else {
        Ok(Value::Scalar(decode_scalar(desc.base, buffer)))
    }
}

fn ascii_char(byte: u8) -> char {
    if byte.is_ascii() {
        byte as char
    } else {
        '?'
    }
}

fn bytes<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&chunk[..N]);
    out
}

/// `chunk` must hold at least `kind.size()` bytes
fn decode_scalar(kind: BaseKind, chunk: &[u8]) -> Scalar {
    match kind {
        BaseKind::Bool => Scalar::Bool(chunk[0] != 0),
        BaseKind::Char => Scalar::Char(ascii_char(chunk[0])),
        BaseKind::Int8 => Scalar::Int8(chunk[0] as i8),
        BaseKind::UInt8 => Scalar::UInt8(chunk[0]),
        BaseKind::Int16 => Scalar::Int16(i16::from_ne_bytes(bytes(chunk))),
        BaseKind::UInt16 => Scalar::UInt16(u16::from_ne_bytes(bytes(chunk))),
        BaseKind::Int32 => Scalar::Int32(i32::from_ne_bytes(bytes(chunk))),
        BaseKind::UInt32 => Scalar::UInt32(u32::from_ne_bytes(bytes(chunk))),
        BaseKind::Float32 => Scalar::Float32(f32::from_ne_bytes(bytes(chunk))),
        BaseKind::Int64 => Scalar::Int64(i64::from_ne_bytes(bytes(chunk))),
        BaseKind::UInt64 => Scalar::UInt64(u64::from_ne_bytes(bytes(chunk))),
        BaseKind::Float64 => Scalar::Float64(f64::from_ne_bytes(bytes(chunk))),
    }
}

/// Convert a value to the scalar kind described by `desc`.
///
/// Numeric conversions follow `as` semantics. Array targets and array values
/// are rejected with [`ConversionError::ArrayConversionUnsupported`].
pub fn convert(desc: &TypeDescriptor, value: &Value) -> Result<Value, ConversionError> {
    if desc.is_array() {
        return Err(ConversionError::ArrayConversionUnsupported);
    }
    match value {
        Value::Array(_) => Err(ConversionError::ArrayConversionUnsupported),
        Value::Text(text) if desc.base == BaseKind::Char => Ok(Value::Text(text.clone())),
        Value::Text(_) => Err(incompatible(value, desc.base)),
        Value::Scalar(scalar) => convert_scalar(*scalar, desc.base)
            .map(Value::Scalar)
            .ok_or_else(|| incompatible(value, desc.base)),
    }
}

/// Interpret a script result as a boolean, the way reset and counter
/// predicates are read.
pub fn truthy(value: &Value) -> Result<bool, ConversionError> {
    match convert(&TypeDescriptor::scalar(BaseKind::Bool), value)? {
        Value::Scalar(Scalar::Bool(b)) => Ok(b),
        _ => Err(incompatible(value, BaseKind::Bool)),
    }
}

fn incompatible(value: &Value, to: BaseKind) -> ConversionError {
    ConversionError::Incompatible {
        from: value.kind_name(),
        to,
    }
}

enum Number {
    Int(i128),
    Float(f64),
}

fn number(scalar: Scalar) -> Option<Number> {
    Some(match scalar {
        Scalar::Int8(v) => Number::Int(v as i128),
        Scalar::UInt8(v) => Number::Int(v as i128),
        Scalar::Int16(v) => Number::Int(v as i128),
        Scalar::UInt16(v) => Number::Int(v as i128),
        Scalar::Int32(v) => Number::Int(v as i128),
        Scalar::UInt32(v) => Number::Int(v as i128),
        Scalar::Int64(v) => Number::Int(v as i128),
        Scalar::UInt64(v) => Number::Int(v as i128),
        Scalar::Float32(v) => Number::Float(v as f64),
        Scalar::Float64(v) => Number::Float(v),
        Scalar::Bool(_) | Scalar::Char(_) => return None,
    })
}

macro_rules! cast {
    ($n:expr, $t:ty) => {
        match $n {
            Number::Int(v) => v as $t,
            Number::Float(f) => f as $t,
        }
    };
}

fn convert_scalar(scalar: Scalar, target: BaseKind) -> Option<Scalar> {
    match target {
        BaseKind::Bool => match scalar {
            Scalar::Bool(b) => Some(Scalar::Bool(b)),
            other => match number(other)? {
                Number::Int(v) => Some(Scalar::Bool(v != 0)),
                Number::Float(f) => Some(Scalar::Bool(f != 0.0)),
            },
        },
        BaseKind::Char => match scalar {
            Scalar::Char(c) => Some(Scalar::Char(c)),
            _ => None,
        },
        numeric => {
            let n = number(scalar)?;
            Some(match numeric {
                BaseKind::Int8 => Scalar::Int8(cast!(n, i8)),
                BaseKind::UInt8 => Scalar::UInt8(cast!(n, u8)),
                BaseKind::Int16 => Scalar::Int16(cast!(n, i16)),
                BaseKind::UInt16 => Scalar::UInt16(cast!(n, u16)),
                BaseKind::Int32 => Scalar::Int32(cast!(n, i32)),
                BaseKind::UInt32 => Scalar::UInt32(cast!(n, u32)),
                BaseKind::Int64 => Scalar::Int64(cast!(n, i64)),
                BaseKind::UInt64 => Scalar::UInt64(cast!(n, u64)),
                BaseKind::Float32 => Scalar::Float32(cast!(n, f32)),
                BaseKind::Float64 => Scalar::Float64(cast!(n, f64)),
                BaseKind::Bool | BaseKind::Char => return None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn desc(s: &str) -> TypeDescriptor {
        s.parse().unwrap()
    }

    #[test]
    fn test_size() {
        assert_eq!(size(&desc("Bool")), 1);
        assert_eq!(size(&desc("Int32")), 4);
        assert_eq!(size(&desc("Double:3")), 24);
        assert_eq!(size(&desc("Char:16")), 16);
    }

    #[test]
    fn test_size_at_value_limit() {
        let largest = TypeDescriptor::array(BaseKind::Int64, kappa_common::MAX_VALUE_BYTES / 8)
            .unwrap();
        assert_eq!(size(&largest), kappa_common::MAX_VALUE_BYTES);
        assert!(matches!(
            default_value(&largest),
            Value::Array(ref items) if items.len() == kappa_common::MAX_VALUE_BYTES / 8
        ));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_value(&desc("Int32")), Value::Scalar(Scalar::Int32(0)));
        assert_eq!(
            default_value(&desc("UInt16:2")),
            Value::Array(vec![Scalar::UInt16(0), Scalar::UInt16(0)])
        );
        assert_eq!(default_value(&desc("Char:3")), Value::Text("\0\0\0".to_string()));
        assert_eq!(default_value(&desc("Char")), Value::Scalar(Scalar::Char('\0')));
    }

    #[test]
    fn test_decode_int32() {
        let value = decode(&desc("Int32"), &42i32.to_ne_bytes()).unwrap();
        assert_eq!(value, Value::Scalar(Scalar::Int32(42)));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let value = decode(&desc("UInt8"), &[7, 8, 9]).unwrap();
        assert_eq!(value, Value::Scalar(Scalar::UInt8(7)));
    }

    #[test]
    fn test_decode_float_array() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&1.5f32.to_ne_bytes());
        buffer.extend_from_slice(&(-2.0f32).to_ne_bytes());
        let value = decode(&desc("Float:2"), &buffer).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Scalar::Float32(1.5), Scalar::Float32(-2.0)])
        );
    }

    #[test]
    fn test_decode_char_run_is_text() {
        let value = decode(&desc("Char:5"), b"hello").unwrap();
        assert_eq!(value, Value::Text("hello".to_string()));
    }

    #[test]
    fn test_decode_non_ascii_char() {
        let value = decode(&desc("Char:2"), &[b'a', 0xE9]).unwrap();
        assert_eq!(value, Value::Text("a?".to_string()));
    }

    #[test]
    fn test_decode_bool_array() {
        let value = decode(&desc("Bool:3"), &[0, 1, 5]).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Scalar::Bool(false), Scalar::Bool(true), Scalar::Bool(true)])
        );
    }

    #[test]
    fn test_decode_signed_byte() {
        let value = decode(&desc("Int8"), &[0xFF]).unwrap();
        assert_eq!(value, Value::Scalar(Scalar::Int8(-1)));
    }

    #[test]
    fn test_decode_too_short() {
        let err = decode(&desc("Int64"), &[0; 4]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BufferTooShort {
                expected: 8,
                actual: 4
            }
        );
    }

    #[test]
    fn test_convert_narrowing() {
        let value = Value::Scalar(Scalar::Int64(300));
        assert_eq!(
            convert(&desc("UInt8"), &value).unwrap(),
            Value::Scalar(Scalar::UInt8(44))
        );
        let value = Value::Scalar(Scalar::Float64(3.9));
        assert_eq!(
            convert(&desc("Int32"), &value).unwrap(),
            Value::Scalar(Scalar::Int32(3))
        );
    }

    #[test]
    fn test_convert_widening() {
        let value = Value::Scalar(Scalar::Int16(-3));
        assert_eq!(
            convert(&desc("Double"), &value).unwrap(),
            Value::Scalar(Scalar::Float64(-3.0))
        );
    }

    #[test]
    fn test_convert_to_bool() {
        let value = Value::Scalar(Scalar::Int64(2));
        assert_eq!(
            convert(&desc("Bool"), &value).unwrap(),
            Value::Scalar(Scalar::Bool(true))
        );
        assert!(!truthy(&Value::Scalar(Scalar::Float64(0.0))).unwrap());
        assert!(truthy(&Value::Scalar(Scalar::Bool(true))).unwrap());
    }

    #[test]
    fn test_convert_text_to_char() {
        let value = Value::Text("abc".to_string());
        assert_eq!(convert(&desc("Char"), &value).unwrap(), value);
    }

    #[test]
    fn test_convert_incompatible() {
        let err = convert(&desc("Int32"), &Value::Text("12".to_string())).unwrap_err();
        assert!(matches!(err, ConversionError::Incompatible { to: BaseKind::Int32, .. }));
        let err = convert(&desc("Int32"), &Value::Scalar(Scalar::Bool(true))).unwrap_err();
        assert!(matches!(err, ConversionError::Incompatible { .. }));
        assert!(truthy(&Value::Text("true".to_string())).is_err());
    }

    #[test]
    fn test_convert_array_value_rejected() {
        let value = Value::Array(vec![Scalar::Int32(1)]);
        assert_eq!(
            convert(&desc("Int32"), &value).unwrap_err(),
            ConversionError::ArrayConversionUnsupported
        );
    }

    fn any_descriptor() -> impl Strategy<Value = TypeDescriptor> {
        (0..BaseKind::ALL.len(), 1usize..16).prop_map(|(kind, len)| {
            TypeDescriptor::array(BaseKind::ALL[kind], len).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_decode_full_buffer_succeeds(
            (d, buffer) in any_descriptor().prop_flat_map(|d| {
                (Just(d), prop::collection::vec(any::<u8>(), size(&d)))
            })
        ) {
            prop_assert_eq!(size(&d), d.base.size() * d.array_length());
            let value = decode(&d, &buffer).unwrap();
            match value {
                Value::Array(items) => prop_assert_eq!(items.len(), d.array_length()),
                Value::Text(text) => prop_assert_eq!(text.chars().count(), d.array_length()),
                Value::Scalar(_) => prop_assert_eq!(d.array_length(), 1),
            }
        }

        #[test]
        fn prop_decode_short_buffer_fails(
            (d, buffer) in any_descriptor().prop_flat_map(|d| {
                (Just(d), prop::collection::vec(any::<u8>(), 0..size(&d)))
            })
        ) {
            let is_too_short = matches!(
                decode(&d, &buffer),
                Err(DecodeError::BufferTooShort { .. })
            );
            prop_assert!(is_too_short);
        }

        #[test]
        fn prop_convert_array_target_fails(kind in 0..BaseKind::ALL.len(), len in 2usize..16, v in any::<i32>()) {
            let d = TypeDescriptor::array(BaseKind::ALL[kind], len).unwrap();
            prop_assert_eq!(
                convert(&d, &Value::Scalar(Scalar::Int32(v))),
                Err(ConversionError::ArrayConversionUnsupported)
            );
        }

        #[test]
        fn prop_default_decodes_from_zeroes(d in any_descriptor()) {
            let zeroes = vec![0u8; size(&d)];
            prop_assert_eq!(decode(&d, &zeroes).unwrap(), default_value(&d));
        }
    }
}
