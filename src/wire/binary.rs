//! Per-descriptor binary value decoding for `RowBinaryWithNamesAndTypes`.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ClickHouseError, Result};
use crate::types::TypeDescriptor;
use crate::value::{Date, DateTime, DateTime64, Decimal, Int256, UInt256, Value};
use crate::wire::ByteCursor;

/// Strip the NUL padding ClickHouse uses to right-pad short FixedString
/// values; callers never see the padding.
fn trim_fixed_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

/// Decode exactly the bytes one value of `desc` owns.
pub(crate) fn decode_value(desc: &TypeDescriptor, cur: &mut ByteCursor<'_>) -> Result<Value> {
    match desc {
        TypeDescriptor::Bool => Ok(Value::Bool(cur.read_u8()? != 0)),
        TypeDescriptor::Int8 => Ok(Value::Int8(cur.read_i8()?)),
        TypeDescriptor::Int16 => Ok(Value::Int16(cur.read_i16()?)),
        TypeDescriptor::Int32 => Ok(Value::Int32(cur.read_i32()?)),
        TypeDescriptor::Int64 => Ok(Value::Int64(cur.read_i64()?)),
        TypeDescriptor::Int128 => Ok(Value::Int128(cur.read_i128()?)),
        TypeDescriptor::Int256 => {
            let bytes: [u8; 32] = cur.read_exact(32)?.try_into().unwrap();
            Ok(Value::Int256(Int256::from_le_bytes(bytes)))
        }
        TypeDescriptor::UInt8 => Ok(Value::UInt8(cur.read_u8()?)),
        TypeDescriptor::UInt16 => Ok(Value::UInt16(cur.read_u16()?)),
        TypeDescriptor::UInt32 => Ok(Value::UInt32(cur.read_u32()?)),
        TypeDescriptor::UInt64 => Ok(Value::UInt64(cur.read_u64()?)),
        TypeDescriptor::UInt128 => Ok(Value::UInt128(cur.read_u128()?)),
        TypeDescriptor::UInt256 => {
            let bytes: [u8; 32] = cur.read_exact(32)?.try_into().unwrap();
            Ok(Value::UInt256(UInt256::from_le_bytes(bytes)))
        }
        TypeDescriptor::Float32 => Ok(Value::Float32(cur.read_f32()?)),
        TypeDescriptor::Float64 => Ok(Value::Float64(cur.read_f64()?)),
        TypeDescriptor::Nothing => Ok(Value::Null),
        TypeDescriptor::String => Ok(Value::String(cur.read_string()?)),
        TypeDescriptor::FixedString(len) => {
            let bytes = cur.read_exact(*len)?;
            Ok(Value::String(
                String::from_utf8_lossy(trim_fixed_padding(bytes)).into_owned(),
            ))
        }
        TypeDescriptor::Uuid => {
            // Two little-endian u64 halves, most significant first.
            let hi = cur.read_u64()?;
            let lo = cur.read_u64()?;
            Ok(Value::Uuid(Uuid::from_u64_pair(hi, lo)))
        }
        TypeDescriptor::Date => Ok(Value::Date(Date::new(cur.read_u16()?))),
        TypeDescriptor::DateTime { timezone } => Ok(Value::DateTime(DateTime::new(
            cur.read_u32()?,
            timezone.clone(),
        ))),
        TypeDescriptor::DateTime64 {
            precision,
            timezone,
        } => Ok(Value::DateTime64(DateTime64::new(
            cur.read_i64()?,
            *precision,
            timezone.clone(),
        ))),
        TypeDescriptor::Decimal { precision, scale } => {
            let mantissa = if *precision <= 9 {
                i128::from(cur.read_i32()?)
            } else if *precision <= 18 {
                i128::from(cur.read_i64()?)
            } else {
                cur.read_i128()?
            };
            Ok(Value::Decimal(Decimal::new(mantissa, *scale)))
        }
        TypeDescriptor::Enum8 { .. } => {
            let code = i16::from(cur.read_i8()?);
            resolve_enum(desc, code)
        }
        TypeDescriptor::Enum16 { .. } => {
            let code = cur.read_i16()?;
            resolve_enum(desc, code)
        }
        TypeDescriptor::Nullable(child) => match cur.read_u8()? {
            1 => Ok(Value::Null),
            0 => decode_value(child, cur),
            flag => Err(ClickHouseError::MalformedRow(format!(
                "invalid null flag {flag:#04x}"
            ))),
        },
        TypeDescriptor::Array(child) => {
            let len = cur.read_var_u64()?;
            let mut items = Vec::new();
            for _ in 0..len {
                items.push(decode_value(child, cur)?);
            }
            Ok(Value::Array(items))
        }
        TypeDescriptor::Tuple(children) => {
            let mut items = Vec::with_capacity(children.len());
            for child in children {
                items.push(decode_value(child, cur)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeDescriptor::Nested { fields } => {
            let mut items = Vec::with_capacity(fields.len());
            for (_, child) in fields {
                items.push(decode_value(child, cur)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeDescriptor::Map { key, value } => {
            let len = cur.read_var_u64()?;
            let mut pairs = Vec::new();
            for _ in 0..len {
                let k = decode_value(key, cur)?;
                let v = decode_value(value, cur)?;
                pairs.push((k, v));
            }
            Ok(Value::Map(pairs))
        }
        TypeDescriptor::LowCardinality(child) => decode_low_cardinality(child, cur),
    }
}

fn resolve_enum(desc: &TypeDescriptor, code: i16) -> Result<Value> {
    desc.enum_name_for(code)
        .map(|name| Value::Enum(name.to_string()))
        .ok_or_else(|| ClickHouseError::UnknownEnumValue(format!("code {code} has no member")))
}

/// Dictionary block per value: index-width marker, varint dictionary length,
/// child-decoded entries, then one index of the marked width.
fn decode_low_cardinality(child: &Arc<TypeDescriptor>, cur: &mut ByteCursor<'_>) -> Result<Value> {
    let width = cur.read_u8()?;
    let dict_len = cur.read_var_u64()?;
    if dict_len == 0 {
        return Err(ClickHouseError::MalformedRow(
            "empty low-cardinality dictionary".to_string(),
        ));
    }
    let mut dictionary = Vec::new();
    for _ in 0..dict_len {
        dictionary.push(decode_value(child, cur)?);
    }
    let index = match width {
        0 => u64::from(cur.read_u8()?),
        1 => u64::from(cur.read_u16()?),
        2 => u64::from(cur.read_u32()?),
        3 => cur.read_u64()?,
        other => {
            return Err(ClickHouseError::MalformedRow(format!(
                "invalid dictionary index width {other}"
            )))
        }
    };
    usize::try_from(index)
        .ok()
        .and_then(|i| dictionary.get(i))
        .cloned()
        .ok_or_else(|| {
            ClickHouseError::MalformedRow(format!(
                "dictionary index {index} out of range (size {dict_len})"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::resolve;

    fn decode(type_str: &str, bytes: &[u8]) -> Result<Value> {
        let desc = resolve(type_str).unwrap();
        let mut cur = ByteCursor::new(bytes);
        let value = decode_value(&desc, &mut cur)?;
        assert!(cur.is_empty(), "decoder left trailing bytes");
        Ok(value)
    }

    #[test]
    fn test_scalar_decode() {
        assert_eq!(decode("UInt8", &[7]).unwrap(), Value::UInt8(7));
        assert_eq!(
            decode("Int32", &(-5_i32).to_le_bytes()).unwrap(),
            Value::Int32(-5)
        );
        assert_eq!(
            decode("Float64", &1.5_f64.to_le_bytes()).unwrap(),
            Value::Float64(1.5)
        );
        assert_eq!(decode("Bool", &[1]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_string_decode() {
        let mut bytes = vec![3_u8];
        bytes.extend_from_slice(b"ASD");
        assert_eq!(
            decode("String", &bytes).unwrap(),
            Value::String("ASD".to_string())
        );
    }

    #[test]
    fn test_fixed_string_strips_padding() {
        assert_eq!(
            decode("FixedString(5)", b"ASD\0\0").unwrap(),
            Value::String("ASD".to_string())
        );
        assert_eq!(
            decode("FixedString(3)", b"ASD").unwrap(),
            Value::String("ASD".to_string())
        );
    }

    #[test]
    fn test_nullable_flag_semantics() {
        // Flag 1 is null regardless of what would otherwise follow.
        assert_eq!(decode("Nullable(Int32)", &[1]).unwrap(), Value::Null);

        let mut bytes = vec![0_u8];
        bytes.extend_from_slice(&42_i32.to_le_bytes());
        assert_eq!(
            decode("Nullable(Int32)", &bytes).unwrap(),
            Value::Int32(42)
        );

        assert!(matches!(
            decode("Nullable(Int32)", &[2, 0, 0, 0, 0]),
            Err(ClickHouseError::MalformedRow(_))
        ));
    }

    #[test]
    fn test_array_length_prefix() {
        let mut bytes = vec![3_u8];
        for v in [1_i32, 2, 3] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(
            decode("Array(Int32)", &bytes).unwrap(),
            Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
        );
    }

    #[test]
    fn test_tuple_arity() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&1_i32.to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(b"a");
        assert_eq!(
            decode("Tuple(Int32, String)", &bytes).unwrap(),
            Value::Tuple(vec![Value::Int32(1), Value::String("a".to_string())])
        );
    }

    #[test]
    fn test_map_decode() {
        let mut bytes = vec![2_u8];
        bytes.push(1);
        bytes.extend_from_slice(b"a");
        bytes.extend_from_slice(&1_u32.to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(b"b");
        bytes.extend_from_slice(&2_u32.to_le_bytes());
        assert_eq!(
            decode("Map(String, UInt32)", &bytes).unwrap(),
            Value::Map(vec![
                (Value::String("a".to_string()), Value::UInt32(1)),
                (Value::String("b".to_string()), Value::UInt32(2)),
            ])
        );
    }

    #[test]
    fn test_enum_decode() {
        assert_eq!(
            decode("Enum8('a' = 1, 'b' = 2)", &[2]).unwrap(),
            Value::Enum("b".to_string())
        );
        assert!(matches!(
            decode("Enum8('a' = 1)", &[9]),
            Err(ClickHouseError::UnknownEnumValue(_))
        ));
        assert_eq!(
            decode("Enum16('x' = -300)", &(-300_i16).to_le_bytes()).unwrap(),
            Value::Enum("x".to_string())
        );
    }

    #[test]
    fn test_decimal_widths() {
        assert_eq!(
            decode("Decimal(9, 2)", &12345_i32.to_le_bytes()).unwrap(),
            Value::Decimal(Decimal::new(12345, 2))
        );
        assert_eq!(
            decode("Decimal(18, 4)", &(-7_i64).to_le_bytes()).unwrap(),
            Value::Decimal(Decimal::new(-7, 4))
        );
        assert_eq!(
            decode("Decimal(38, 10)", &1_i128.to_le_bytes()).unwrap(),
            Value::Decimal(Decimal::new(1, 10))
        );
    }

    #[test]
    fn test_temporal_decode() {
        assert_eq!(
            decode("Date", &100_u16.to_le_bytes()).unwrap(),
            Value::Date(Date::new(100))
        );
        let v = decode("DateTime('UTC')", &1_000_000_u32.to_le_bytes()).unwrap();
        match v {
            Value::DateTime(dt) => {
                assert_eq!(dt.seconds, 1_000_000);
                assert_eq!(dt.timezone.as_deref(), Some("UTC"));
            }
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn test_uuid_decode() {
        let uuid = Uuid::parse_str("61f0c404-5cb3-11e7-907b-a6006ad3dba0").unwrap();
        let (hi, lo) = uuid.as_u64_pair();
        let mut bytes = vec![];
        bytes.extend_from_slice(&hi.to_le_bytes());
        bytes.extend_from_slice(&lo.to_le_bytes());
        assert_eq!(decode("UUID", &bytes).unwrap(), Value::Uuid(uuid));
    }

    #[test]
    fn test_low_cardinality_decode() {
        // width=u8, dict ['x', 'y'], index 1
        let mut bytes = vec![0_u8, 2];
        bytes.push(1);
        bytes.extend_from_slice(b"x");
        bytes.push(1);
        bytes.extend_from_slice(b"y");
        bytes.push(1);
        assert_eq!(
            decode("LowCardinality(String)", &bytes).unwrap(),
            Value::String("y".to_string())
        );

        // Out-of-range index is a malformed row, not truncation.
        let mut bytes = vec![0_u8, 1];
        bytes.push(1);
        bytes.extend_from_slice(b"x");
        bytes.push(5);
        assert!(matches!(
            decode("LowCardinality(String)", &bytes),
            Err(ClickHouseError::MalformedRow(_))
        ));
    }

    #[test]
    fn test_truncated_value() {
        assert!(matches!(
            decode("Int64", &[1, 2, 3]),
            Err(ClickHouseError::TruncatedStream)
        ));
    }

    #[test]
    fn test_nested_decodes_as_tuple() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&9_u32.to_le_bytes());
        bytes.push(2);
        bytes.extend_from_slice(b"ab");
        assert_eq!(
            decode("Nested(id UInt32, name String)", &bytes).unwrap(),
            Value::Tuple(vec![Value::UInt32(9), Value::String("ab".to_string())])
        );
    }

    #[test]
    fn test_int256_round_width() {
        let v = Int256::from_i128(-1);
        assert_eq!(
            decode("Int256", &v.0).unwrap(),
            Value::Int256(v)
        );
    }
}
