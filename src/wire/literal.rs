//! Per-descriptor literal parsing for the text formats.
//!
//! Both text codecs land in the same logical value space as the binary
//! codec: a TSV field or a JSON scalar is parsed against the column's
//! descriptor. Composite fields arrive as ClickHouse literals
//! (`[1,2,3]`, `(1,'a',NULL)`, `{'k':1}`) and reuse the grammar's
//! depth/quote-aware splitter.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::error::{ClickHouseError, Result};
use crate::types::{parse_quoted, split_top_level, TypeDescriptor};
use crate::value::{Date, DateTime, DateTime64, Decimal, Int256, UInt256, Value};

fn malformed(desc: &TypeDescriptor, token: &str) -> ClickHouseError {
    ClickHouseError::MalformedRow(format!("'{token}' is not a valid {desc} literal"))
}

/// Parse one text token into a value of `desc`.
///
/// The token is already unescaped. An empty token denotes null only when the
/// descriptor is `Nullable`; for a plain `String` it is a genuine empty
/// string.
pub(crate) fn parse_literal(desc: &TypeDescriptor, token: &str) -> Result<Value> {
    match desc {
        TypeDescriptor::Nullable(child) => {
            if token.is_empty() || token == "NULL" || token == "\\N" {
                Ok(Value::Null)
            } else {
                parse_literal(child, token)
            }
        }
        TypeDescriptor::LowCardinality(child) => parse_literal(child, token),
        TypeDescriptor::Nothing => Ok(Value::Null),
        TypeDescriptor::Bool => match token {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(malformed(desc, token)),
        },
        TypeDescriptor::Int8 => token
            .parse()
            .map(Value::Int8)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Int16 => token
            .parse()
            .map(Value::Int16)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Int32 => token
            .parse()
            .map(Value::Int32)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Int64 => token
            .parse()
            .map(Value::Int64)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Int128 => token
            .parse()
            .map(Value::Int128)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Int256 => token
            .parse::<i128>()
            .map(|v| Value::Int256(Int256::from_i128(v)))
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::UInt8 => token
            .parse()
            .map(Value::UInt8)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::UInt16 => token
            .parse()
            .map(Value::UInt16)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::UInt32 => token
            .parse()
            .map(Value::UInt32)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::UInt64 => token
            .parse()
            .map(Value::UInt64)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::UInt128 => token
            .parse()
            .map(Value::UInt128)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::UInt256 => token
            .parse::<u128>()
            .map(|v| Value::UInt256(UInt256::from_u128(v)))
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Float32 => token
            .parse()
            .map(Value::Float32)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Float64 => token
            .parse()
            .map(Value::Float64)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::String => Ok(Value::String(token.to_string())),
        TypeDescriptor::FixedString(_) => {
            Ok(Value::String(token.trim_end_matches('\0').to_string()))
        }
        TypeDescriptor::Uuid => Uuid::parse_str(token)
            .map(Value::Uuid)
            .map_err(|_| malformed(desc, token)),
        TypeDescriptor::Date => NaiveDate::parse_from_str(token, "%Y-%m-%d")
            .ok()
            .and_then(Date::from_naive_date)
            .map(Value::Date)
            .ok_or_else(|| malformed(desc, token)),
        TypeDescriptor::DateTime { timezone } => {
            NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S")
                .ok()
                .and_then(|naive| u32::try_from(naive.and_utc().timestamp()).ok())
                .map(|seconds| Value::DateTime(DateTime::new(seconds, timezone.clone())))
                .ok_or_else(|| malformed(desc, token))
        }
        TypeDescriptor::DateTime64 {
            precision,
            timezone,
        } => parse_datetime64_literal(token, *precision, timezone.clone())
            .ok_or_else(|| malformed(desc, token)),
        TypeDescriptor::Decimal { scale, .. } => {
            parse_decimal_literal(token, *scale).ok_or_else(|| malformed(desc, token))
        }
        TypeDescriptor::Enum8 { .. } | TypeDescriptor::Enum16 { .. } => desc
            .enum_code_for(token)
            .map(|_| Value::Enum(token.to_string()))
            .ok_or_else(|| {
                ClickHouseError::UnknownEnumValue(format!("'{token}' has no member code"))
            }),
        TypeDescriptor::Array(child) => {
            let interior = bracketed(token, '[', ']').ok_or_else(|| malformed(desc, token))?;
            let mut items = Vec::new();
            for segment in split_top_level(interior) {
                items.push(parse_element(child, segment)?);
            }
            Ok(Value::Array(items))
        }
        TypeDescriptor::Tuple(children) => {
            let interior = bracketed(token, '(', ')').ok_or_else(|| malformed(desc, token))?;
            let segments = split_top_level(interior);
            if segments.len() != children.len() {
                return Err(malformed(desc, token));
            }
            let mut items = Vec::with_capacity(children.len());
            for (child, segment) in children.iter().zip(segments) {
                items.push(parse_element(child, segment)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeDescriptor::Nested { fields } => {
            let interior = bracketed(token, '(', ')').ok_or_else(|| malformed(desc, token))?;
            let segments = split_top_level(interior);
            if segments.len() != fields.len() {
                return Err(malformed(desc, token));
            }
            let mut items = Vec::with_capacity(fields.len());
            for ((_, child), segment) in fields.iter().zip(segments) {
                items.push(parse_element(child, segment)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeDescriptor::Map { key, value } => {
            let interior = bracketed(token, '{', '}').ok_or_else(|| malformed(desc, token))?;
            let mut pairs = Vec::new();
            for segment in split_top_level(interior) {
                let (k, v) =
                    split_map_pair(segment).ok_or_else(|| malformed(desc, token))?;
                pairs.push((parse_element(key, k)?, parse_element(value, v)?));
            }
            Ok(Value::Map(pairs))
        }
    }
}

/// Parse one element in a composite literal: quoted elements are unquoted
/// first, `NULL` maps through the usual nullable rule.
fn parse_element(desc: &TypeDescriptor, segment: &str) -> Result<Value> {
    let segment = segment.trim();
    if segment == "NULL" {
        return parse_literal(desc, "NULL");
    }
    if segment.starts_with('\'') {
        match parse_quoted(segment) {
            Some((content, rest)) if rest.trim().is_empty() => {
                return parse_literal(desc, &content)
            }
            _ => {
                return Err(ClickHouseError::MalformedRow(format!(
                    "unterminated quoted literal '{segment}'"
                )))
            }
        }
    }
    parse_literal(desc, segment)
}

fn bracketed(token: &str, open: char, close: char) -> Option<&str> {
    let token = token.trim();
    token
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
}

/// Split a `key : value` map entry on the first top-level colon.
fn split_map_pair(segment: &str) -> Option<(&str, &str)> {
    let mut depth = 0_i32;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in segment.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_quotes = false;
            }
            continue;
        }
        match ch {
            '\'' => in_quotes = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 => return Some((&segment[..i], &segment[i + 1..])),
            _ => {}
        }
    }
    None
}

fn parse_decimal_literal(token: &str, scale: u8) -> Option<Value> {
    let (sign, digits) = match token.strip_prefix('-') {
        Some(rest) => (-1_i128, rest),
        None => (1, token),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let int_value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    // Normalize the fractional digits to exactly `scale` places.
    let scale = usize::from(scale);
    let mut frac = frac_part.to_string();
    if frac.len() > scale {
        frac.truncate(scale);
    }
    while frac.len() < scale {
        frac.push('0');
    }
    let frac_value: i128 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    let mantissa = int_value.checked_mul(10_i128.checked_pow(scale as u32)?)? + frac_value;
    Some(Value::Decimal(Decimal::new(sign * mantissa, scale as u8)))
}

fn parse_datetime64_literal(
    token: &str,
    precision: u32,
    timezone: Option<std::sync::Arc<str>>,
) -> Option<Value> {
    let naive = NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    let utc = naive.and_utc();
    let scale = 10_i64.checked_pow(precision)?;
    let subsec = i64::from(utc.timestamp_subsec_nanos()) / 10_i64.checked_pow(9 - precision)?;
    let ticks = utc.timestamp().checked_mul(scale)?.checked_add(subsec)?;
    Some(Value::DateTime64(DateTime64::new(
        ticks, precision, timezone,
    )))
}

/// Decode a JSON scalar/array/object against a declared descriptor
/// (the `JSONEachRow` declared-schema policy).
pub(crate) fn decode_json(desc: &TypeDescriptor, json: &serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;
    match (desc, json) {
        (TypeDescriptor::Nullable(_) | TypeDescriptor::Nothing, Json::Null) => Ok(Value::Null),
        (TypeDescriptor::Nullable(child), other) => decode_json(child, other),
        (TypeDescriptor::LowCardinality(child), other) => decode_json(child, other),
        (_, Json::Null) => Err(ClickHouseError::MalformedRow(format!(
            "null for non-nullable {desc}"
        ))),
        (TypeDescriptor::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
        (TypeDescriptor::Array(child), Json::Array(items)) => Ok(Value::Array(
            items
                .iter()
                .map(|item| decode_json(child, item))
                .collect::<Result<Vec<_>>>()?,
        )),
        (TypeDescriptor::Tuple(children), Json::Array(items)) => {
            if children.len() != items.len() {
                return Err(ClickHouseError::MalformedRow(format!(
                    "expected {} tuple elements, got {}",
                    children.len(),
                    items.len()
                )));
            }
            Ok(Value::Tuple(
                children
                    .iter()
                    .zip(items)
                    .map(|(child, item)| decode_json(child, item))
                    .collect::<Result<Vec<_>>>()?,
            ))
        }
        (TypeDescriptor::Map { key, value }, Json::Object(entries)) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                pairs.push((parse_literal(key, k)?, decode_json(value, v)?));
            }
            Ok(Value::Map(pairs))
        }
        (_, Json::String(s)) => parse_literal(desc, s),
        (_, Json::Number(n)) => parse_literal(desc, &n.to_string()),
        (desc, other) => Err(ClickHouseError::MalformedRow(format!(
            "JSON value {other} does not fit {desc}"
        ))),
    }
}
