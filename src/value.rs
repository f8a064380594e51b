//! Decoded field values.
//!
//! A [`Value`] is one decoded field of one row, in the logical value space
//! shared by all three wire formats. Composite values own their children;
//! temporal values carry the timezone identity declared by the column type.

use std::fmt;
use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL marker.
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Int256(Int256),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    UInt256(UInt256),
    Float32(f32),
    Float64(f64),
    /// Variable or fixed-length string. Fixed-length trailing NUL padding is
    /// already stripped by the codec.
    String(String),
    /// Enum member resolved to its symbolic name.
    Enum(String),
    Decimal(Decimal),
    Date(Date),
    DateTime(DateTime),
    DateTime64(DateTime64),
    Uuid(Uuid),
    /// Homogeneous sequence per the Array child type.
    Array(Vec<Value>),
    /// Heterogeneous sequence with arity fixed by the Tuple children.
    Tuple(Vec<Value>),
    /// Ordered key/value pairs per the Map key and value types.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::UInt8(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Widening accessor over every signed/unsigned variant that fits i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::Int128(v) => i64::try_from(*v).ok(),
            Value::UInt8(v) => Some(i64::from(*v)),
            Value::UInt16(v) => Some(i64::from(*v)),
            Value::UInt32(v) => Some(i64::from(*v)),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::UInt128(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt8(v) => Some(u64::from(*v)),
            Value::UInt16(v) => Some(u64::from(*v)),
            Value::UInt32(v) => Some(u64::from(*v)),
            Value::UInt64(v) => Some(*v),
            Value::UInt128(v) => u64::try_from(*v).ok(),
            _ => self.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int128(v) => Some(*v),
            Value::UInt128(v) => i128::try_from(*v).ok(),
            _ => self.as_i64().map(i128::from),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Render the value as a ClickHouse literal (strings quoted). Used for
    /// nested positions inside arrays, tuples and maps.
    fn fmt_literal(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Enum(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Int128(v) => write!(f, "{v}"),
            Value::Int256(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::UInt128(v) => write!(f, "{v}"),
            Value::UInt256(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Enum(s) => write!(f, "{s}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::DateTime64(dt) => write!(f, "{dt}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    item.fmt_literal(f)?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    item.fmt_literal(f)?;
                }
                write!(f, ")")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    k.fmt_literal(f)?;
                    write!(f, ":")?;
                    v.fmt_literal(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Date as days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub days: u16,
}

impl Date {
    pub fn new(days: u16) -> Self {
        Self { days }
    }

    pub fn to_naive_date(self) -> NaiveDate {
        // Unix epoch is always in range for chrono.
        NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(u64::from(self.days)))
            .unwrap()
    }

    pub fn from_naive_date(date: NaiveDate) -> Option<Self> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let days = date.signed_duration_since(epoch).num_days();
        u16::try_from(days).ok().map(|days| Self { days })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_naive_date().format("%Y-%m-%d"))
    }
}

/// DateTime as whole seconds since the Unix epoch, with the timezone
/// identity declared by the column type (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTime {
    pub seconds: u32,
    pub timezone: Option<Arc<str>>,
}

impl DateTime {
    pub fn new(seconds: u32, timezone: Option<Arc<str>>) -> Self {
        Self { seconds, timezone }
    }

    /// Wall-clock representation in UTC.
    pub fn to_naive(&self) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(i64::from(self.seconds), 0)
            .unwrap()
            .naive_utc()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_naive().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// DateTime64 as signed ticks since the Unix epoch at 10^-precision seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTime64 {
    pub ticks: i64,
    pub precision: u32,
    pub timezone: Option<Arc<str>>,
}

impl DateTime64 {
    pub fn new(ticks: i64, precision: u32, timezone: Option<Arc<str>>) -> Self {
        Self {
            ticks,
            precision,
            timezone,
        }
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let scale = 10_i64.checked_pow(self.precision)?;
        let secs = self.ticks.div_euclid(scale);
        let frac = self.ticks.rem_euclid(scale);
        let nanos = (frac as u32).checked_mul(10_u32.pow(9_u32.checked_sub(self.precision)?))?;
        chrono::DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
    }
}

impl fmt::Display for DateTime64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive() {
            Some(naive) if self.precision > 0 => {
                write!(f, "{}", naive.format("%Y-%m-%d %H:%M:%S%.f"))
            }
            Some(naive) => write!(f, "{}", naive.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "{}@1e-{}", self.ticks, self.precision),
        }
    }
}

/// Fixed-point decimal carried as an unscaled 128-bit mantissa plus scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub mantissa: i128,
    pub scale: u8,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10_f64.powi(i32::from(self.scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let abs = self.mantissa.unsigned_abs();
        let scale = 10_u128.pow(u32::from(self.scale));
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = usize::from(self.scale)
        )
    }
}

/// 256-bit signed integer carried as raw little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int256(pub [u8; 32]);

/// 256-bit unsigned integer carried as raw little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UInt256(pub [u8; 32]);

impl Int256 {
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_i128(value: i128) -> Self {
        let mut bytes = if value < 0 { [0xff_u8; 32] } else { [0_u8; 32] };
        bytes[..16].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }

    fn is_negative(&self) -> bool {
        self.0[31] & 0x80 != 0
    }
}

impl UInt256 {
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0_u8; 32];
        bytes[..16].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }
}

/// Long division of a 256-bit little-endian magnitude by a small divisor,
/// returning the remainder and leaving the quotient in place.
fn div_rem_in_place(limbs: &mut [u64; 4], divisor: u64) -> u64 {
    let mut rem: u128 = 0;
    for limb in limbs.iter_mut().rev() {
        let cur = (rem << 64) | u128::from(*limb);
        *limb = (cur / u128::from(divisor)) as u64;
        rem = cur % u128::from(divisor);
    }
    rem as u64
}

fn magnitude_to_decimal(bytes: [u8; 32]) -> String {
    let mut limbs = [0_u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let mut chunk = [0_u8; 8];
        chunk.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
        *limb = u64::from_le_bytes(chunk);
    }
    let mut groups: Vec<u64> = Vec::new();
    loop {
        let rem = div_rem_in_place(&mut limbs, 10_000_000_000_000_000_000);
        groups.push(rem);
        if limbs.iter().all(|&l| l == 0) {
            break;
        }
    }
    let mut out = groups.pop().map(|g| g.to_string()).unwrap_or_default();
    while let Some(group) = groups.pop() {
        out.push_str(&format!("{group:019}"));
    }
    out
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", magnitude_to_decimal(self.0))
    }
}

impl fmt::Display for Int256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            // Two's complement negate to get the magnitude.
            let mut bytes = self.0;
            let mut carry = 1_u16;
            for byte in bytes.iter_mut() {
                let cur = u16::from(!*byte) + carry;
                *byte = cur as u8;
                carry = cur >> 8;
            }
            write!(f, "-{}", magnitude_to_decimal(bytes))
        } else {
            write!(f, "{}", magnitude_to_decimal(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_accessors() {
        assert_eq!(Value::Int8(-5).as_i64(), Some(-5));
        assert_eq!(Value::UInt32(7).as_i64(), Some(7));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::UInt64(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::Float32(1.5).as_f64(), Some(1.5));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_date_display() {
        let date = Date::from_naive_date(NaiveDate::from_ymd_opt(1988, 11, 12).unwrap()).unwrap();
        assert_eq!(date.to_string(), "1988-11-12");
        assert_eq!(Date::new(0).to_string(), "1970-01-01");
    }

    #[test]
    fn test_datetime_display() {
        let dt = DateTime::new(0, None);
        assert_eq!(dt.to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_datetime64_fractional() {
        let dt = DateTime64::new(1_500, 3, None);
        assert_eq!(dt.to_naive().unwrap().and_utc().timestamp_millis(), 1_500);
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(Decimal::new(12345, 2).to_string(), "123.45");
        assert_eq!(Decimal::new(-12345, 2).to_string(), "-123.45");
        assert_eq!(Decimal::new(5, 3).to_string(), "0.005");
        assert_eq!(Decimal::new(42, 0).to_string(), "42");
    }

    #[test]
    fn test_int256_display() {
        assert_eq!(Int256::from_i128(0).to_string(), "0");
        assert_eq!(Int256::from_i128(123_456_789).to_string(), "123456789");
        assert_eq!(Int256::from_i128(-42).to_string(), "-42");
        assert_eq!(
            Int256::from_i128(i128::MAX).to_string(),
            i128::MAX.to_string()
        );
        assert_eq!(
            UInt256::from_u128(u128::MAX).to_string(),
            u128::MAX.to_string()
        );
    }

    #[test]
    fn test_composite_display() {
        let arr = Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
        assert_eq!(arr.to_string(), "[1,2,3]");
        let tup = Value::Tuple(vec![
            Value::Int32(1),
            Value::String("a".to_string()),
            Value::Null,
        ]);
        assert_eq!(tup.to_string(), "(1,'a',NULL)");
    }
}
