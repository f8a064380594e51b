//! ClickHouse type grammar and descriptor tree.
//!
//! [`resolve`] parses a declared type string (as sent in a result header)
//! into an immutable [`TypeDescriptor`]. Composite descriptors hold their
//! children behind [`Arc`] so a result set's columns can share subtrees; a
//! descriptor is never deep-copied per row.
//!
//! Parsing follows the server's own grammar: the name token runs up to the
//! first `(`, a parameter list is stripped of its matching outer brackets,
//! and the interior splits on top-level commas only (see [`grammar`]).

mod grammar;

use std::fmt;
use std::sync::Arc;

use crate::error::{ClickHouseError, Result};

pub(crate) use grammar::{parse_quoted, split_top_level};

/// Resolved, immutable representation of one column's declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Float32,
    Float64,
    /// The zero-byte type underlying `SELECT NULL`.
    Nothing,
    String,
    /// Exactly N bytes on the wire, no length prefix.
    FixedString(usize),
    Uuid,
    Date,
    DateTime {
        timezone: Option<Arc<str>>,
    },
    DateTime64 {
        precision: u32,
        timezone: Option<Arc<str>>,
    },
    Decimal {
        precision: u8,
        scale: u8,
    },
    Enum8 {
        members: Vec<(std::string::String, i16)>,
    },
    Enum16 {
        members: Vec<(std::string::String, i16)>,
    },
    Array(Arc<TypeDescriptor>),
    Tuple(Vec<Arc<TypeDescriptor>>),
    Map {
        key: Arc<TypeDescriptor>,
        value: Arc<TypeDescriptor>,
    },
    Nullable(Arc<TypeDescriptor>),
    LowCardinality(Arc<TypeDescriptor>),
    /// Named-field composite; decodes like a `Tuple` over the field types.
    Nested {
        fields: Vec<(std::string::String, Arc<TypeDescriptor>)>,
    },
}

impl TypeDescriptor {
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDescriptor::Nullable(_))
    }

    /// True when a null marker is legal for this type (used by the text
    /// codecs' `\N` handling).
    pub(crate) fn accepts_null(&self) -> bool {
        match self {
            TypeDescriptor::Nullable(_) | TypeDescriptor::Nothing => true,
            TypeDescriptor::LowCardinality(child) => child.accepts_null(),
            _ => false,
        }
    }

    /// Look up an enum member name by decoded code.
    pub(crate) fn enum_name_for(&self, code: i16) -> Option<&str> {
        let members = match self {
            TypeDescriptor::Enum8 { members } | TypeDescriptor::Enum16 { members } => members,
            _ => return None,
        };
        members
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(name, _)| name.as_str())
    }

    /// Look up an enum member code by symbolic name.
    pub(crate) fn enum_code_for(&self, name: &str) -> Option<i16> {
        let members = match self {
            TypeDescriptor::Enum8 { members } | TypeDescriptor::Enum16 { members } => members,
            _ => return None,
        };
        members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, code)| *code)
    }
}

/// A registered parser: either a bare name or a name taking a parameter list.
enum Parser {
    Simple(fn() -> TypeDescriptor),
    /// Receives the bracket-stripped parameter interior (`None` when the
    /// type string carried no parameter list) and the full type string for
    /// error context.
    Parameterized(fn(Option<&str>, &str) -> Result<TypeDescriptor>),
}

/// Static name → parser registry. Lookup is by the exact name token, so
/// `DateTime64` never collides with `DateTime`.
static REGISTRY: &[(&str, Parser)] = &[
    ("Bool", Parser::Simple(|| TypeDescriptor::Bool)),
    ("Int8", Parser::Simple(|| TypeDescriptor::Int8)),
    ("Int16", Parser::Simple(|| TypeDescriptor::Int16)),
    ("Int32", Parser::Simple(|| TypeDescriptor::Int32)),
    ("Int64", Parser::Simple(|| TypeDescriptor::Int64)),
    ("Int128", Parser::Simple(|| TypeDescriptor::Int128)),
    ("Int256", Parser::Simple(|| TypeDescriptor::Int256)),
    ("UInt8", Parser::Simple(|| TypeDescriptor::UInt8)),
    ("UInt16", Parser::Simple(|| TypeDescriptor::UInt16)),
    ("UInt32", Parser::Simple(|| TypeDescriptor::UInt32)),
    ("UInt64", Parser::Simple(|| TypeDescriptor::UInt64)),
    ("UInt128", Parser::Simple(|| TypeDescriptor::UInt128)),
    ("UInt256", Parser::Simple(|| TypeDescriptor::UInt256)),
    ("Float32", Parser::Simple(|| TypeDescriptor::Float32)),
    ("Float64", Parser::Simple(|| TypeDescriptor::Float64)),
    ("Nothing", Parser::Simple(|| TypeDescriptor::Nothing)),
    ("String", Parser::Simple(|| TypeDescriptor::String)),
    ("UUID", Parser::Simple(|| TypeDescriptor::Uuid)),
    ("Date", Parser::Simple(|| TypeDescriptor::Date)),
    ("FixedString", Parser::Parameterized(parse_fixed_string)),
    ("DateTime", Parser::Parameterized(parse_datetime)),
    ("DateTime64", Parser::Parameterized(parse_datetime64)),
    ("Decimal", Parser::Parameterized(parse_decimal)),
    ("Decimal32", Parser::Parameterized(|args, full| parse_decimal_shorthand(args, full, 9))),
    ("Decimal64", Parser::Parameterized(|args, full| parse_decimal_shorthand(args, full, 18))),
    ("Decimal128", Parser::Parameterized(|args, full| parse_decimal_shorthand(args, full, 38))),
    ("Enum8", Parser::Parameterized(parse_enum8)),
    ("Enum16", Parser::Parameterized(parse_enum16)),
    ("Array", Parser::Parameterized(parse_array)),
    ("Tuple", Parser::Parameterized(parse_tuple)),
    ("Map", Parser::Parameterized(parse_map)),
    ("Nullable", Parser::Parameterized(parse_nullable)),
    ("LowCardinality", Parser::Parameterized(parse_low_cardinality)),
    ("Nested", Parser::Parameterized(parse_nested)),
];

/// Resolve a declared type string into its descriptor.
///
/// Fails with [`ClickHouseError::UnknownType`] when the name token is not
/// registered and with [`ClickHouseError::MalformedType`] when the parameter
/// list is absent, mismatched, or a parameter fails to parse.
pub fn resolve(type_str: &str) -> Result<TypeDescriptor> {
    let full = type_str.trim();
    let (name, args) = match full.find('(') {
        Some(idx) => {
            let interior = grammar::trim_round_brackets(&full[idx..]).ok_or_else(|| {
                ClickHouseError::malformed_type(full, "mismatched parentheses")
            })?;
            (full[..idx].trim_end(), Some(interior))
        }
        None => (full, None),
    };
    let parser = REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, parser)| parser)
        .ok_or_else(|| ClickHouseError::UnknownType(full.to_string()))?;
    match parser {
        Parser::Simple(build) => match args {
            None => Ok(build()),
            Some(_) => Err(ClickHouseError::malformed_type(
                full,
                "type takes no parameters",
            )),
        },
        Parser::Parameterized(parse) => parse(args, full),
    }
}

fn require_args<'a>(args: Option<&'a str>, full: &str) -> Result<&'a str> {
    args.ok_or_else(|| ClickHouseError::malformed_type(full, "missing parameter list"))
}

fn parse_fixed_string(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let length: usize = interior
        .trim()
        .parse()
        .map_err(|_| ClickHouseError::malformed_type(full, "length must be an integer"))?;
    if length == 0 {
        return Err(ClickHouseError::malformed_type(full, "length must be positive"));
    }
    Ok(TypeDescriptor::FixedString(length))
}

fn parse_timezone(segment: &str, full: &str) -> Result<Arc<str>> {
    match grammar::parse_quoted(segment.trim()) {
        Some((tz, rest)) if rest.trim().is_empty() => Ok(Arc::from(tz.as_str())),
        _ => Err(ClickHouseError::malformed_type(
            full,
            "timezone must be a quoted string",
        )),
    }
}

fn parse_datetime(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let timezone = match args {
        None => None,
        Some(interior) if interior.trim().is_empty() => None,
        Some(interior) => Some(parse_timezone(interior, full)?),
    };
    Ok(TypeDescriptor::DateTime { timezone })
}

fn parse_datetime64(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.is_empty() || segments.len() > 2 {
        return Err(ClickHouseError::malformed_type(
            full,
            "expected precision and optional timezone",
        ));
    }
    let precision: u32 = segments[0]
        .parse()
        .map_err(|_| ClickHouseError::malformed_type(full, "precision must be an integer"))?;
    if precision > 9 {
        return Err(ClickHouseError::malformed_type(full, "precision must be 0..=9"));
    }
    let timezone = match segments.get(1) {
        Some(segment) => Some(parse_timezone(segment, full)?),
        None => None,
    };
    Ok(TypeDescriptor::DateTime64 {
        precision,
        timezone,
    })
}

fn parse_decimal(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.len() != 2 {
        return Err(ClickHouseError::malformed_type(
            full,
            "expected precision and scale",
        ));
    }
    let precision: u8 = segments[0]
        .parse()
        .map_err(|_| ClickHouseError::malformed_type(full, "precision must be an integer"))?;
    let scale: u8 = segments[1]
        .parse()
        .map_err(|_| ClickHouseError::malformed_type(full, "scale must be an integer"))?;
    build_decimal(precision, scale, full)
}

fn parse_decimal_shorthand(args: Option<&str>, full: &str, precision: u8) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let scale: u8 = interior
        .trim()
        .parse()
        .map_err(|_| ClickHouseError::malformed_type(full, "scale must be an integer"))?;
    build_decimal(precision, scale, full)
}

fn build_decimal(precision: u8, scale: u8, full: &str) -> Result<TypeDescriptor> {
    if precision == 0 || precision > 38 {
        return Err(ClickHouseError::malformed_type(
            full,
            "precision must be 1..=38",
        ));
    }
    if scale > precision {
        return Err(ClickHouseError::malformed_type(
            full,
            "scale must not exceed precision",
        ));
    }
    Ok(TypeDescriptor::Decimal { precision, scale })
}

fn parse_enum_members(args: Option<&str>, full: &str) -> Result<Vec<(String, i16)>> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.is_empty() {
        return Err(ClickHouseError::malformed_type(full, "empty member list"));
    }
    let mut members = Vec::with_capacity(segments.len());
    for segment in segments {
        let member = grammar::parse_enum_member(segment).ok_or_else(|| {
            ClickHouseError::malformed_type(full, format!("bad enum member '{segment}'"))
        })?;
        members.push(member);
    }
    Ok(members)
}

fn parse_enum8(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let members = parse_enum_members(args, full)?;
    if members.iter().any(|(_, code)| i8::try_from(*code).is_err()) {
        return Err(ClickHouseError::malformed_type(
            full,
            "Enum8 code out of range",
        ));
    }
    Ok(TypeDescriptor::Enum8 { members })
}

fn parse_enum16(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    Ok(TypeDescriptor::Enum16 {
        members: parse_enum_members(args, full)?,
    })
}

fn parse_single_child(args: Option<&str>, full: &str) -> Result<Arc<TypeDescriptor>> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.len() != 1 {
        return Err(ClickHouseError::malformed_type(
            full,
            "expected exactly one type argument",
        ));
    }
    Ok(Arc::new(resolve(segments[0])?))
}

fn parse_array(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    Ok(TypeDescriptor::Array(parse_single_child(args, full)?))
}

fn parse_nullable(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    Ok(TypeDescriptor::Nullable(parse_single_child(args, full)?))
}

fn parse_low_cardinality(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    Ok(TypeDescriptor::LowCardinality(parse_single_child(args, full)?))
}

fn parse_tuple(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.is_empty() {
        return Err(ClickHouseError::malformed_type(
            full,
            "expected at least one type argument",
        ));
    }
    let children = segments
        .into_iter()
        .map(|segment| resolve(segment).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
    Ok(TypeDescriptor::Tuple(children))
}

fn parse_map(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.len() != 2 {
        return Err(ClickHouseError::malformed_type(
            full,
            "expected key and value type arguments",
        ));
    }
    Ok(TypeDescriptor::Map {
        key: Arc::new(resolve(segments[0])?),
        value: Arc::new(resolve(segments[1])?),
    })
}

fn parse_nested(args: Option<&str>, full: &str) -> Result<TypeDescriptor> {
    let interior = require_args(args, full)?;
    let segments = grammar::split_top_level(interior);
    if segments.is_empty() {
        return Err(ClickHouseError::malformed_type(full, "empty field list"));
    }
    let mut fields = Vec::with_capacity(segments.len());
    for segment in segments {
        let (name, type_str) = segment.split_once(char::is_whitespace).ok_or_else(|| {
            ClickHouseError::malformed_type(full, format!("bad nested field '{segment}'"))
        })?;
        fields.push((name.to_string(), Arc::new(resolve(type_str)?)));
    }
    Ok(TypeDescriptor::Nested { fields })
}

fn escape_member_name(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}

impl fmt::Display for TypeDescriptor {
    /// Canonical type string; resolving it again yields an equal descriptor.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Bool => write!(f, "Bool"),
            TypeDescriptor::Int8 => write!(f, "Int8"),
            TypeDescriptor::Int16 => write!(f, "Int16"),
            TypeDescriptor::Int32 => write!(f, "Int32"),
            TypeDescriptor::Int64 => write!(f, "Int64"),
            TypeDescriptor::Int128 => write!(f, "Int128"),
            TypeDescriptor::Int256 => write!(f, "Int256"),
            TypeDescriptor::UInt8 => write!(f, "UInt8"),
            TypeDescriptor::UInt16 => write!(f, "UInt16"),
            TypeDescriptor::UInt32 => write!(f, "UInt32"),
            TypeDescriptor::UInt64 => write!(f, "UInt64"),
            TypeDescriptor::UInt128 => write!(f, "UInt128"),
            TypeDescriptor::UInt256 => write!(f, "UInt256"),
            TypeDescriptor::Float32 => write!(f, "Float32"),
            TypeDescriptor::Float64 => write!(f, "Float64"),
            TypeDescriptor::Nothing => write!(f, "Nothing"),
            TypeDescriptor::String => write!(f, "String"),
            TypeDescriptor::FixedString(length) => write!(f, "FixedString({length})"),
            TypeDescriptor::Uuid => write!(f, "UUID"),
            TypeDescriptor::Date => write!(f, "Date"),
            TypeDescriptor::DateTime { timezone: None } => write!(f, "DateTime"),
            TypeDescriptor::DateTime { timezone: Some(tz) } => write!(f, "DateTime('{tz}')"),
            TypeDescriptor::DateTime64 {
                precision,
                timezone: None,
            } => write!(f, "DateTime64({precision})"),
            TypeDescriptor::DateTime64 {
                precision,
                timezone: Some(tz),
            } => write!(f, "DateTime64({precision}, '{tz}')"),
            TypeDescriptor::Decimal { precision, scale } => {
                write!(f, "Decimal({precision}, {scale})")
            }
            TypeDescriptor::Enum8 { members } => {
                write!(f, "Enum8(")?;
                for (i, (name, code)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}' = {code}", escape_member_name(name))?;
                }
                write!(f, ")")
            }
            TypeDescriptor::Enum16 { members } => {
                write!(f, "Enum16(")?;
                for (i, (name, code)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}' = {code}", escape_member_name(name))?;
                }
                write!(f, ")")
            }
            TypeDescriptor::Array(child) => write!(f, "Array({child})"),
            TypeDescriptor::Tuple(children) => {
                write!(f, "Tuple(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            TypeDescriptor::Map { key, value } => write!(f, "Map({key}, {value})"),
            TypeDescriptor::Nullable(child) => write!(f, "Nullable({child})"),
            TypeDescriptor::LowCardinality(child) => write!(f, "LowCardinality({child})"),
            TypeDescriptor::Nested { fields } => {
                write!(f, "Nested(")?;
                for (i, (name, child)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} {child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
