//! Typed property values.
//!
//! Properties of a mirrored resource carry one of a fixed set of types (the
//! repository's property type taxonomy). Multi-valued properties are arrays of
//! a single element type.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

use crate::error::CodecError;

/// Ordered property name → value mapping.
pub type PropertyMap = IndexMap<String, Value>;

/// The property type taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    String,
    Binary,
    Long,
    Double,
    Decimal,
    Date,
    Boolean,
    Name,
    Path,
    Reference,
    WeakReference,
    Uri,
}

impl PropertyType {
    /// Every type, in wire-name order.
    pub const ALL: [PropertyType; 12] = [
        PropertyType::String,
        PropertyType::Binary,
        PropertyType::Long,
        PropertyType::Double,
        PropertyType::Decimal,
        PropertyType::Date,
        PropertyType::Boolean,
        PropertyType::Name,
        PropertyType::Path,
        PropertyType::Reference,
        PropertyType::WeakReference,
        PropertyType::Uri,
    ];

    /// The name used in `{Type}` prefixes and `@TypeHint` fields.
    pub fn name(self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Binary => "Binary",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Decimal => "Decimal",
            PropertyType::Date => "Date",
            PropertyType::Boolean => "Boolean",
            PropertyType::Name => "Name",
            PropertyType::Path => "Path",
            PropertyType::Reference => "Reference",
            PropertyType::WeakReference => "WeakReference",
            PropertyType::Uri => "URI",
        }
    }

    /// Case-insensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<PropertyType> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An arbitrary-precision decimal kept in its textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Decimal {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidLiteral {
            property_type: PropertyType::Decimal,
            literal: s.to_string(),
        };

        let body = s.strip_prefix(['-', '+']).unwrap_or(s);
        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };

        let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !digits(int_part) || !digits(frac_part) {
            return Err(invalid());
        }
        if let Some(exp) = exponent {
            let exp_digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            if exp_digits.is_empty() || !digits(exp_digits) {
                return Err(invalid());
            }
        }

        Ok(Decimal(s.to_string()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A binary property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Binary {
    /// Content that lives on a remote repository and is fetched on demand.
    Remote(RemoteBinary),
    /// Content supplied locally, not yet written anywhere.
    Inline(InlineBinary),
}

/// Reference to binary content served by a remote repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteBinary {
    /// Absolute URL streaming the content.
    pub url: String,
    /// Length advertised by the remote, if known.
    pub length: Option<i64>,
    /// Identifies the mount the value was read from.
    pub origin: String,
}

/// Binary content held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineBinary {
    pub data: Bytes,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

impl InlineBinary {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            mime_type: None,
        }
    }
}

/// A typed property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Long(i64),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    Name(String),
    Path(String),
    Reference(String),
    WeakReference(String),
    Uri(String),
    Binary(Binary),
    /// Multi-valued property. Elements share one type.
    Array(Vec<Value>),
}

impl Value {
    /// Type of a scalar, `None` for arrays.
    pub fn scalar_type(&self) -> Option<PropertyType> {
        Some(match self {
            Value::String(_) => PropertyType::String,
            Value::Long(_) => PropertyType::Long,
            Value::Double(_) => PropertyType::Double,
            Value::Decimal(_) => PropertyType::Decimal,
            Value::Boolean(_) => PropertyType::Boolean,
            Value::Date(_) => PropertyType::Date,
            Value::Name(_) => PropertyType::Name,
            Value::Path(_) => PropertyType::Path,
            Value::Reference(_) => PropertyType::Reference,
            Value::WeakReference(_) => PropertyType::WeakReference,
            Value::Uri(_) => PropertyType::Uri,
            Value::Binary(_) => PropertyType::Binary,
            Value::Array(_) => return None,
        })
    }

    /// Type of the value; for arrays, the common element type.
    ///
    /// Empty arrays are reported as `String`. Arrays whose elements disagree,
    /// or which nest arrays, are rejected.
    pub fn property_type(&self) -> Result<PropertyType, CodecError> {
        match self {
            Value::Array(items) => {
                let mut common: Option<PropertyType> = None;
                for (index, item) in items.iter().enumerate() {
                    let item_type = item
                        .scalar_type()
                        .ok_or(CodecError::NestedArray { index })?;
                    match common {
                        None => common = Some(item_type),
                        Some(expected) if expected != item_type => {
                            return Err(CodecError::MixedArray {
                                expected,
                                found: item_type,
                                index,
                            });
                        }
                        Some(_) => {}
                    }
                }
                Ok(common.unwrap_or(PropertyType::String))
            }
            scalar => Ok(scalar
                .scalar_type()
                .unwrap_or(PropertyType::String)),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }

    /// Textual content of string-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s)
            | Value::Name(s)
            | Value::Path(s)
            | Value::Reference(s)
            | Value::WeakReference(s)
            | Value::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            Value::Long(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Long(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(d: DateTime<FixedOffset>) -> Self {
        Value::Date(d)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<InlineBinary> for Value {
    fn from(b: InlineBinary) -> Self {
        Value::Binary(Binary::Inline(b))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
