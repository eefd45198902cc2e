//! Conversion between wire strings and typed values.
//!
//! Two wire forms exist:
//!
//! - **Typed strings**, as found in read responses: `{Long}42`, `{Boolean}true`.
//!   A string without a recognized `{Type}` prefix is inferred: first against
//!   the date patterns, then against the boolean vocabulary, and otherwise kept
//!   as a plain string.
//! - **Form fields**, as sent to the write endpoint: one or more textual values
//!   plus an optional type hint (`Long`, `Date`, `String[]`). A field without a
//!   hint is a plain string; there is no inference on this path.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::error::CodecError;
use crate::value::{Decimal, PropertyType, Value};

/// Canonical rendering of dates on the wire.
pub const DATE_WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Suffix marking a multi-valued type hint.
pub const ARRAY_HINT_SUFFIX: &str = "[]";

enum DatePattern {
    /// Pattern carrying its own UTC offset.
    Offset(&'static str),
    /// Date and time without offset, read as UTC.
    Naive(&'static str),
    /// Calendar date only, read as midnight UTC.
    DateOnly(&'static str),
    Rfc3339,
    Rfc2822,
}

/// Tried in order; the first match wins.
const DATE_PATTERNS: &[DatePattern] = &[
    DatePattern::Offset("%a %b %d %Y %H:%M:%S GMT%z"),
    DatePattern::Rfc3339,
    DatePattern::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    DatePattern::Naive("%Y-%m-%dT%H:%M:%S%.f"),
    DatePattern::Rfc2822,
    DatePattern::Naive("%d.%m.%Y %H:%M:%S"),
    DatePattern::DateOnly("%Y-%m-%d"),
    DatePattern::DateOnly("%d.%m.%Y"),
];

/// A value rendered as form field content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireField {
    /// One entry per value; multi-valued properties repeat the field.
    pub values: Vec<String>,
    /// Type hint accompanying the field, `None` for plain strings.
    pub type_hint: Option<String>,
}

/// Decode a string from a read response.
///
/// ```rust
/// use remount_core::{codec, Value};
///
/// assert_eq!(codec::decode_string("{Boolean}true"), Value::Boolean(true));
/// assert_eq!(codec::decode_string("off"), Value::Boolean(false));
/// assert_eq!(codec::decode_string("hello"), Value::from("hello"));
/// ```
pub fn decode_string(s: &str) -> Value {
    if let Some((type_name, literal)) = split_type_prefix(s) {
        return match PropertyType::from_name(type_name) {
            Some(PropertyType::Binary) | None => Value::String(s.to_string()),
            Some(property_type) => {
                decode_as(property_type, literal).unwrap_or_else(|_| Value::String(s.to_string()))
            }
        };
    }
    infer(s)
}

/// Infer the type of an unprefixed string.
pub fn infer(s: &str) -> Value {
    if let Some(date) = parse_date(s) {
        return Value::Date(date);
    }
    if let Some(b) = parse_boolean(s) {
        return Value::Boolean(b);
    }
    Value::String(s.to_string())
}

fn split_type_prefix(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix('{')?;
    let end = rest.find('}')?;
    let type_name = &rest[..end];
    if type_name.is_empty() || !type_name.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((type_name, &rest[end + 1..]))
}

/// Decode a literal of an explicitly known type.
pub fn decode_as(property_type: PropertyType, literal: &str) -> Result<Value, CodecError> {
    let invalid = || CodecError::InvalidLiteral {
        property_type,
        literal: literal.to_string(),
    };

    Ok(match property_type {
        PropertyType::String => Value::String(literal.to_string()),
        PropertyType::Long => Value::Long(literal.trim().parse().map_err(|_| invalid())?),
        PropertyType::Double => Value::Double(literal.trim().parse().map_err(|_| invalid())?),
        PropertyType::Decimal => Value::Decimal(literal.trim().parse::<Decimal>()?),
        PropertyType::Boolean => Value::Boolean(parse_boolean(literal).ok_or_else(invalid)?),
        PropertyType::Date => Value::Date(parse_date(literal).ok_or_else(invalid)?),
        PropertyType::Name => Value::Name(literal.to_string()),
        PropertyType::Path => Value::Path(literal.to_string()),
        PropertyType::Reference => Value::Reference(literal.to_string()),
        PropertyType::WeakReference => Value::WeakReference(literal.to_string()),
        PropertyType::Uri => Value::Uri(literal.to_string()),
        PropertyType::Binary => return Err(CodecError::Unencodable { property_type }),
    })
}

/// Parse the boolean vocabulary: `true`/`on` and `false`/`off`, any case.
pub fn parse_boolean(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}

/// Parse a date against the ordered pattern list.
pub fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    // ECMA renderings may carry a trailing zone name: "... GMT+0200 (CEST)"
    let s = match s.rfind(" (") {
        Some(i) if s.ends_with(')') => &s[..i],
        _ => s,
    };

    if s.is_empty() || !s.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }

    DATE_PATTERNS.iter().find_map(|pattern| match pattern {
        DatePattern::Offset(fmt) => DateTime::parse_from_str(s, fmt).ok(),
        DatePattern::Naive(fmt) => NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|dt| dt.and_utc().fixed_offset()),
        DatePattern::DateOnly(fmt) => NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset()),
        DatePattern::Rfc3339 => DateTime::parse_from_rfc3339(s).ok(),
        DatePattern::Rfc2822 => DateTime::parse_from_rfc2822(s).ok(),
    })
}

/// Render a date in the canonical wire format.
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format(DATE_WIRE_FORMAT).to_string()
}

fn encode_scalar(value: &Value) -> Result<String, CodecError> {
    Ok(match value {
        Value::String(s)
        | Value::Name(s)
        | Value::Path(s)
        | Value::Reference(s)
        | Value::WeakReference(s)
        | Value::Uri(s) => s.clone(),
        Value::Long(n) => n.to_string(),
        Value::Double(n) => n.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Date(d) => format_date(d),
        Value::Binary(_) => {
            return Err(CodecError::Unencodable {
                property_type: PropertyType::Binary,
            })
        }
        Value::Array(_) => return Err(CodecError::NestedArray { index: 0 }),
    })
}

/// Render a scalar as a typed string (`{Long}42`).
///
/// Plain strings are rendered verbatim unless inference would read them back
/// as something else, in which case they get an explicit `{String}` prefix.
pub fn encode_typed(value: &Value) -> Result<String, CodecError> {
    let property_type = value.scalar_type().ok_or(CodecError::Unencodable {
        property_type: value.property_type()?,
    })?;
    let text = encode_scalar(value)?;

    if property_type == PropertyType::String {
        if split_type_prefix(&text).is_some() || infer(&text) != *value {
            return Ok(format!("{{String}}{}", text));
        }
        return Ok(text);
    }
    Ok(format!("{{{}}}{}", property_type.name(), text))
}

/// Render a value as form field content with its type hint.
///
/// Strings carry no hint. Arrays always carry one (`Long[]`, `String[]`) so
/// that single-element lists stay multi-valued; their elements must agree on
/// type.
pub fn encode_field(value: &Value) -> Result<WireField, CodecError> {
    match value {
        Value::Array(items) => {
            let property_type = value.property_type()?;
            if property_type == PropertyType::Binary {
                return Err(CodecError::Unencodable { property_type });
            }
            let values = items
                .iter()
                .map(encode_scalar)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(WireField {
                values,
                type_hint: Some(format!("{}{}", property_type.name(), ARRAY_HINT_SUFFIX)),
            })
        }
        scalar => {
            let property_type = value.property_type()?;
            let text = encode_scalar(scalar)?;
            let type_hint = match property_type {
                PropertyType::String => None,
                other => Some(other.name().to_string()),
            };
            Ok(WireField {
                values: vec![text],
                type_hint,
            })
        }
    }
}

/// Decode form field content back into a value.
pub fn decode_field(values: &[String], type_hint: Option<&str>) -> Result<Value, CodecError> {
    let (property_type, multi) = match type_hint {
        Some(hint) => {
            let (name, multi) = match hint.strip_suffix(ARRAY_HINT_SUFFIX) {
                Some(name) => (name, true),
                None => (hint, false),
            };
            let property_type = PropertyType::from_name(name).ok_or_else(|| {
                CodecError::InvalidLiteral {
                    property_type: PropertyType::String,
                    literal: hint.to_string(),
                }
            })?;
            (property_type, multi)
        }
        None => (PropertyType::String, false),
    };

    if multi || values.len() > 1 {
        let items = values
            .iter()
            .map(|v| decode_as(property_type, v))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Array(items));
    }

    let literal = values.first().map(String::as_str).unwrap_or_default();
    decode_as(property_type, literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(
        y: i32,
        mo: u32,
        d: u32,
        h: u32,
        mi: u32,
        s: u32,
        offset_hours: i32,
    ) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
    }

    #[test]
    fn typed_prefix_dispatch() {
        assert_eq!(decode_string("{Boolean}true"), Value::Boolean(true));
        assert_eq!(decode_string("{Long}42"), Value::Long(42));
        assert_eq!(decode_string("{Double}1.5"), Value::Double(1.5));
        assert_eq!(
            decode_string("{Decimal}10.25"),
            Value::Decimal("10.25".parse().unwrap())
        );
        assert_eq!(decode_string("{Name}jcr:title"), Value::Name("jcr:title".into()));
        assert_eq!(decode_string("{Path}/content"), Value::Path("/content".into()));
        assert_eq!(decode_string("{String}on"), Value::String("on".into()));
    }

    #[test]
    fn unknown_prefix_is_literal() {
        assert_eq!(decode_string("{Foo}bar"), Value::String("{Foo}bar".into()));
        assert_eq!(
            decode_string("{Binary}abc"),
            Value::String("{Binary}abc".into())
        );
    }

    #[test]
    fn invalid_typed_literal_is_literal() {
        assert_eq!(
            decode_string("{Long}abc"),
            Value::String("{Long}abc".into())
        );
    }

    #[test]
    fn boolean_vocabulary() {
        assert_eq!(decode_string("off"), Value::Boolean(false));
        assert_eq!(decode_string("ON"), Value::Boolean(true));
        assert_eq!(decode_string("False"), Value::Boolean(false));
        assert_eq!(decode_string("yes"), Value::String("yes".into()));
    }

    #[test]
    fn plain_string_stays_string() {
        assert_eq!(
            decode_string("not-a-date-or-bool"),
            Value::String("not-a-date-or-bool".into())
        );
        assert_eq!(decode_string(""), Value::String(String::new()));
        assert_eq!(decode_string("42"), Value::String("42".into()));
    }

    #[test]
    fn ecma_date_pattern() {
        let parsed = parse_date("Fri Oct 16 2026 10:00:00 GMT+0200").unwrap();
        assert_eq!(parsed, date(2026, 10, 16, 10, 0, 0, 2));
        let with_zone = parse_date("Fri Oct 16 2026 10:00:00 GMT+0200 (CEST)").unwrap();
        assert_eq!(with_zone, parsed);
    }

    #[test]
    fn iso_date_patterns() {
        let expected = date(2026, 10, 16, 8, 30, 0, 0);
        assert_eq!(parse_date("2026-10-16T08:30:00.000Z"), Some(expected));
        assert_eq!(parse_date("2026-10-16T10:30:00.000+02:00"), Some(expected));
        assert_eq!(parse_date("2026-10-16T10:30:00+0200"), Some(expected));
        assert_eq!(parse_date("2026-10-16T08:30:00"), Some(expected));
    }

    #[test]
    fn rfc2822_and_short_dates() {
        assert_eq!(
            parse_date("Tue, 15 Nov 1994 12:45:26 GMT"),
            Some(date(1994, 11, 15, 12, 45, 26, 0))
        );
        assert_eq!(parse_date("2026-10-16"), Some(date(2026, 10, 16, 0, 0, 0, 0)));
        assert_eq!(parse_date("16.10.2026"), Some(date(2026, 10, 16, 0, 0, 0, 0)));
        assert_eq!(
            parse_date("16.10.2026 12:00:00"),
            Some(date(2026, 10, 16, 12, 0, 0, 0))
        );
    }

    #[test]
    fn bare_date_string_infers_date() {
        assert!(matches!(decode_string("2026-10-16"), Value::Date(_)));
    }

    #[test]
    fn non_dates_rejected() {
        assert_eq!(parse_date("off"), None);
        assert_eq!(parse_date("2026"), None);
        assert_eq!(parse_date("hello world"), None);
    }

    #[test]
    fn canonical_date_format() {
        let d = date(2026, 1, 2, 3, 4, 5, 1);
        assert_eq!(format_date(&d), "2026-01-02T03:04:05.000+01:00");
    }

    #[test]
    fn field_encoding_hints() {
        let f = encode_field(&Value::from("plain")).unwrap();
        assert_eq!(f.values, vec!["plain"]);
        assert_eq!(f.type_hint, None);

        let f = encode_field(&Value::Long(7)).unwrap();
        assert_eq!(f.values, vec!["7"]);
        assert_eq!(f.type_hint.as_deref(), Some("Long"));

        let f = encode_field(&Value::Boolean(false)).unwrap();
        assert_eq!(f.type_hint.as_deref(), Some("Boolean"));

        let f = encode_field(&Value::from(vec!["a", "b"])).unwrap();
        assert_eq!(f.values, vec!["a", "b"]);
        assert_eq!(f.type_hint.as_deref(), Some("String[]"));
    }

    #[test]
    fn field_encoding_rejects_mixed_arrays() {
        let mixed = Value::Array(vec![Value::Long(1), Value::Boolean(true)]);
        assert!(matches!(
            encode_field(&mixed),
            Err(CodecError::MixedArray { .. })
        ));
    }

    #[test]
    fn field_roundtrip_scalars() {
        let values = vec![
            Value::from("text"),
            Value::from("true"),
            Value::Long(-12),
            Value::Double(3.25),
            Value::Decimal("1234.5600".parse().unwrap()),
            Value::Boolean(true),
            Value::Date(date(2026, 10, 16, 10, 0, 0, 2)),
        ];
        for value in values {
            let field = encode_field(&value).unwrap();
            let back = decode_field(&field.values, field.type_hint.as_deref()).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn field_roundtrip_arrays() {
        let values = vec![
            Value::from(vec![1i64, 2, 3]),
            Value::from(vec!["only"]),
            Value::Array(vec![]),
            Value::from(vec![true, false]),
        ];
        for value in values {
            let field = encode_field(&value).unwrap();
            let back = decode_field(&field.values, field.type_hint.as_deref()).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn typed_string_roundtrip() {
        let values = vec![
            Value::from("text"),
            Value::from("off"),
            Value::from("2026-10-16"),
            Value::from("{Long}1"),
            Value::Long(99),
            Value::Double(-0.5),
            Value::Decimal("3.14159".parse().unwrap()),
            Value::Boolean(false),
            Value::Date(date(2020, 2, 29, 23, 59, 59, -5)),
            Value::Name("nt:file".into()),
            Value::Reference("123e4567".into()),
        ];
        for value in values {
            let encoded = encode_typed(&value).unwrap();
            assert_eq!(decode_string(&encoded), value, "via {}", encoded);
        }
    }

    #[test]
    fn plain_strings_stay_unprefixed() {
        assert_eq!(encode_typed(&Value::from("hello")).unwrap(), "hello");
        assert_eq!(encode_typed(&Value::from("on")).unwrap(), "{String}on");
    }

    #[test]
    fn binary_has_no_wire_form() {
        let v = Value::from(crate::value::InlineBinary::new(vec![1u8, 2]));
        assert!(encode_typed(&v).is_err());
        assert!(encode_field(&v).is_err());
    }

    #[test]
    fn unknown_hint_rejected() {
        assert!(decode_field(&["x".to_string()], Some("Color")).is_err());
    }
}
