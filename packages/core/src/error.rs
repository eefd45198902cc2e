//! Error types for value encoding and decoding.

use crate::value::PropertyType;

/// Errors raised while converting values to or from their wire form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("array element {index} is {found}, expected {expected}")]
    MixedArray {
        expected: PropertyType,
        found: PropertyType,
        index: usize,
    },

    #[error("array element {index} is itself an array")]
    NestedArray { index: usize },

    #[error("'{literal}' is not a valid {property_type} literal")]
    InvalidLiteral {
        property_type: PropertyType,
        literal: String,
    },

    #[error("{property_type} values have no textual wire form")]
    Unencodable { property_type: PropertyType },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_array_display() {
        let e = CodecError::MixedArray {
            expected: PropertyType::Long,
            found: PropertyType::Boolean,
            index: 2,
        };
        let display = e.to_string();
        assert!(display.contains("element 2"));
        assert!(display.contains("Boolean"));
        assert!(display.contains("Long"));
    }

    #[test]
    fn invalid_literal_display() {
        let e = CodecError::InvalidLiteral {
            property_type: PropertyType::Decimal,
            literal: "x1".to_string(),
        };
        assert_eq!(e.to_string(), "'x1' is not a valid Decimal literal");
    }
}
