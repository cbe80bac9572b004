//! `WellKnownTypes.json` reference types
//!
//! From protocol v1 on, primitive columns are declared with a `$ref` into a
//! shared definitions document instead of a `type`/`format` pair.

use serde_json::Value;

/// Prefix shared by every well-known reference
pub const WELL_KNOWN_TYPES_PREFIX: &str = "WellKnownTypes.json#/definitions/";

/// A primitive type defined in `WellKnownTypes.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownType {
    String,
    BinaryData,
    Date,
    TimestampWithTimezone,
    TimestampWithoutTimezone,
    TimeWithTimezone,
    TimeWithoutTimezone,
    Number,
    Integer,
    Boolean,
}

impl WellKnownType {
    pub const ALL: [WellKnownType; 10] = [
        WellKnownType::String,
        WellKnownType::BinaryData,
        WellKnownType::Date,
        WellKnownType::TimestampWithTimezone,
        WellKnownType::TimestampWithoutTimezone,
        WellKnownType::TimeWithTimezone,
        WellKnownType::TimeWithoutTimezone,
        WellKnownType::Number,
        WellKnownType::Integer,
        WellKnownType::Boolean,
    ];

    /// Definition name inside the document
    pub fn name(&self) -> &'static str {
        match self {
            WellKnownType::String => "String",
            WellKnownType::BinaryData => "BinaryData",
            WellKnownType::Date => "Date",
            WellKnownType::TimestampWithTimezone => "TimestampWithTimezone",
            WellKnownType::TimestampWithoutTimezone => "TimestampWithoutTimezone",
            WellKnownType::TimeWithTimezone => "TimeWithTimezone",
            WellKnownType::TimeWithoutTimezone => "TimeWithoutTimezone",
            WellKnownType::Number => "Number",
            WellKnownType::Integer => "Integer",
            WellKnownType::Boolean => "Boolean",
        }
    }

    /// Full `$ref` value, e.g. `WellKnownTypes.json#/definitions/Integer`
    pub fn reference(&self) -> String {
        format!("{}{}", WELL_KNOWN_TYPES_PREFIX, self.name())
    }

    pub fn from_reference(reference: &str) -> Option<Self> {
        let name = reference.strip_prefix(WELL_KNOWN_TYPES_PREFIX)?;
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// The type a schema node refers to, if it is a well-known `$ref`
    pub fn of_schema(schema: &Value) -> Option<Self> {
        schema.get("$ref").and_then(Value::as_str).and_then(Self::from_reference)
    }

    /// `{"$ref": ...}` schema node for this type
    pub fn to_schema(&self) -> Value {
        serde_json::json!({ "$ref": self.reference() })
    }

    /// Lightweight membership check.
    ///
    /// Every type except `Boolean` is carried as a JSON string on the wire;
    /// `Integer` and `Number` additionally require numeric text.
    pub fn accepts(&self, data: &Value) -> bool {
        match (self, data) {
            (WellKnownType::Boolean, value) => value.is_boolean(),
            (WellKnownType::Integer, Value::String(text)) => is_integer_text(text),
            (WellKnownType::Number, Value::String(text)) => {
                matches!(text.as_str(), "Infinity" | "-Infinity" | "NaN")
                    || serde_json::from_str::<serde_json::Number>(text).is_ok()
            }
            (_, value) => value.is_string(),
        }
    }
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
