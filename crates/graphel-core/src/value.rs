//! Dynamically-typed scalar values for parameter binding.

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// A scalar (or array of scalars) bound as a statement parameter.
///
/// Temporal variants carry microseconds; arbitrary-precision numbers carry
/// their canonical text form and are cast server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    BigInt(String),
    Decimal(String),
    Str(String),
    Bytes(Vec<u8>),
    Uuid(ObjectId),
    Json(serde_json::Value),
    /// Microseconds since the Unix epoch, UTC
    Datetime(i64),
    /// Microseconds
    Duration(i64),
    Array(Vec<Value>),
}

impl Value {
    /// The schema-qualified type name this value binds as.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "std::bool",
            Value::Int16(_) => "std::int16",
            Value::Int32(_) => "std::int32",
            Value::Int64(_) => "std::int64",
            Value::Float32(_) => "std::float32",
            Value::Float64(_) => "std::float64",
            Value::BigInt(_) => "std::bigint",
            Value::Decimal(_) => "std::decimal",
            Value::Str(_) => "std::str",
            Value::Bytes(_) => "std::bytes",
            Value::Uuid(_) => "std::uuid",
            Value::Json(_) => "std::json",
            Value::Datetime(_) => "std::datetime",
            Value::Duration(_) => "std::duration",
            Value::Array(_) => "array",
        }
    }

    /// Whether this value can bind for the given schema type expression.
    ///
    /// Unknown type names (enums, custom scalars, module aliases we have no
    /// table for) are accepted leniently; the server is the authority.
    pub fn conforms_to(&self, typexpr: &str) -> bool {
        if let Some(inner) = typexpr
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return match self {
                Value::Array(items) => items.iter().all(|v| v.conforms_to(inner)),
                _ => false,
            };
        }
        let expected = match typexpr {
            "std::bool" | "bool" => Some("std::bool"),
            "std::int16" | "int16" => Some("std::int16"),
            "std::int32" | "int32" => Some("std::int32"),
            "std::int64" | "int64" => Some("std::int64"),
            "std::float32" | "float32" => Some("std::float32"),
            "std::float64" | "float64" => Some("std::float64"),
            "std::bigint" | "bigint" => Some("std::bigint"),
            "std::decimal" | "decimal" => Some("std::decimal"),
            "std::str" | "str" => Some("std::str"),
            "std::bytes" | "bytes" => Some("std::bytes"),
            "std::uuid" | "uuid" => Some("std::uuid"),
            "std::json" | "json" => Some("std::json"),
            "std::datetime" | "datetime" => Some("std::datetime"),
            "std::duration" | "duration" => Some("std::duration"),
            _ => None,
        };
        match expected {
            Some(name) => self.type_name() == name,
            None => true,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_are_schema_qualified() {
        assert_eq!(Value::Str("x".into()).type_name(), "std::str");
        assert_eq!(Value::Int64(1).type_name(), "std::int64");
        assert_eq!(Value::Uuid(ObjectId::from_u128(1)).type_name(), "std::uuid");
    }

    #[test]
    fn conformance_checks_known_scalars() {
        assert!(Value::Str("x".into()).conforms_to("std::str"));
        assert!(Value::Str("x".into()).conforms_to("str"));
        assert!(!Value::Int64(1).conforms_to("std::str"));
        assert!(!Value::Str("x".into()).conforms_to("std::int64"));
    }

    #[test]
    fn unknown_types_are_lenient() {
        assert!(Value::Str("admin".into()).conforms_to("default::Role"));
        assert!(Value::Int64(3).conforms_to("my::CustomScalar"));
    }

    #[test]
    fn array_conformance_recurses() {
        let arr = Value::Array(vec![Value::Str("a".into()), Value::Str("b".into())]);
        assert!(arr.conforms_to("array<std::str>"));
        assert!(!arr.conforms_to("array<std::int64>"));
        assert!(!Value::Str("a".into()).conforms_to("array<std::str>"));
    }
}
