//! BSON to JSON conversion for API responses.
//!
//! Unlike extended JSON, identifiers are rendered as plain hex strings and
//! dates as RFC 3339 strings, which is what API clients expect.

use folio_db::bson::{Bson, Document};
use serde_json::{Map, Number, Value};

pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(value) => Value::Bool(*value),
        Bson::Int32(value) => Value::from(*value),
        Bson::Int64(value) => Value::from(*value),
        Bson::Double(value) => Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(value) => Value::String(value.clone()),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(value) => value
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(document) => document_to_json(document),
        other => other.clone().into_relaxed_extjson(),
    }
}

pub fn document_to_json(document: &Document) -> Value {
    Value::Object(
        document
            .iter()
            .map(|(key, value)| (key.clone(), bson_to_json(value)))
            .collect::<Map<String, Value>>(),
    )
}
