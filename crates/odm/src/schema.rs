//! Declarative document schemas.
//!
//! Each field is described by a [`FieldSpec`]; a [`Schema`] evaluates every
//! spec the same way, producing either a normalized BSON document or the
//! complete list of violations.

use std::fmt;

use folio_db::{
    bson::{oid::ObjectId, Bson, Document},
    IndexSpec,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::convert::bson_to_json;

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    ObjectId,
}

impl FieldKind {
    /// Human-readable type name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Integer => "integer",
            FieldKind::Decimal => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::ObjectId => "id",
        }
    }

    fn json_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::ObjectId => "string",
            FieldKind::Integer => "integer",
            FieldKind::Decimal => "number",
            FieldKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Limit<T> {
    value: T,
    message: &'static str,
}

/// Constraints and normalizers for one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    description: Option<&'static str>,
    required: Option<&'static str>,
    unique: bool,
    trim: bool,
    min_length: Option<Limit<usize>>,
    max_length: Option<Limit<usize>>,
    min: Option<Limit<f64>>,
    max: Option<Limit<f64>>,
    default: Option<Bson>,
    round_to: Option<u32>,
    derived: bool,
}

impl FieldSpec {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            description: None,
            required: None,
            unique: false,
            trim: false,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            default: None,
            round_to: None,
            derived: false,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn decimal(name: &'static str) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn object_id(name: &'static str) -> Self {
        Self::new(name, FieldKind::ObjectId)
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Reject payloads that omit the field (or send `null` or an empty string).
    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    /// Back the field with a unique index.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Strip surrounding whitespace before validation.
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn min_length(mut self, value: usize, message: &'static str) -> Self {
        self.min_length = Some(Limit { value, message });
        self
    }

    pub fn max_length(mut self, value: usize, message: &'static str) -> Self {
        self.max_length = Some(Limit { value, message });
        self
    }

    pub fn min(mut self, value: f64, message: &'static str) -> Self {
        self.min = Some(Limit { value, message });
        self
    }

    pub fn max(mut self, value: f64, message: &'static str) -> Self {
        self.max = Some(Limit { value, message });
        self
    }

    pub fn default_value(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Round decimal input to `places` before range checks.
    pub fn round_to(mut self, places: u32) -> Self {
        self.round_to = Some(places);
        self
    }

    /// Server-owned field: client input is ignored and hooks fill it in.
    pub fn derived(mut self) -> Self {
        self.derived = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }

    /// Parse a raw string (query-string value) into this field's type.
    pub fn parse_str(&self, raw: &str) -> Result<Bson, String> {
        let invalid = || format!("{} must be a valid {}", self.name, self.kind.label());
        let raw = raw.trim();

        match self.kind {
            FieldKind::Text => Ok(Bson::String(raw.to_string())),
            FieldKind::Integer => raw.parse::<i64>().map(Bson::Int64).map_err(|_| invalid()),
            FieldKind::Decimal => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Bson::Double)
                .ok_or_else(invalid),
            FieldKind::Boolean => match raw {
                "true" => Ok(Bson::Boolean(true)),
                "false" => Ok(Bson::Boolean(false)),
                _ => Err(invalid()),
            },
            FieldKind::ObjectId => ObjectId::parse_str(raw)
                .map(Bson::ObjectId)
                .map_err(|_| invalid()),
        }
    }

    fn coerce(&self, value: &Value) -> Result<Bson, String> {
        let invalid = || format!("{} must be a valid {}", self.name, self.kind.label());

        match (self.kind, value) {
            (FieldKind::Text, Value::String(text)) => Ok(Bson::String(text.clone())),
            (FieldKind::Integer, Value::Number(number)) => number
                .as_i64()
                .or_else(|| {
                    number
                        .as_f64()
                        .filter(|value| value.fract() == 0.0 && value.abs() < i64::MAX as f64)
                        .map(|value| value as i64)
                })
                .map(Bson::Int64)
                .ok_or_else(invalid),
            (FieldKind::Decimal, Value::Number(number)) => {
                number.as_f64().map(Bson::Double).ok_or_else(invalid)
            }
            (FieldKind::Boolean, Value::Bool(flag)) => Ok(Bson::Boolean(*flag)),
            // numbers, booleans and ids may arrive as strings
            (kind, Value::String(raw)) if kind != FieldKind::Text => self.parse_str(raw),
            _ => Err(invalid()),
        }
    }

    fn normalize(&self, value: Bson) -> Result<Bson, String> {
        match value {
            Bson::String(text) => {
                let text = if self.trim {
                    text.trim().to_string()
                } else {
                    text
                };

                if let (Some(message), true) = (self.required, text.is_empty()) {
                    return Err(message.to_string());
                }

                let length = text.chars().count();
                if let Some(limit) = self.min_length.filter(|limit| length < limit.value) {
                    return Err(limit.message.to_string());
                }
                if let Some(limit) = self.max_length.filter(|limit| length > limit.value) {
                    return Err(limit.message.to_string());
                }

                Ok(Bson::String(text))
            }
            Bson::Double(number) => {
                let number = match self.round_to {
                    Some(places) => {
                        let factor = 10_f64.powi(places as i32);
                        (number * factor).round() / factor
                    }
                    None => number,
                };
                self.check_range(number)?;
                Ok(Bson::Double(number))
            }
            Bson::Int64(number) => {
                self.check_range(number as f64)?;
                Ok(Bson::Int64(number))
            }
            other => Ok(other),
        }
    }

    fn check_range(&self, number: f64) -> Result<(), String> {
        if let Some(limit) = self.min.filter(|limit| number < limit.value) {
            return Err(limit.message.to_string());
        }
        if let Some(limit) = self.max.filter(|limit| number > limit.value) {
            return Err(limit.message.to_string());
        }
        Ok(())
    }

    fn resolve(&self, value: &Value) -> Result<Bson, String> {
        self.coerce(value).and_then(|bson| self.normalize(bson))
    }

    /// OpenAPI property schema for this field.
    pub fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.kind.json_type()));

        if let Some(description) = self.description {
            schema.insert("description".into(), json!(description));
        }
        if let Some(limit) = self.min_length {
            schema.insert("minLength".into(), json!(limit.value));
        }
        if let Some(limit) = self.max_length {
            schema.insert("maxLength".into(), json!(limit.value));
        }
        if let Some(limit) = self.min {
            schema.insert("minimum".into(), json!(limit.value));
        }
        if let Some(limit) = self.max {
            schema.insert("maximum".into(), json!(limit.value));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), bson_to_json(default));
        }
        if self.derived {
            schema.insert("readOnly".into(), json!(true));
        }

        Value::Object(schema)
    }
}

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Every constraint a payload failed, in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .violations
            .iter()
            .map(|violation| violation.message.as_str())
            .collect();
        write!(f, "{}", messages.join(". "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Ordered set of field specs for one model.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Validate a full payload for insertion.
    ///
    /// Missing fields take their default; derived and unknown fields are
    /// dropped.
    pub fn validate_create(&self, payload: &Value) -> Result<Document, ValidationErrors> {
        let object = payload
            .as_object()
            .ok_or_else(|| ValidationErrors::single("body", "request body must be a JSON object"))?;

        let mut document = Document::new();
        let mut errors = ValidationErrors::default();

        for field in self.fields.iter().filter(|field| !field.derived) {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &field.default {
                        document.insert(field.name, default.clone());
                    } else if let Some(message) = field.required {
                        errors.push(field.name, message);
                    }
                }
                Some(value) => match field.resolve(value) {
                    Ok(bson) => {
                        document.insert(field.name, bson);
                    }
                    Err(message) => errors.push(field.name, message),
                },
            }
        }

        errors.into_result(document)
    }

    /// Validate a partial payload: only the fields present are checked and
    /// returned.
    pub fn validate_update(&self, payload: &Value) -> Result<Document, ValidationErrors> {
        let object = payload
            .as_object()
            .ok_or_else(|| ValidationErrors::single("body", "request body must be a JSON object"))?;

        let mut changes = Document::new();
        let mut errors = ValidationErrors::default();

        for field in self.fields.iter().filter(|field| !field.derived) {
            match object.get(field.name) {
                None => {}
                Some(Value::Null) => errors.push(
                    field.name,
                    field
                        .required
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} cannot be null", field.name)),
                ),
                Some(value) => match field.resolve(value) {
                    Ok(bson) => {
                        changes.insert(field.name, bson);
                    }
                    Err(message) => errors.push(field.name, message),
                },
            }
        }

        errors.into_result(changes)
    }

    /// Unique indexes implied by the field specs.
    pub fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.fields
            .iter()
            .filter(|field| field.unique)
            .map(|field| IndexSpec::unique(collection, field.name))
            .collect()
    }

    /// OpenAPI object schema. `for_input` drops derived fields and lists
    /// required ones.
    pub fn json_schema(&self, for_input: bool) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        if !for_input {
            properties.insert(
                "id".into(),
                json!({ "type": "string", "description": "Database identifier", "readOnly": true }),
            );
            required.push(json!("id"));
        }

        for field in &self.fields {
            if for_input && field.derived {
                continue;
            }
            properties.insert(field.name.into(), field.json_schema());
            if for_input && field.is_required() && field.default.is_none() {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::text("name")
                .required("A book must have a name")
                .unique()
                .trim()
                .min_length(3, "name too short")
                .max_length(40, "name too long"),
            FieldSpec::text("slug").derived(),
            FieldSpec::integer("pages").required("A book must have a number of pages"),
            FieldSpec::decimal("ratingsAverage")
                .default_value(4.5)
                .min(1.0, "rating below 1")
                .max(5.0, "rating above 5")
                .round_to(1),
            FieldSpec::boolean("secretBook").default_value(false),
        ])
    }

    #[test]
    fn create_applies_defaults_and_trims() {
        let document = schema()
            .validate_create(&json!({ "name": "  Dune  ", "pages": 412 }))
            .unwrap();

        assert_eq!(document.get_str("name").unwrap(), "Dune");
        assert_eq!(document.get_i64("pages").unwrap(), 412);
        assert_eq!(document.get_f64("ratingsAverage").unwrap(), 4.5);
        assert!(!document.get_bool("secretBook").unwrap());
    }

    #[test]
    fn create_collects_every_violation() {
        let errors = schema()
            .validate_create(&json!({ "name": "ab", "ratingsAverage": 9 }))
            .unwrap_err();

        let fields: Vec<&str> = errors
            .violations()
            .iter()
            .map(|violation| violation.field.as_str())
            .collect();
        assert_eq!(fields, ["name", "pages", "ratingsAverage"]);
    }

    #[test]
    fn create_rounds_before_range_check() {
        let document = schema()
            .validate_create(&json!({ "name": "Dune", "pages": 1, "ratingsAverage": 4.567 }))
            .unwrap();
        assert_eq!(document.get_f64("ratingsAverage").unwrap(), 4.6);

        let document = schema()
            .validate_create(&json!({ "name": "Dune", "pages": 1, "ratingsAverage": 0.96 }))
            .unwrap();
        assert_eq!(document.get_f64("ratingsAverage").unwrap(), 1.0);
    }

    #[test]
    fn create_ignores_derived_and_unknown_fields() {
        let document = schema()
            .validate_create(&json!({ "name": "Dune", "pages": 1, "slug": "x", "extra": 1 }))
            .unwrap();
        assert!(!document.contains_key("slug"));
        assert!(!document.contains_key("extra"));
    }

    #[test]
    fn blank_required_text_is_missing() {
        let errors = schema()
            .validate_create(&json!({ "name": "   ", "pages": 1 }))
            .unwrap_err();
        assert_eq!(errors.violations()[0].message, "A book must have a name");
    }

    #[test]
    fn integers_accept_whole_floats_and_numeric_strings() {
        let document = schema()
            .validate_create(&json!({ "name": "Dune", "pages": "412" }))
            .unwrap();
        assert_eq!(document.get_i64("pages").unwrap(), 412);

        let errors = schema()
            .validate_create(&json!({ "name": "Dune", "pages": 41.5 }))
            .unwrap_err();
        assert_eq!(errors.violations()[0].message, "pages must be a valid integer");
    }

    #[test]
    fn update_only_returns_provided_fields() {
        let changes = schema()
            .validate_update(&json!({ "ratingsAverage": 3.33 }))
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get_f64("ratingsAverage").unwrap(), 3.3);
    }

    #[test]
    fn update_rejects_null_and_invalid_values() {
        let errors = schema()
            .validate_update(&json!({ "name": null, "ratingsAverage": 7 }))
            .unwrap_err();
        assert_eq!(errors.violations().len(), 2);
        assert_eq!(errors.to_string(), "A book must have a name. rating above 5");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let errors = schema().validate_create(&json!([1, 2])).unwrap_err();
        assert_eq!(errors.violations()[0].field, "body");
    }

    #[test]
    fn unique_fields_become_indexes() {
        let indexes = schema().indexes("books");
        assert_eq!(indexes, vec![IndexSpec::unique("books", "name")]);
    }

    #[test]
    fn input_schema_skips_derived_fields() {
        let input = schema().json_schema(true);
        assert!(input["properties"].get("slug").is_none());
        assert_eq!(input["required"], json!(["name", "pages"]));

        let output = schema().json_schema(false);
        assert_eq!(output["properties"]["slug"]["readOnly"], json!(true));
    }
}
