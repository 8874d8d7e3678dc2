//! Declared input shapes and the validator that coerces untyped payloads
//!
//! A `Schema` is built once per capability at registration time. `validate` turns the
//! raw JSON arguments of a call into typed `Arguments` or the first `ValidationError`.

use std::{collections::BTreeMap, fmt};

use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl TypedValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(value) => json!(value),
            Self::Integer(value) => json!(value),
            Self::Number(value) => json!(value),
            Self::Boolean(value) => json!(value),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub allowed_values: Option<Vec<TypedValue>>,
    pub default: Option<TypedValue>,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            allowed_values: None,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restricts the field to the given members, compared after coercion to `kind`.
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<TypedValue>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_value(mut self, value: TypedValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered set of declared fields. Declaration order drives validation order,
/// which decides which error wins when several fields are wrong.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn string(self, name: &str) -> Self {
        self.field(FieldSpec::new(name, FieldKind::String))
    }

    pub fn required_string(self, name: &str) -> Self {
        self.field(FieldSpec::new(name, FieldKind::String).required())
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Renders the schema as a JSON Schema object, the form MCP clients expect in
    /// `inputSchema`.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(field.kind.as_str()));
            if let Some(description) = &field.description {
                property.insert("description".to_string(), json!(description));
            }
            if let Some(allowed) = &field.allowed_values {
                property.insert(
                    "enum".to_string(),
                    Value::Array(allowed.iter().map(TypedValue::to_json).collect()),
                );
            }
            if let Some(default) = &field.default {
                property.insert("default".to_string(), default.to_json());
            }
            properties.insert(field.name.clone(), Value::Object(property));

            if field.required {
                required.push(json!(field.name));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid arguments: expected an object")]
    NotAnObject,
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Invalid type for {name}: expected {expected}")]
    InvalidType { name: String, expected: FieldKind },
    #[error("Invalid value for {name}: {value} (expected one of: {})", join_values(.allowed))]
    InvalidEnum {
        name: String,
        value: TypedValue,
        allowed: Vec<TypedValue>,
    },
}

fn join_values(values: &[TypedValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validated, coerced arguments handed to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, TypedValue>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(TypedValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn validate(schema: &Schema, input: Option<&Value>) -> Result<Arguments, ValidationError> {
    let empty = Map::new();
    let object = match input {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(object)) => object,
        Some(_) => return Err(ValidationError::NotAnObject),
    };

    let mut values = BTreeMap::new();
    for field in schema.fields() {
        match object.get(&field.name).filter(|value| !value.is_null()) {
            None if field.required => {
                return Err(ValidationError::MissingField(field.name.clone()));
            }
            None => {
                if let Some(default) = &field.default {
                    values.insert(field.name.clone(), default.clone());
                }
            }
            Some(raw) => {
                let value = coerce(field, raw)?;
                if let Some(allowed) = &field.allowed_values {
                    if !allowed.contains(&value) {
                        return Err(ValidationError::InvalidEnum {
                            name: field.name.clone(),
                            value,
                            allowed: allowed.clone(),
                        });
                    }
                }
                values.insert(field.name.clone(), value);
            }
        }
    }

    Ok(Arguments { values })
}

fn coerce(field: &FieldSpec, raw: &Value) -> Result<TypedValue, ValidationError> {
    let coerced = match (field.kind, raw) {
        (FieldKind::String, Value::String(value)) => Some(TypedValue::String(value.clone())),
        (FieldKind::String, Value::Number(value)) => Some(TypedValue::String(value.to_string())),
        (FieldKind::String, Value::Bool(value)) => Some(TypedValue::String(value.to_string())),
        (FieldKind::Integer, Value::Number(value)) => value.as_i64().map(TypedValue::Integer),
        (FieldKind::Integer, Value::String(value)) => {
            value.trim().parse::<i64>().ok().map(TypedValue::Integer)
        }
        (FieldKind::Number, Value::Number(value)) => value.as_f64().map(TypedValue::Number),
        (FieldKind::Number, Value::String(value)) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(TypedValue::Number),
        (FieldKind::Boolean, Value::Bool(value)) => Some(TypedValue::Boolean(*value)),
        (FieldKind::Boolean, Value::String(value)) => match value.trim() {
            "true" => Some(TypedValue::Boolean(true)),
            "false" => Some(TypedValue::Boolean(false)),
            _ => None,
        },
        _ => None,
    };

    coerced.ok_or_else(|| ValidationError::InvalidType {
        name: field.name.clone(),
        expected: field.kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn time_schema() -> Schema {
        Schema::new().field(
            FieldSpec::new("format", FieldKind::String)
                .one_of(["iso", "readable"])
                .default_value(TypedValue::String("readable".to_string())),
        )
    }

    #[test]
    fn missing_required_field_is_reported_by_name() {
        let schema = Schema::new().required_string("msg");

        let error = validate(&schema, Some(&json!({}))).expect_err("msg is required");
        assert_eq!(error, ValidationError::MissingField("msg".to_string()));
        assert_eq!(error.to_string(), "Missing field: msg");
    }

    #[test]
    fn absent_payload_behaves_like_empty_object() {
        let args = validate(&time_schema(), None).expect("defaults apply");
        assert_eq!(args.str("format"), Some("readable"));
    }

    #[test]
    fn null_field_counts_as_absent() {
        let args = validate(&time_schema(), Some(&json!({ "format": null }))).expect("valid");
        assert_eq!(args.str("format"), Some("readable"));
    }

    #[test]
    fn optional_field_without_default_is_omitted() {
        let schema = Schema::new().string("technology");
        let args = validate(&schema, Some(&json!({}))).expect("valid");
        assert!(!args.contains("technology"));
        assert!(args.is_empty());
    }

    #[test]
    fn rejects_value_outside_allowed_set() {
        let error = validate(&time_schema(), Some(&json!({ "format": "unix" })))
            .expect_err("unix is not allowed");

        assert!(matches!(error, ValidationError::InvalidEnum { ref name, .. } if name == "format"));
        assert_eq!(
            error.to_string(),
            "Invalid value for format: unix (expected one of: iso, readable)"
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let args = validate(
            &time_schema(),
            Some(&json!({ "format": "iso", "timezone": "UTC" })),
        )
        .expect("valid");
        assert_eq!(args.len(), 1);
        assert_eq!(args.str("format"), Some("iso"));
    }

    #[test]
    fn coerces_strings_into_declared_kinds() {
        let schema = Schema::new()
            .field(FieldSpec::new("count", FieldKind::Integer))
            .field(FieldSpec::new("ratio", FieldKind::Number))
            .field(FieldSpec::new("verbose", FieldKind::Boolean))
            .field(FieldSpec::new("label", FieldKind::String));

        let args = validate(
            &schema,
            Some(&json!({ "count": "12", "ratio": "0.5", "verbose": "true", "label": 7 })),
        )
        .expect("coercible");

        assert_eq!(args.get("count"), Some(&TypedValue::Integer(12)));
        assert_eq!(args.get("ratio"), Some(&TypedValue::Number(0.5)));
        assert_eq!(args.get("verbose"), Some(&TypedValue::Boolean(true)));
        assert_eq!(args.str("label"), Some("7"));
    }

    #[test]
    fn allowed_set_applies_to_non_string_kinds() {
        let schema = Schema::new().field(
            FieldSpec::new("retries", FieldKind::Integer)
                .required()
                .one_of([1_i64, 3, 5]),
        );

        let args = validate(&schema, Some(&json!({ "retries": "3" }))).expect("3 is allowed");
        assert_eq!(args.get("retries"), Some(&TypedValue::Integer(3)));

        let error = validate(&schema, Some(&json!({ "retries": 4 }))).expect_err("4 is not allowed");
        assert_eq!(
            error.to_string(),
            "Invalid value for retries: 4 (expected one of: 1, 3, 5)"
        );
        assert_eq!(schema.json_schema()["properties"]["retries"]["enum"], json!([1, 3, 5]));
    }

    #[test]
    fn rejects_uncoercible_value() {
        let schema = Schema::new().field(FieldSpec::new("count", FieldKind::Integer).required());

        let error = validate(&schema, Some(&json!({ "count": "twelve" }))).expect_err("not a number");
        assert_eq!(error.to_string(), "Invalid type for count: expected integer");
    }

    #[test]
    fn rejects_non_object_payload() {
        let error = validate(&time_schema(), Some(&json!(["iso"]))).expect_err("array payload");
        assert_eq!(error, ValidationError::NotAnObject);
    }

    #[test]
    fn first_error_wins_in_declaration_order() {
        let schema = Schema::new().required_string("role").required_string("level");

        let error = validate(&schema, Some(&json!({}))).expect_err("both missing");
        assert_eq!(error, ValidationError::MissingField("role".to_string()));
    }

    #[test]
    fn json_schema_lists_required_enum_and_default() {
        let schema = Schema::new()
            .field(
                FieldSpec::new("url", FieldKind::String)
                    .required()
                    .describe("Target URL"),
            )
            .field(
                FieldSpec::new("method", FieldKind::String)
                    .one_of(["GET", "POST"])
                    .default_value(TypedValue::String("GET".to_string())),
            );

        let rendered = schema.json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["url"]));
        assert_eq!(rendered["properties"]["url"]["description"], "Target URL");
        assert_eq!(rendered["properties"]["method"]["enum"], json!(["GET", "POST"]));
        assert_eq!(rendered["properties"]["method"]["default"], "GET");
    }

    #[test]
    fn empty_schema_renders_without_required_key() {
        let rendered = Schema::new().json_schema();
        assert_eq!(rendered, json!({ "type": "object", "properties": {} }));
    }
}
