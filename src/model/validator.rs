use std::fmt;

use serde_json::Value;

use super::schema::{ObjectSchema, SchemaNode, plan_schema};

/// First schema violation found, with a JSON-path style location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_plan(value: &Value) -> Result<(), ValidationError> {
    validate(plan_schema(), value)
}

pub fn validate(schema: &SchemaNode, value: &Value) -> Result<(), ValidationError> {
    validate_at(schema, value, "$")
}

fn validate_at(schema: &SchemaNode, value: &Value, path: &str) -> Result<(), ValidationError> {
    match (schema, value) {
        (SchemaNode::String, Value::String(_)) | (SchemaNode::Number, Value::Number(_)) => Ok(()),
        (SchemaNode::Object(object), Value::Object(_)) => validate_object(object, value, path),
        (SchemaNode::Array(items), Value::Array(values)) => {
            for (idx, item) in values.iter().enumerate() {
                validate_at(items, item, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
        (expected, actual) => Err(ValidationError {
            path: path.to_string(),
            reason: format!("expected {}, found {}", expected.type_name(), json_type(actual)),
        }),
    }
}

fn validate_object(schema: &ObjectSchema, value: &Value, path: &str) -> Result<(), ValidationError> {
    let Value::Object(map) = value else {
        return Err(ValidationError {
            path: path.to_string(),
            reason: format!("{} must be an object", schema.entity),
        });
    };

    for field in schema.fields.iter().filter(|field| field.required) {
        if !map.contains_key(field.name) {
            return Err(ValidationError {
                path: path.to_string(),
                reason: format!("{} is missing required field '{}'", schema.entity, field.name),
            });
        }
    }

    for (key, child) in map {
        let Some(field) = schema.field(key) else {
            return Err(ValidationError {
                path: path.to_string(),
                reason: format!("{} does not allow field '{}'", schema.entity, key),
            });
        };
        validate_at(&field.node, child, &format!("{path}.{key}"))?;
    }

    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
