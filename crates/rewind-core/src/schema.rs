// Structured-output schema validation
//
// Agents translate LLM output into events, so the output must be validated
// before it is allowed to drive state transitions. Schema is a small
// declarative validator over serde_json::Value; to_json_value() produces a
// JSON-Schema-shaped document for providers that accept an output format
// hint.

use serde_json::{json, Value};
use thiserror::Error;

/// Validation failure, carrying the path to the offending value
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Schema violation at {path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Declarative validator for agent output
#[derive(Debug, Clone)]
pub enum Schema {
    /// Accepts any value
    Any,
    Bool,
    Number,
    String,
    /// Homogeneous array
    Array(Box<Schema>),
    /// Object with named fields; unknown fields are allowed
    Object(Vec<Field>),
}

/// A named object field
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
        }
    }
}

impl Schema {
    /// Convenience constructor for an object schema
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Schema::Object(fields.into_iter().collect())
    }

    /// Convenience constructor for an array schema
    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    /// Validate a value against this schema
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaError> {
        match self {
            Schema::Any => Ok(()),
            Schema::Bool => match value {
                Value::Bool(_) => Ok(()),
                other => Err(SchemaError::new(path, type_mismatch("boolean", other))),
            },
            Schema::Number => match value {
                Value::Number(_) => Ok(()),
                other => Err(SchemaError::new(path, type_mismatch("number", other))),
            },
            Schema::String => match value {
                Value::String(_) => Ok(()),
                other => Err(SchemaError::new(path, type_mismatch("string", other))),
            },
            Schema::Array(items) => match value {
                Value::Array(values) => {
                    for (index, item) in values.iter().enumerate() {
                        items.validate_at(item, &format!("{path}[{index}]"))?;
                    }
                    Ok(())
                }
                other => Err(SchemaError::new(path, type_mismatch("array", other))),
            },
            Schema::Object(fields) => match value {
                Value::Object(map) => {
                    for field in fields {
                        let field_path = format!("{path}.{}", field.name);
                        match map.get(&field.name) {
                            Some(v) => field.schema.validate_at(v, &field_path)?,
                            None if field.required => {
                                return Err(SchemaError::new(
                                    &field_path,
                                    "required field is missing",
                                ));
                            }
                            None => {}
                        }
                    }
                    Ok(())
                }
                other => Err(SchemaError::new(path, type_mismatch("object", other))),
            },
        }
    }

    /// Render this schema as a JSON-Schema-shaped value
    pub fn to_json_value(&self) -> Value {
        match self {
            Schema::Any => json!({}),
            Schema::Bool => json!({"type": "boolean"}),
            Schema::Number => json!({"type": "number"}),
            Schema::String => json!({"type": "string"}),
            Schema::Array(items) => json!({"type": "array", "items": items.to_json_value()}),
            Schema::Object(fields) => {
                let properties: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.name.clone(), f.schema.to_json_value()))
                    .collect();
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

fn type_mismatch(expected: &str, actual: &Value) -> String {
    let actual_type = match actual {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("expected {expected}, got {actual_type}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_schema() -> Schema {
        Schema::object([
            Field::required("title", Schema::String),
            Field::required("priority", Schema::Number),
            Field::optional("tags", Schema::array(Schema::String)),
        ])
    }

    #[test]
    fn test_valid_object_passes() {
        let value = json!({"title": "write tests", "priority": 2, "tags": ["a", "b"]});
        assert!(task_schema().validate(&value).is_ok());
    }

    #[test]
    fn test_missing_required_field_fails_with_path() {
        let err = task_schema().validate(&json!({"title": "x"})).unwrap_err();
        assert_eq!(err.path, "$.priority");
    }

    #[test]
    fn test_wrong_type_in_array_fails_with_index() {
        let value = json!({"title": "x", "priority": 1, "tags": ["ok", 7]});
        let err = task_schema().validate(&value).unwrap_err();
        assert_eq!(err.path, "$.tags[1]");
    }

    #[test]
    fn test_unknown_fields_are_allowed() {
        let value = json!({"title": "x", "priority": 1, "extra": true});
        assert!(task_schema().validate(&value).is_ok());
    }

    #[test]
    fn test_json_value_rendering() {
        let rendered = task_schema().to_json_value();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["title"]["type"], "string");
        assert_eq!(rendered["required"], json!(["title", "priority"]));
    }
}
