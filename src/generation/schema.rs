//! Declarative shapes for backend answers and their validation.
//!
//! Only the handful of constructs the prompts need are supported: objects
//! with required/optional properties, bounded numbers, strings, homogeneous
//! arrays and fixed-length tuples. Unknown object properties are allowed.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Expected shape of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Object(Vec<Property>),
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    String,
    /// Any number of items, each matching the inner schema.
    Array(Box<Schema>),
    /// Exactly one item per schema, positionally.
    Tuple(Vec<Schema>),
}

/// A named object property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: &'static str,
    pub schema: Schema,
    pub required: bool,
}

impl Property {
    pub fn required(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: true,
        }
    }

    pub fn optional(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: false,
        }
    }
}

impl Schema {
    pub fn object(properties: impl IntoIterator<Item = Property>) -> Self {
        Schema::Object(properties.into_iter().collect())
    }

    pub fn number() -> Self {
        Schema::Number {
            minimum: None,
            maximum: None,
        }
    }

    pub fn number_between(minimum: f64, maximum: f64) -> Self {
        Schema::Number {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Tuple(items.into_iter().collect())
    }

    /// Check `value` against this schema, reporting the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.check(value, &mut Path::root())
    }

    fn check(&self, value: &Value, path: &mut Path) -> Result<(), SchemaViolation> {
        match self {
            Schema::Object(properties) => {
                let map = value
                    .as_object()
                    .ok_or_else(|| path.violation(format!("expected an object, got {}", kind(value))))?;
                for property in properties {
                    match map.get(property.name) {
                        Some(field) => {
                            path.push_key(property.name);
                            property.schema.check(field, path)?;
                            path.pop();
                        }
                        None if property.required => {
                            return Err(path.violation(format!(
                                "missing required property '{}'",
                                property.name
                            )));
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            Schema::Number { minimum, maximum } => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| path.violation(format!("expected a number, got {}", kind(value))))?;
                if let Some(min) = minimum.filter(|&min| number < min) {
                    return Err(path.violation(format!("{number} is below the minimum {min}")));
                }
                if let Some(max) = maximum.filter(|&max| number > max) {
                    return Err(path.violation(format!("{number} is above the maximum {max}")));
                }
                Ok(())
            }
            Schema::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(path.violation(format!("expected a string, got {}", kind(value))))
                }
            }
            Schema::Array(items) => {
                let array = value
                    .as_array()
                    .ok_or_else(|| path.violation(format!("expected an array, got {}", kind(value))))?;
                for (index, item) in array.iter().enumerate() {
                    path.push_index(index);
                    items.check(item, path)?;
                    path.pop();
                }
                Ok(())
            }
            Schema::Tuple(items) => {
                let array = value
                    .as_array()
                    .ok_or_else(|| path.violation(format!("expected an array, got {}", kind(value))))?;
                if array.len() != items.len() {
                    return Err(path.violation(format!(
                        "expected exactly {} items, got {}",
                        items.len(),
                        array.len()
                    )));
                }
                for (index, (schema, item)) in items.iter().zip(array).enumerate() {
                    path.push_index(index);
                    schema.check(item, path)?;
                    path.pop();
                }
                Ok(())
            }
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Location of a value inside the answer, e.g. `$.bought[0].price`.
#[derive(Debug, Default)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn root() -> Self {
        Self::default()
    }

    fn push_key(&mut self, key: &str) {
        self.segments.push(format!(".{key}"));
    }

    fn push_index(&mut self, index: usize) {
        self.segments.push(format!("[{index}]"));
    }

    fn pop(&mut self) {
        self.segments.pop();
    }

    fn violation(&self, reason: String) -> SchemaViolation {
        SchemaViolation {
            path: self.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// A value that does not match its schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amount() -> Schema {
        Schema::tuple([Schema::number(), Schema::String])
    }

    fn bill() -> Schema {
        Schema::object([
            Property::required("total", amount()),
            Property::optional(
                "bought",
                Schema::array(Schema::object([
                    Property::required("label", Schema::String),
                    Property::required("price", amount()),
                ])),
            ),
        ])
    }

    #[test]
    fn test_valid_bill() {
        let value = json!({
            "total": [10.0, "EUR"],
            "bought": [{"label": "Widget", "price": [10, "EUR"]}],
            "note": "extra properties are fine"
        });
        assert_eq!(bill().validate(&value), Ok(()));
    }

    #[test]
    fn test_optional_property_may_be_absent() {
        assert!(bill().validate(&json!({"total": [3, "USD"]})).is_ok());
    }

    #[test]
    fn test_missing_required_property() {
        let err = bill().validate(&json!({"bought": []})).unwrap_err();
        assert_eq!(err.path, "$");
        assert_eq!(err.reason, "missing required property 'total'");
    }

    #[test]
    fn test_nested_violation_path() {
        let value = json!({"total": [1, "EUR"], "bought": [{"label": "A", "price": ["1", "EUR"]}]});
        let err = bill().validate(&value).unwrap_err();
        assert_eq!(err.to_string(), "$.bought[0].price[0]: expected a number, got a string");
    }

    #[test]
    fn test_tuple_length() {
        let err = amount().validate(&json!([1, "EUR", "extra"])).unwrap_err();
        assert_eq!(err.reason, "expected exactly 2 items, got 3");
    }

    #[test]
    fn test_number_bounds() {
        let score = Schema::number_between(0.0, 1.0);
        assert!(score.validate(&json!(0)).is_ok());
        assert!(score.validate(&json!(1)).is_ok());
        assert!(score.validate(&json!(0.25)).is_ok());
        assert_eq!(
            score.validate(&json!(1.5)).unwrap_err().reason,
            "1.5 is above the maximum 1"
        );
        assert_eq!(
            score.validate(&json!(-0.5)).unwrap_err().reason,
            "-0.5 is below the minimum 0"
        );
    }

    #[test]
    fn test_booleans_are_not_numbers() {
        assert!(Schema::number().validate(&json!(true)).is_err());
    }

    #[test]
    fn test_non_object_root() {
        let err = bill().validate(&json!("just prose")).unwrap_err();
        assert_eq!(err.reason, "expected an object, got a string");
    }
}
