//! Structured-output validation
//!
//! Callers that request structured output supply a JSON schema. The gateway
//! checks the final text parses as strict JSON and satisfies the schema's
//! object shape: required keys present, declared property types matching.
//! Anything deeper is the caller's concern when deserializing.

use arena_core::GatewayError;
use serde_json::Value;

/// Parse `text` as strict JSON and check it against `schema`.
///
/// Returns the parsed value, or `GatewayError::Invalid` on a parse failure
/// or schema mismatch.
pub fn validate_structured(text: &str, schema: &Value) -> Result<Value, GatewayError> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| GatewayError::Invalid {
        reason: format!("response is not valid JSON: {}", e),
    })?;

    check_value(&value, schema, "$")?;
    Ok(value)
}

fn check_value(value: &Value, schema: &Value, path: &str) -> Result<(), GatewayError> {
    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let matches = match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    };
    if !matches {
        return Err(GatewayError::Invalid {
            reason: format!("{}: expected {}, got {}", path, expected, type_name(value)),
        });
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(key) {
                    return Err(GatewayError::Invalid {
                        reason: format!("{}: missing required field '{}'", path, key),
                    });
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, property_schema) in properties {
                if let Some(field) = object.get(key) {
                    check_value(field, property_schema, &format!("{}.{}", path, key))?;
                }
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                check_value(item, item_schema, &format!("{}[{}]", path, i))?;
            }
        }
    }

    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn verdict_schema() -> Value {
        json!({
            "type": "object",
            "required": ["recommended_winner", "confidence"],
            "properties": {
                "recommended_winner": { "type": "string" },
                "confidence": { "type": "number" },
                "key_differentiators": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            }
        })
    }

    #[test]
    fn test_valid_payload_passes() {
        let text = r#"{"recommended_winner": "agent1", "confidence": 0.8}"#;
        let value = validate_structured(text, &verdict_schema()).unwrap();
        assert_eq!(value["confidence"], json!(0.8));
    }

    #[test]
    fn test_not_json_fails() {
        let result = validate_structured("I think agent1 wins", &verdict_schema());
        assert!(matches!(result, Err(GatewayError::Invalid { .. })));
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result = validate_structured(r#"{"confidence": 0.8}"#, &verdict_schema());
        let Err(GatewayError::Invalid { reason }) = result else {
            panic!("expected Invalid");
        };
        assert!(reason.contains("recommended_winner"));
    }

    #[test]
    fn test_wrong_property_type_fails() {
        let text = r#"{"recommended_winner": "agent1", "confidence": "high"}"#;
        let result = validate_structured(text, &verdict_schema());
        assert!(matches!(result, Err(GatewayError::Invalid { .. })));
    }

    #[test]
    fn test_array_items_checked() {
        let text = r#"{
            "recommended_winner": "agent2",
            "confidence": 1.0,
            "key_differentiators": ["depth", 42]
        }"#;
        let result = validate_structured(text, &verdict_schema());
        assert!(matches!(result, Err(GatewayError::Invalid { .. })));
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let text = "\n  {\"recommended_winner\": \"agent1\", \"confidence\": 0.5}  \n";
        assert!(validate_structured(text, &verdict_schema()).is_ok());
    }
}
