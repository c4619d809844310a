//! Tool argument validation against JSON Schema.

use serde_json::Value;

/// Maximum validation errors reported per call.
const MAX_REPORTED: usize = 3;

/// A parameter schema compiled once at registration.
pub struct ArgumentSchema {
    raw: Value,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentSchema").field("raw", &self.raw).finish()
    }
}

impl ArgumentSchema {
    pub fn compile(raw: Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(&raw).map_err(|e| e.to_string())?;
        Ok(Self { raw, validator })
    }

    /// The schema as declared, for advertising to the model.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Validate `instance`, describing up to three violations on failure.
    pub fn validate(&self, instance: &Value) -> Result<(), String> {
        if self.validator.is_valid(instance) {
            return Ok(());
        }
        let messages: Vec<String> = self
            .validator
            .iter_errors(instance)
            .take(MAX_REPORTED)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{err} at {path}")
                }
            })
            .collect();
        Err(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ArgumentSchema {
        ArgumentSchema::compile(json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "max_price": {"type": "number"}
            },
            "required": ["query"]
        }))
        .unwrap()
    }

    #[test]
    fn test_accepts_valid_arguments() {
        assert!(schema().validate(&json!({"query": "tv", "max_price": 10})).is_ok());
    }

    #[test]
    fn test_reports_missing_and_mistyped_fields() {
        let err = schema().validate(&json!({"max_price": "cheap"})).unwrap_err();
        assert!(err.contains("query"), "{err}");
        assert!(err.contains("/max_price"), "{err}");
    }

    #[test]
    fn test_rejects_invalid_schema() {
        assert!(ArgumentSchema::compile(json!({"type": 12})).is_err());
    }
}
