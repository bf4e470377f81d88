use jsonschema::Validator;
use serde_json::Value;

use crate::errors::PlanError;

/// JSON schema every planner output must satisfy
pub const PLAN_SCHEMA: &str = r#"{
  "type": "array",
  "minItems": 1,
  "items": {
    "type": "object",
    "required": ["id", "type", "description"],
    "properties": {
      "id": {"type": "integer", "minimum": 1},
      "type": {"type": "string", "minLength": 1},
      "description": {"type": "string", "minLength": 1},
      "dependencies": {"type": "array", "items": {"type": "integer", "minimum": 1}},
      "status": {"type": "string"},
      "required": {"type": "boolean"},
      "capabilities": {"type": "array", "items": {"type": "string"}},
      "requires_review": {"type": "boolean"}
    }
  }
}"#;

/// Creates a JSON Schema validator from a schema string
///
/// # Arguments
/// * `schema_content` - The JSON Schema as a string
pub fn build_validator(schema_content: &str) -> Result<Validator, PlanError> {
    let schema: Value = serde_json::from_str(schema_content)
        .map_err(|e| PlanError::InvalidPlan(format!("schema is not JSON: {}", e)))?;
    jsonschema::validator_for(&schema).map_err(|e| PlanError::InvalidPlan(e.to_string()))
}

/// Validates a JSON value against a schema validator
pub fn validate_value(schema: &Validator, value: &Value) -> bool {
    schema.is_valid(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_schema_accepts_planner_output() {
        let validator = build_validator(PLAN_SCHEMA).unwrap();
        let plan = json!([
            {"id": 1, "type": "research", "description": "look", "dependencies": [], "status": "pending", "result": null}
        ]);
        assert!(validate_value(&validator, &plan));
        assert!(!validate_value(&validator, &json!([])));
        assert!(!validate_value(&validator, &json!([{"id": 0, "type": "x", "description": "y"}])));
    }
}
