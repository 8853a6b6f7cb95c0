//! # Structured output schemas
//!
//! An [`OutputSchema`] is the JSON schema of a Rust type, generated with
//! `schemars`, plus a validator that checks a model's raw answer against it.
//! Agents that declare an output schema never hand an unvalidated value back to
//! the caller: the runner calls [`OutputSchema::parse_text`] on the final
//! answer and surfaces [`AgentsError::SchemaValidation`] on mismatch.
//!
//! Validation is delegated to `jsonschema`; every violation is reported with
//! the JSON pointer of the offending value.
//!
//! ```rust
//! use apprise_agents::output::OutputSchema;
//! use apprise_agents::schemas::EscalationData;
//!
//! let schema = OutputSchema::of::<EscalationData>();
//! assert!(schema.validate(&serde_json::json!({"reason": "locked out"})).is_ok());
//! assert!(schema.validate(&serde_json::json!({"priority": "High"})).is_err());
//! ```

use schemars::JsonSchema;
use serde_json::Value;

use crate::error::{AgentsError, Result};

/// The declared shape of a structured value, with its validator.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: String,
    schema: Value,
}

impl OutputSchema {
    /// Derive the schema of `T`.
    pub fn of<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            name: T::schema_name().into_owned(),
            schema: schema.to_value(),
        }
    }

    /// Wrap a hand-written JSON schema.
    pub fn from_value(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Check `value` against the schema.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let validator = jsonschema::Validator::new(&self.schema)
            .map_err(|e| AgentsError::schema(&self.name, format!("invalid schema: {e}")))?;
        if validator.is_valid(value) {
            return Ok(());
        }
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| {
                let path = e.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                format!("{path}: {e}")
            })
            .collect();
        Err(AgentsError::schema(&self.name, errors.join("; ")))
    }

    /// Parse a model's raw text answer as JSON and validate it.
    ///
    /// A surrounding markdown code fence is tolerated; anything else that is
    /// not JSON is a validation failure.
    pub fn parse_text(&self, text: &str) -> Result<Value> {
        let body = strip_code_fence(text);
        let value: Value = serde_json::from_str(body).map_err(|e| {
            AgentsError::schema(&self.name, format!("output is not valid JSON: {}", e))
        })?;
        self.validate(&value)?;
        Ok(value)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
