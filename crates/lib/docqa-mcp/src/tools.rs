//! Tool descriptors and argument validation.

use std::fmt;
use std::sync::Arc;

use rmcp::model::{JsonObject, Tool};
use serde_json::Value;

pub const CREATE_QUERY_TOOL: &str = "create-query";
pub const DOCUMENTATION_TOOL: &str = "documentation";

/// Subject used in tool descriptions before a service description exists.
pub const FALLBACK_SUBJECT: &str = "the documented service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    CreateQuery,
    Documentation,
}

impl ToolName {
    pub const ALL: [Self; 2] = [Self::CreateQuery, Self::Documentation];

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateQuery => CREATE_QUERY_TOOL,
            Self::Documentation => DOCUMENTATION_TOOL,
        }
    }

    fn describe(self, subject: &str) -> String {
        match self {
            Self::CreateQuery => format!(
                "Generate a query for {subject}. Describe what you need in natural language; \
                 the reply contains only the query."
            ),
            Self::Documentation => format!(
                "Answer questions about {subject} using only its documentation."
            ),
        }
    }

    /// Text returned in place of a result when the upstream call failed.
    #[must_use]
    pub fn failure_text(self, request: &str, cause: &impl fmt::Display) -> String {
        match self {
            Self::CreateQuery => {
                format!("Error: Unable to generate query for request: \"{request}\". {cause}")
            }
            Self::Documentation => {
                format!("Error: Unable to process documentation request: \"{request}\". {cause}")
            }
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check on the tool arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: String,
}

impl FieldViolation {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Validated arguments shared by both tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub request: String,
}

/// Checks `arguments` against `{ request: non-empty string }`.
///
/// # Errors
/// Returns every violated field with a human-readable reason.
pub fn validate_arguments(
    arguments: Option<&JsonObject>,
) -> Result<ToolRequest, Vec<FieldViolation>> {
    let mut violations = Vec::new();
    let request = match arguments.and_then(|args| args.get("request")) {
        None => {
            violations.push(FieldViolation::new("request", "is required"));
            None
        }
        Some(Value::String(value)) if value.is_empty() => {
            violations.push(FieldViolation::new(
                "request",
                "must contain at least 1 character",
            ));
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => {
            violations.push(FieldViolation::new(
                "request",
                format!("expected string, received {}", json_type(other)),
            ));
            None
        }
    };

    match request {
        Some(request) if violations.is_empty() => Ok(ToolRequest { request }),
        _ => Err(violations),
    }
}

/// Input schema shared by both tools.
#[must_use]
pub fn request_schema() -> JsonObject {
    match serde_json::json!({
        "type": "object",
        "properties": {
            "request": {
                "type": "string",
                "minLength": 1,
                "description": "Natural-language request."
            }
        },
        "required": ["request"]
    }) {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Builds both descriptors, suffixing descriptions with the lower-cased
/// service description when one is known.
#[must_use]
pub fn tool_descriptors(description: Option<&str>) -> Vec<Tool> {
    let subject = description
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.trim_end_matches('.').to_lowercase());
    let subject = subject.as_deref().unwrap_or(FALLBACK_SUBJECT);
    let schema = Arc::new(request_schema());

    ToolName::ALL
        .into_iter()
        .map(|tool| Tool::new(tool.as_str(), tool.describe(subject), schema.clone()))
        .collect()
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
