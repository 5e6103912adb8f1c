use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::{json, Value};

use crate::error::WardenError;
use crate::types::{FileType, ValidationError};

/// Compiled document schemas, one per file type.
///
/// Compiled once per process on first use and immutable afterwards, so
/// concurrent readers are safe.
pub struct SchemaStore {
    state: Validator,
    plan: Validator,
    task_registry: Validator,
}

static STORE: OnceLock<Result<SchemaStore, String>> = OnceLock::new();

impl SchemaStore {
    /// The process-wide store. Compilation failure of the embedded schemas
    /// is reported (not panicked) so the schema layer can surface it as an
    /// internal error.
    pub fn shared() -> Result<&'static SchemaStore, WardenError> {
        match STORE.get_or_init(SchemaStore::compile) {
            Ok(store) => Ok(store),
            Err(message) => Err(WardenError::SchemaCompile(message.clone())),
        }
    }

    fn compile() -> Result<SchemaStore, String> {
        let state = state_schema();
        let plan = plan_schema();
        let task_registry = task_registry_schema();
        Ok(SchemaStore {
            state: jsonschema::validator_for(&state).map_err(|e| e.to_string())?,
            plan: jsonschema::validator_for(&plan).map_err(|e| e.to_string())?,
            task_registry: jsonschema::validator_for(&task_registry).map_err(|e| e.to_string())?,
        })
    }

    fn validator(&self, file_type: FileType) -> &Validator {
        match file_type {
            FileType::State => &self.state,
            FileType::Plan => &self.plan,
            FileType::TaskRegistry => &self.task_registry,
        }
    }

    /// Validate a parsed document against its schema.
    ///
    /// Engine-native errors are translated into `ValidationError`s with
    /// `SCHEMA_`-prefixed codes and JSON-pointer paths into `data`.
    pub fn validate(&self, file_type: FileType, data: &Value) -> (bool, Vec<ValidationError>) {
        let errors: Vec<ValidationError> = self
            .validator(file_type)
            .iter_errors(data)
            .map(translate_error)
            .collect();
        (errors.is_empty(), errors)
    }
}

/// Map an engine error onto the validator's code taxonomy.
///
/// Known constraint keywords get fixed codes; anything else falls through
/// with its upper-cased keyword name. Messages come from the engine, which
/// formats them from the constraint's parameters.
fn translate_error(err: jsonschema::ValidationError<'_>) -> ValidationError {
    use jsonschema::error::ValidationErrorKind as Kind;

    let code = match &err.kind() {
        Kind::Required { .. } => "SCHEMA_MISSING_REQUIRED".to_string(),
        Kind::Type { .. } => "SCHEMA_INVALID_TYPE".to_string(),
        Kind::Enum { .. } => "SCHEMA_INVALID_ENUM".to_string(),
        Kind::Pattern { .. } => "SCHEMA_INVALID_PATTERN".to_string(),
        Kind::MinLength { .. } | Kind::MinItems { .. } | Kind::MinProperties { .. } => {
            "SCHEMA_VALUE_TOO_SHORT".to_string()
        }
        Kind::MaxLength { .. } | Kind::MaxItems { .. } | Kind::MaxProperties { .. } => {
            "SCHEMA_VALUE_TOO_LONG".to_string()
        }
        Kind::Minimum { .. } | Kind::ExclusiveMinimum { .. } => {
            "SCHEMA_VALUE_TOO_SMALL".to_string()
        }
        Kind::Maximum { .. } | Kind::ExclusiveMaximum { .. } => {
            "SCHEMA_VALUE_TOO_LARGE".to_string()
        }
        other => {
            let debug = format!("{:?}", other);
            let keyword: String = debug
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            format!("SCHEMA_{}", keyword.to_uppercase())
        }
    };

    let message = err.to_string();
    let pointer = err.instance_path().to_string();
    ValidationError::new(code, message).with_path(pointer)
}

fn state_schema() -> Value {
    json!({
        "type": "object",
        "required": ["current_position", "next_steps"],
        "properties": {
            "current_position": {
                "type": "object",
                "required": ["phase", "status"],
                "properties": {
                    "phase": { "type": "integer", "minimum": 0 },
                    "status": {
                        "type": "string",
                        "enum": [
                            "planning",
                            "executing",
                            "verifying",
                            "complete",
                            "blocked",
                            "Ready to start"
                        ]
                    }
                }
            },
            "previous_status": { "type": "string" },
            "active_task": {},
            "next_steps": {
                "type": "array",
                "items": { "type": "string" }
            },
            "decisions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["date", "decision", "rationale"],
                    "properties": {
                        "date": { "type": "string" },
                        "decision": { "type": "string" },
                        "rationale": { "type": "string" }
                    }
                }
            },
            "session_log": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["timestamp", "action"],
                    "properties": {
                        "timestamp": { "type": "string" },
                        "action": { "type": "string" },
                        "agent": { "type": "string" },
                        "task_id": { "type": "string" }
                    }
                }
            },
            "open_questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "question", "status"],
                    "properties": {
                        "id": { "type": "string" },
                        "question": { "type": "string" },
                        "status": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "required": ["phase", "plan", "wave"],
        "properties": {
            "phase": { "type": "string" },
            "plan": { "type": "integer", "minimum": 1 },
            "wave": { "type": "integer", "minimum": 1 },
            "autonomous": { "type": "boolean" },
            "agent": { "type": "string" },
            "depends_on": {
                "type": "array",
                "items": { "type": "string", "pattern": "^\\d{2}-\\d{2}$" }
            },
            "priority": {
                "type": "string",
                "enum": ["critical", "high", "medium", "low"]
            },
            "must_haves": {}
        }
    })
}

fn task_registry_schema() -> Value {
    json!({
        "type": "object",
        "required": ["version", "project", "last_task_id", "tasks"],
        "properties": {
            "version": { "type": "string" },
            "project": { "type": "string" },
            "last_task_id": { "type": "integer", "minimum": 0 },
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": [
                        "id",
                        "title",
                        "phase",
                        "status",
                        "assignee",
                        "dependencies",
                        "created"
                    ],
                    "properties": {
                        "id": { "type": "string", "pattern": "^T\\d{3}$" },
                        "title": { "type": "string", "minLength": 1, "maxLength": 200 },
                        "phase": { "type": "integer", "minimum": 1 },
                        "status": {
                            "type": "string",
                            "enum": ["pending", "in_progress", "blocked", "completed"]
                        },
                        "assignee": { "type": "string" },
                        "dependencies": {
                            "type": "array",
                            "items": { "type": "string" }
                        },
                        "created": { "type": "string" },
                        "completed": { "type": "string" },
                        "blocked_by": { "type": "string" },
                        "leverage": { "type": "integer", "minimum": 0, "maximum": 10 }
                    }
                }
            }
        }
    })
}
