use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::exit_code::ExitCode;

// --- File types ---

/// The three planning artifacts the validator understands.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    State,
    Plan,
    TaskRegistry,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::State => "state",
            FileType::Plan => "plan",
            FileType::TaskRegistry => "task-registry",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_file_type(s: &str) -> Result<FileType, String> {
    match s.to_lowercase().as_str() {
        "state" => Ok(FileType::State),
        "plan" => Ok(FileType::Plan),
        "task-registry" | "tasks" => Ok(FileType::TaskRegistry),
        _ => Err(format!(
            "Invalid file type '{}': expected state, plan, or task-registry",
            s
        )),
    }
}

/// Infer the file type from a path, case-insensitively.
///
/// `STATE.json` / `state.md` are state documents, `TASKS.json` is the task
/// registry, and anything containing `.plan.` (or ending `.plan.md`) is a
/// plan. Returns `None` when the name matches nothing.
pub fn detect_file_type(path: &Path) -> Option<FileType> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();

    if name.ends_with("state.json") || name.ends_with("state.md") {
        return Some(FileType::State);
    }
    if name.ends_with("tasks.json") {
        return Some(FileType::TaskRegistry);
    }
    if name.contains(".plan.") || name.ends_with(".plan.md") {
        return Some(FileType::Plan);
    }
    None
}

// --- Identifier formats ---

/// True for task ids of the form `T` plus exactly three decimal digits.
pub fn is_task_id(s: &str) -> bool {
    let Some(suffix) = s.strip_prefix('T') else {
        return false;
    };
    suffix.len() == 3 && suffix.chars().all(|c| c.is_ascii_digit())
}

/// Numeric suffix of a well-formed task id (`"T042"` -> `42`).
pub fn task_id_suffix(s: &str) -> Option<u32> {
    if !is_task_id(s) {
        return None;
    }
    s[1..].parse().ok()
}

/// True for plan ids of the form `NN-NN` (two-digit phase, two-digit plan).
pub fn is_plan_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 5
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[2] == b'-'
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit()
}

// --- Layers ---

/// The four validation layers, in their fixed pipeline order.
///
/// The order is a design invariant: a later layer may presume the
/// invariants established by earlier layers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum LayerName {
    Schema,
    Semantic,
    Referential,
    StateMachine,
}

impl LayerName {
    pub const ALL: [LayerName; 4] = [
        LayerName::Schema,
        LayerName::Semantic,
        LayerName::Referential,
        LayerName::StateMachine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerName::Schema => "schema",
            LayerName::Semantic => "semantic",
            LayerName::Referential => "referential",
            LayerName::StateMachine => "state-machine",
        }
    }

    /// Prefix used for this layer's error codes, e.g. `STATE_MACHINE`.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            LayerName::Schema => "SCHEMA",
            LayerName::Semantic => "SEMANTIC",
            LayerName::Referential => "REFERENTIAL",
            LayerName::StateMachine => "STATE_MACHINE",
        }
    }

    /// The exit code a failure in this layer maps to.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            LayerName::Schema => ExitCode::ValidationSchema,
            LayerName::Semantic => ExitCode::ValidationSemantic,
            LayerName::Referential => ExitCode::ValidationReferential,
            LayerName::StateMachine => ExitCode::ValidationStateMachine,
        }
    }
}

impl std::fmt::Display for LayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Errors and warnings ---

/// A single validation finding.
///
/// `path` is a JSON pointer into the validated document. `details` is a
/// structured blob specific to the code (cycle vectors, allowed transition
/// sets, expected/actual pairs).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ValidationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            code: code.into(),
            message: message.into(),
            path: None,
            details: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Warnings share the error shape but never fail a layer.
pub type ValidationWarning = ValidationError;

// --- Layer results ---

/// Outcome of a single layer run. Immutable once constructed; the
/// `success_result` / `failure_result` helpers are the only construction
/// sites.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LayerResult {
    pub layer: LayerName,
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub metadata: Map<String, Value>,
}

/// A clean pass with no findings.
pub fn success_result(layer: LayerName, metadata: Option<Map<String, Value>>) -> LayerResult {
    let mut metadata = metadata.unwrap_or_default();
    metadata.insert("exit_code".to_string(), ExitCode::Success.code().into());
    metadata.insert("warning_count".to_string(), 0u32.into());
    LayerResult {
        layer,
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        metadata,
    }
}

/// A layer run that produced findings.
///
/// Validity is derived from `errors` alone: warnings never fail a layer, so
/// a call with an empty error list yields a valid result that still carries
/// its warnings.
pub fn failure_result(
    layer: LayerName,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
    metadata: Option<Map<String, Value>>,
) -> LayerResult {
    let valid = errors.is_empty();
    let exit_code = if valid {
        ExitCode::Success
    } else {
        layer.exit_code()
    };
    let mut metadata = metadata.unwrap_or_default();
    metadata.insert("exit_code".to_string(), exit_code.code().into());
    metadata.insert("warning_count".to_string(), (warnings.len() as u32).into());
    LayerResult {
        layer,
        valid,
        errors,
        warnings,
        metadata,
    }
}

// --- Validation context ---

/// Everything a layer gets to see.
///
/// `previous_results` is the ordered list of earlier `LayerResult`s: results
/// from layers already run in this pipeline, plus any prior-run results the
/// caller re-presents (that is how the state-machine layer receives its
/// previous-state snapshot). The document itself is borrowed for the run and
/// never mutated.
#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub project_path: Option<PathBuf>,
    pub file_type: FileType,
    pub file_path: Option<PathBuf>,
    pub data: Arc<Value>,
    pub previous_results: Vec<LayerResult>,
}

impl ValidationContext {
    pub fn new(file_type: FileType, data: Value) -> Self {
        ValidationContext {
            project_path: None,
            file_type,
            file_path: None,
            data: Arc::new(data),
            previous_results: Vec::new(),
        }
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_previous_results(mut self, results: Vec<LayerResult>) -> Self {
        self.previous_results = results;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detect_state_files() {
        assert_eq!(
            detect_file_type(Path::new("/p/.planning/STATE.json")),
            Some(FileType::State)
        );
        assert_eq!(
            detect_file_type(Path::new("notes/state.md")),
            Some(FileType::State)
        );
    }

    #[test]
    fn detect_task_registry() {
        assert_eq!(
            detect_file_type(Path::new("/p/.planning/TASKS.json")),
            Some(FileType::TaskRegistry)
        );
    }

    #[test]
    fn detect_plans() {
        assert_eq!(
            detect_file_type(Path::new("01-02.plan.json")),
            Some(FileType::Plan)
        );
        assert_eq!(
            detect_file_type(Path::new("01-02-auth.plan.md")),
            Some(FileType::Plan)
        );
    }

    #[test]
    fn detect_unknown() {
        assert_eq!(detect_file_type(Path::new("README.md")), None);
        assert_eq!(detect_file_type(Path::new("config.json")), None);
    }

    #[test]
    fn task_id_format() {
        assert!(is_task_id("T001"));
        assert!(is_task_id("T999"));
        assert!(!is_task_id("T1"));
        assert!(!is_task_id("T0001"));
        assert!(!is_task_id("t001"));
        assert!(!is_task_id("X001"));
        assert!(!is_task_id("None"));
        assert_eq!(task_id_suffix("T042"), Some(42));
        assert_eq!(task_id_suffix("T04x"), None);
    }

    #[test]
    fn plan_id_format() {
        assert!(is_plan_id("01-02"));
        assert!(is_plan_id("99-99"));
        assert!(!is_plan_id("1-02"));
        assert!(!is_plan_id("01_02"));
        assert!(!is_plan_id("01-002"));
    }

    #[test]
    fn layer_order_is_fixed() {
        assert_eq!(
            LayerName::ALL,
            [
                LayerName::Schema,
                LayerName::Semantic,
                LayerName::Referential,
                LayerName::StateMachine,
            ]
        );
    }

    #[test]
    fn layer_exit_codes() {
        assert_eq!(LayerName::Schema.exit_code().code(), 5);
        assert_eq!(LayerName::Semantic.exit_code().code(), 6);
        assert_eq!(LayerName::Referential.exit_code().code(), 7);
        assert_eq!(LayerName::StateMachine.exit_code().code(), 8);
    }

    #[test]
    fn success_result_stamps_metadata() {
        let result = success_result(LayerName::Schema, None);
        assert!(result.valid);
        assert_eq!(result.metadata["exit_code"], json!(0));
        assert_eq!(result.metadata["warning_count"], json!(0));
    }

    #[test]
    fn failure_result_derives_validity_from_errors() {
        let warn = ValidationError::new("SEMANTIC_PHASE_GAP", "gap");
        let result = failure_result(LayerName::Semantic, Vec::new(), vec![warn], None);
        assert!(result.valid);
        assert_eq!(result.metadata["exit_code"], json!(0));
        assert_eq!(result.metadata["warning_count"], json!(1));

        let err = ValidationError::new("SEMANTIC_INVALID_PHASE", "bad phase");
        let result = failure_result(LayerName::Semantic, vec![err], Vec::new(), None);
        assert!(!result.valid);
        assert_eq!(result.metadata["exit_code"], json!(6));
    }

    #[test]
    fn layer_name_serde_uses_kebab_case() {
        let json = serde_json::to_string(&LayerName::StateMachine).unwrap();
        assert_eq!(json, "\"state-machine\"");
        let json = serde_json::to_string(&FileType::TaskRegistry).unwrap();
        assert_eq!(json, "\"task-registry\"");
    }

    #[test]
    fn validation_error_optional_fields_omitted() {
        let err = ValidationError::new("SCHEMA_INVALID_TYPE", "wrong type");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("path"));
        assert!(!json.contains("details"));

        let err = err.with_path("/tasks/0/id").with_details(json!({"expected": "string"}));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("/tasks/0/id"));
    }
}
