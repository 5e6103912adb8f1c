use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use crate::audit;
use crate::error::WardenError;
use crate::exit_code::ExitCode;
use crate::log_warn;
use crate::runner::{
    run_project_validation, run_validation, run_validation_on_file, PipelineResult, ProjectReport,
    ValidationOptions,
};
use crate::status::{parse_task_status, validate_status_transition};
use crate::types::{
    detect_file_type, ValidationContext, ValidationError, ValidationWarning,
};

// --- Options ---

/// Caller-facing knobs shared by every hook.
#[derive(Clone, Debug)]
pub struct HookOptions {
    pub project_path: PathBuf,
    /// Recorded as the acting agent in audit entries.
    pub agent: String,
    /// Record validation outcomes in the audit log.
    pub audit: bool,
    /// Raise `WardenError::Validation` instead of returning an invalid result.
    pub throw_on_error: bool,
    /// Hooks default to collect-all so callers see every layer's findings;
    /// the low-level runner default is the opposite.
    pub stop_on_first_error: bool,
}

impl HookOptions {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        HookOptions {
            project_path: project_path.into(),
            agent: "system".to_string(),
            audit: true,
            throw_on_error: false,
            stop_on_first_error: false,
        }
    }

    pub fn with_agent(mut self, agent: &str) -> Self {
        self.agent = agent.to_string();
        self
    }

    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.throw_on_error = throw_on_error;
        self
    }

    pub fn with_stop_on_first_error(mut self, stop_on_first_error: bool) -> Self {
        self.stop_on_first_error = stop_on_first_error;
        self
    }

    fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            stop_on_first_error: self.stop_on_first_error,
            ..Default::default()
        }
    }
}

// --- Results ---

/// Uniform result shape every hook returns.
#[derive(Clone, Debug, Serialize)]
pub struct HookValidationResult {
    pub valid: bool,
    pub exit_code: ExitCode,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HookValidationResult {
    fn from_pipeline(result: PipelineResult) -> Self {
        HookValidationResult {
            valid: result.valid,
            exit_code: result.exit_code,
            errors: result.errors,
            warnings: result.warnings,
            details: None,
        }
    }

    fn from_project(report: &ProjectReport) -> Self {
        HookValidationResult {
            valid: report.valid,
            exit_code: report.exit_code,
            errors: report
                .files
                .iter()
                .flat_map(|f| f.result.errors.iter().cloned())
                .collect(),
            warnings: report
                .files
                .iter()
                .flat_map(|f| f.result.warnings.iter().cloned())
                .collect(),
            details: Some(json!({
                "files_validated": report.files_validated,
                "error_count": report.error_count,
                "warning_count": report.warning_count,
            })),
        }
    }

    fn rejected(exit_code: ExitCode, error: ValidationError) -> Self {
        HookValidationResult {
            valid: false,
            exit_code,
            errors: vec![error],
            warnings: Vec::new(),
            details: None,
        }
    }
}

/// Record the outcome and apply `throw_on_error`.
///
/// Audit failures are logged, not raised: an unlogged validation is still a
/// validation.
fn finalize(
    result: HookValidationResult,
    options: &HookOptions,
    context: &str,
) -> Result<HookValidationResult, WardenError> {
    if options.audit {
        if let Err(e) = audit::audit_validation(
            &options.project_path,
            &options.agent,
            result.valid,
            result.exit_code,
            context,
        ) {
            log_warn!("[hooks] Failed to record audit entry: {}", e);
        }
    }
    if !result.valid && options.throw_on_error {
        return Err(WardenError::Validation {
            exit_code: result.exit_code,
            errors: result.errors,
        });
    }
    Ok(result)
}

// --- Hooks ---

/// Validate proposed document data before it is written.
pub async fn before_mutation(
    file_path: &Path,
    new_data: &Value,
    options: &HookOptions,
) -> Result<HookValidationResult, WardenError> {
    let context = format!("before_mutation {}", file_path.display());

    let Some(file_type) = detect_file_type(file_path) else {
        let error = ValidationError::new(
            "RUNNER_UNKNOWN_FILE_TYPE",
            format!("Cannot determine file type for {}", file_path.display()),
        );
        let result = HookValidationResult::rejected(ExitCode::InvalidArguments, error);
        return finalize(result, options, &context);
    };

    let ctx = ValidationContext::new(file_type, new_data.clone())
        .with_project_path(&options.project_path)
        .with_file_path(file_path);
    let pipeline = run_validation(&ctx, &options.validation_options()).await;
    finalize(HookValidationResult::from_pipeline(pipeline), options, &context)
}

/// Validate the on-disk file after a write.
pub async fn after_mutation(
    file_path: &Path,
    options: &HookOptions,
) -> Result<HookValidationResult, WardenError> {
    let context = format!("after_mutation {}", file_path.display());
    let report = run_validation_on_file(
        Some(&options.project_path),
        file_path,
        None,
        &options.validation_options(),
    )
    .await;
    finalize(HookValidationResult::from_pipeline(report.result), options, &context)
}

/// Validate the whole project tree.
pub async fn validate_project_hook(
    options: &HookOptions,
) -> Result<HookValidationResult, WardenError> {
    let report = run_project_validation(&options.project_path, &options.validation_options()).await;
    finalize(
        HookValidationResult::from_project(&report),
        options,
        "validate_project",
    )
}

/// Pure task-transition guard over the status table.
///
/// A legal change is recorded as a `state_changed` audit entry; an illegal
/// or unrecognised one fails with the semantic exit code.
pub async fn validate_task_state_change(
    task_id: &str,
    from: &str,
    to: &str,
    options: &HookOptions,
) -> Result<HookValidationResult, WardenError> {
    let result = match (parse_task_status(from), parse_task_status(to)) {
        (Ok(from), Ok(to)) => match validate_status_transition(from, to) {
            None => HookValidationResult {
                valid: true,
                exit_code: ExitCode::Success,
                errors: Vec::new(),
                warnings: Vec::new(),
                details: None,
            },
            Some(error) => {
                HookValidationResult::rejected(ExitCode::ValidationSemantic, error)
            }
        },
        (Err(message), _) | (_, Err(message)) => HookValidationResult::rejected(
            ExitCode::ValidationSemantic,
            ValidationError::new("SEMANTIC_UNKNOWN_STATUS", message),
        ),
    };

    if result.valid && options.audit {
        if let Err(e) = audit::audit_state_change(
            &options.project_path,
            &options.agent,
            Some(task_id),
            json!(from),
            json!(to),
        ) {
            log_warn!("[hooks] Failed to record audit entry: {}", e);
        }
    }

    if !result.valid && options.throw_on_error {
        return Err(WardenError::Validation {
            exit_code: result.exit_code,
            errors: result.errors,
        });
    }
    Ok(result)
}

/// Run a command, then post-validate the project.
pub async fn with_validation<T, F, Fut>(
    command: F,
    options: &HookOptions,
) -> Result<(T, HookValidationResult), WardenError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, WardenError>>,
{
    let output = command().await?;
    let result = validate_project_hook(options).await?;
    Ok((output, result))
}

/// Pre-validate a mutation's output, write it atomically, post-validate the
/// written file.
///
/// Invalid proposed data is never written. With `throw_on_error` either
/// failing validation aborts the call; otherwise the first invalid result is
/// returned for the caller to inspect.
pub async fn with_mutation_validation<F, Fut>(
    mutation: F,
    file_path: &Path,
    options: &HookOptions,
) -> Result<HookValidationResult, WardenError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, WardenError>>,
{
    let new_data = mutation().await?;

    let pre = before_mutation(file_path, &new_data, options).await?;
    if !pre.valid {
        return Ok(pre);
    }

    write_document(file_path, &new_data)?;

    after_mutation(file_path, options).await
}

/// Existence check: exit 11 when the file is absent, otherwise a normal
/// post-mutation validation.
pub async fn validate_file_exists(
    file_path: &Path,
    options: &HookOptions,
) -> Result<HookValidationResult, WardenError> {
    if !file_path.is_file() {
        let error = ValidationError::new(
            "HOOK_FILE_NOT_FOUND",
            format!("{} does not exist", file_path.display()),
        );
        let result = HookValidationResult::rejected(ExitCode::ResourceNotFound, error);
        let context = format!("validate_file_exists {}", file_path.display());
        return finalize(result, options, &context);
    }
    after_mutation(file_path, options).await
}

// --- Checkpoints ---

/// Project validation state captured at a point in time.
#[derive(Debug)]
pub struct ValidationCheckpoint {
    pub timestamp: String,
    pub initial: ProjectReport,
    options: HookOptions,
}

/// Outcome of re-validating against a checkpoint.
#[derive(Debug, Serialize)]
pub struct CheckpointVerification {
    pub valid: bool,
    pub changed: bool,
    pub current: ProjectReport,
}

/// Capture the project's current validation state for later comparison.
pub async fn create_validation_checkpoint(
    options: &HookOptions,
) -> Result<ValidationCheckpoint, WardenError> {
    let initial = run_project_validation(&options.project_path, &options.validation_options()).await;

    if options.audit {
        if let Err(e) = audit::audit_checkpoint(
            &options.project_path,
            &options.agent,
            &format!(
                "checkpoint: {} file(s), {} error(s)",
                initial.files_validated, initial.error_count
            ),
        ) {
            log_warn!("[hooks] Failed to record audit entry: {}", e);
        }
    }

    Ok(ValidationCheckpoint {
        timestamp: chrono::Utc::now().to_rfc3339(),
        initial,
        options: options.clone(),
    })
}

impl ValidationCheckpoint {
    /// Re-run project validation and compare against the captured state.
    ///
    /// `changed` is true iff validity, error count, warning count, or the
    /// number of files validated differ from the checkpoint.
    pub async fn verify(&self) -> Result<CheckpointVerification, WardenError> {
        let current =
            run_project_validation(&self.options.project_path, &self.options.validation_options())
                .await;
        let changed = current.valid != self.initial.valid
            || current.error_count != self.initial.error_count
            || current.warning_count != self.initial.warning_count
            || current.files_validated != self.initial.files_validated;
        Ok(CheckpointVerification {
            valid: current.valid,
            changed,
            current,
        })
    }
}

/// Atomic document write: temp file in the target directory, sync, rename.
/// The file on disk is always either the old version or the new one.
fn write_document(file_path: &Path, data: &Value) -> Result<(), WardenError> {
    let parent = file_path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| WardenError::FileWrite {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let mut json = serde_json::to_string_pretty(data).map_err(|e| WardenError::Parse {
        path: file_path.to_path_buf(),
        source: e,
    })?;
    json.push('\n');

    let temp_file = NamedTempFile::new_in(parent).map_err(|e| WardenError::FileWrite {
        path: parent.to_path_buf(),
        source: e,
    })?;

    fs::write(temp_file.path(), &json).map_err(|e| WardenError::FileWrite {
        path: temp_file.path().to_path_buf(),
        source: e,
    })?;

    let file = fs::File::open(temp_file.path()).map_err(|e| WardenError::FileWrite {
        path: temp_file.path().to_path_buf(),
        source: e,
    })?;
    file.sync_all().map_err(|e| WardenError::FileWrite {
        path: temp_file.path().to_path_buf(),
        source: e,
    })?;

    temp_file
        .persist(file_path)
        .map_err(|e| WardenError::FileWrite {
            path: file_path.to_path_buf(),
            source: e.error,
        })?;

    Ok(())
}
