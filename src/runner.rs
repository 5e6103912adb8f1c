use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};

use crate::exit_code::ExitCode;
use crate::schema_layer;
use crate::types::{
    detect_file_type, failure_result, FileType, LayerName, LayerResult, ValidationContext,
    ValidationError, ValidationWarning,
};
use crate::{referential, semantic, state_machine};

// --- Options ---

/// Knobs for a pipeline run.
#[derive(Clone, Debug)]
pub struct ValidationOptions {
    /// Halt at the first failing layer (default) or run everything and
    /// collect all findings.
    pub stop_on_first_error: bool,
    /// Restrict which layers run. The pipeline order is fixed; this can
    /// only skip layers, never re-order them.
    pub layers: Option<Vec<LayerName>>,
    /// Prior-run results to re-present to the layers, e.g. a previous
    /// state-machine snapshot.
    pub previous_results: Vec<LayerResult>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            stop_on_first_error: true,
            layers: None,
            previous_results: Vec::new(),
        }
    }
}

impl ValidationOptions {
    pub fn collect_all() -> Self {
        ValidationOptions {
            stop_on_first_error: false,
            ..Default::default()
        }
    }
}

// --- Results ---

/// Aggregate outcome of one pipeline run against one document.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineResult {
    pub valid: bool,
    pub exit_code: ExitCode,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub layer_results: Vec<LayerResult>,
}

impl PipelineResult {
    fn from_layers(layer_results: Vec<LayerResult>, exit_code: ExitCode) -> Self {
        let errors = layer_results
            .iter()
            .flat_map(|r| r.errors.iter().cloned())
            .collect();
        let warnings = layer_results
            .iter()
            .flat_map(|r| r.warnings.iter().cloned())
            .collect();
        PipelineResult {
            valid: exit_code.is_success(),
            exit_code,
            errors,
            warnings,
            layer_results,
        }
    }

    /// A run that never reached the layers (unknown file type).
    fn rejected(exit_code: ExitCode, error: ValidationError) -> Self {
        PipelineResult {
            valid: false,
            exit_code,
            errors: vec![error],
            warnings: Vec::new(),
            layer_results: Vec::new(),
        }
    }

    /// The state-machine snapshot this run produced, if the layer ran.
    pub fn previous_state(&self) -> Option<&Value> {
        self.layer_results
            .iter()
            .rev()
            .find_map(|r| r.metadata.get("previous_state"))
    }
}

/// Outcome of validating one file on disk.
#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub file_path: PathBuf,
    pub file_type: Option<FileType>,
    pub result: PipelineResult,
}

/// Outcome of validating a whole project tree.
#[derive(Clone, Debug, Serialize)]
pub struct ProjectReport {
    pub files: Vec<FileReport>,
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub files_validated: usize,
    pub exit_code: ExitCode,
}

// --- Pipeline ---

/// Run the validation layers in their fixed order.
///
/// Each layer receives `previous_results` built from the caller-supplied
/// context results, then the options-supplied prior-run results, then every
/// layer already run in this pipeline. The aggregate exit code is the first
/// failing layer's; with `stop_on_first_error` the pipeline halts there.
pub async fn run_validation(
    ctx: &ValidationContext,
    options: &ValidationOptions,
) -> PipelineResult {
    let mut layer_results: Vec<LayerResult> = Vec::new();
    let mut exit_code = ExitCode::Success;

    for layer in LayerName::ALL {
        if let Some(selected) = &options.layers {
            if !selected.contains(&layer) {
                continue;
            }
        }

        let mut layer_ctx = ctx.clone();
        layer_ctx
            .previous_results
            .extend(options.previous_results.iter().cloned());
        layer_ctx
            .previous_results
            .extend(layer_results.iter().cloned());

        let started = Instant::now();
        let mut result = run_layer(layer, layer_ctx).await;
        result.metadata.insert(
            "duration_ms".to_string(),
            (started.elapsed().as_millis() as u64).into(),
        );
        result.metadata.insert(
            "file_type".to_string(),
            Value::String(ctx.file_type.as_str().to_string()),
        );

        let failed = !result.valid;
        if failed && exit_code.is_success() {
            exit_code = layer.exit_code();
        }
        layer_results.push(result);

        if failed && options.stop_on_first_error {
            break;
        }
    }

    PipelineResult::from_layers(layer_results, exit_code)
}

/// Dispatch a single layer, isolating panics.
///
/// A panicking layer is reported as `<LAYER>_INTERNAL_ERROR` and the
/// pipeline keeps going; layers are otherwise total functions.
async fn run_layer(layer: LayerName, ctx: ValidationContext) -> LayerResult {
    let handle = tokio::spawn(async move {
        match layer {
            LayerName::Schema => schema_layer::run(&ctx).await,
            LayerName::Semantic => semantic::run(&ctx).await,
            LayerName::Referential => referential::run(&ctx).await,
            LayerName::StateMachine => state_machine::run(&ctx).await,
        }
    });

    match handle.await {
        Ok(result) => result,
        Err(join_error) => {
            let error = ValidationError::new(
                format!("{}_INTERNAL_ERROR", layer.code_prefix()),
                format!("{} layer failed unexpectedly", layer),
            )
            .with_details(json!({ "error": join_error.to_string() }));
            failure_result(layer, vec![error], Vec::new(), None)
        }
    }
}

/// Validate one file on disk.
///
/// Reads and parses the file, infers the file type from the path when the
/// caller does not supply one, and delegates to `run_validation`. Read and
/// parse failures surface as an injected schema-layer failure (exit code 5);
/// an undetectable file type is an argument error (exit code 2).
pub async fn run_validation_on_file(
    project_path: Option<&Path>,
    file_path: &Path,
    file_type: Option<FileType>,
    options: &ValidationOptions,
) -> FileReport {
    let Some(file_type) = file_type.or_else(|| detect_file_type(file_path)) else {
        let error = ValidationError::new(
            "RUNNER_UNKNOWN_FILE_TYPE",
            format!("Cannot determine file type for {}", file_path.display()),
        );
        return FileReport {
            file_path: file_path.to_path_buf(),
            file_type: None,
            result: PipelineResult::rejected(ExitCode::InvalidArguments, error),
        };
    };

    let raw = match fs::read_to_string(file_path) {
        Ok(raw) => raw,
        Err(e) => {
            let layer = schema_layer::file_read_failure(file_path, &e.to_string());
            return FileReport {
                file_path: file_path.to_path_buf(),
                file_type: Some(file_type),
                result: PipelineResult::from_layers(vec![layer], ExitCode::ValidationSchema),
            };
        }
    };

    let data: Value = match serde_json::from_str(&raw) {
        Ok(data) => data,
        Err(e) => {
            let layer = schema_layer::parse_failure(file_path, &e.to_string());
            return FileReport {
                file_path: file_path.to_path_buf(),
                file_type: Some(file_type),
                result: PipelineResult::from_layers(vec![layer], ExitCode::ValidationSchema),
            };
        }
    };

    let mut ctx = ValidationContext::new(file_type, data).with_file_path(file_path);
    if let Some(project_path) = project_path {
        ctx = ctx.with_project_path(project_path);
    }

    FileReport {
        file_path: file_path.to_path_buf(),
        file_type: Some(file_type),
        result: run_validation(&ctx, options).await,
    }
}

/// Validate every planning artifact under a project root.
///
/// Order is fixed: `.planning/STATE.json`, `.planning/TASKS.json`, then the
/// plans directory sorted by name. Absent files are skipped silently; the
/// aggregate exit code is the first failure in that ordering.
pub async fn run_project_validation(
    project_path: &Path,
    options: &ValidationOptions,
) -> ProjectReport {
    let planning = project_path.join(".planning");
    let mut files = Vec::new();

    let state_path = planning.join("STATE.json");
    if state_path.is_file() {
        files.push(
            run_validation_on_file(Some(project_path), &state_path, Some(FileType::State), options)
                .await,
        );
    }

    let tasks_path = planning.join("TASKS.json");
    if tasks_path.is_file() {
        files.push(
            run_validation_on_file(
                Some(project_path),
                &tasks_path,
                Some(FileType::TaskRegistry),
                options,
            )
            .await,
        );
    }

    for plan_path in plan_files(&planning.join("plans")) {
        files.push(
            run_validation_on_file(Some(project_path), &plan_path, Some(FileType::Plan), options)
                .await,
        );
    }

    let exit_code = files
        .iter()
        .find(|report| !report.result.valid)
        .map(|report| report.result.exit_code)
        .unwrap_or(ExitCode::Success);

    ProjectReport {
        valid: exit_code.is_success(),
        error_count: files.iter().map(|r| r.result.errors.len()).sum(),
        warning_count: files.iter().map(|r| r.result.warnings.len()).sum(),
        files_validated: files.len(),
        exit_code,
        files,
    }
}

/// JSON plan files in the plans directory, sorted by name. A missing or
/// unreadable directory simply yields nothing.
fn plan_files(plans_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(plans_dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name.contains(".plan") && name.ends_with(".json")
        })
        .collect();
    paths.sort();
    paths
}

/// Validate several files in parallel; the result order matches the input
/// order. Validation never mutates the documents, so the fan-out is safe by
/// construction.
pub async fn run_validation_on_files(
    files: &[PathBuf],
    project_path: Option<&Path>,
    options: &ValidationOptions,
) -> Vec<FileReport> {
    let mut handles = Vec::with_capacity(files.len());
    for file_path in files {
        let file_path = file_path.clone();
        let project_path = project_path.map(Path::to_path_buf);
        let options = options.clone();
        handles.push(tokio::spawn(async move {
            run_validation_on_file(project_path.as_deref(), &file_path, None, &options).await
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (handle, file_path) in handles.into_iter().zip(files) {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(join_error) => {
                let error = ValidationError::new(
                    "RUNNER_INTERNAL_ERROR",
                    format!("Validation of {} failed unexpectedly", file_path.display()),
                )
                .with_details(json!({ "error": join_error.to_string() }));
                reports.push(FileReport {
                    file_path: file_path.clone(),
                    file_type: detect_file_type(file_path),
                    result: PipelineResult::rejected(ExitCode::GeneralError, error),
                });
            }
        }
    }
    reports
}
