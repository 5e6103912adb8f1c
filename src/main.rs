use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use plan_warden::audit;
use plan_warden::config::{self, WardenConfig};
use plan_warden::exit_code::ExitCode;
use plan_warden::hooks::{self, HookOptions};
use plan_warden::log::LogLevel;
use plan_warden::runner::{
    run_project_validation, run_validation_on_file, FileReport, ValidationOptions,
};
use plan_warden::types::parse_file_type;
use plan_warden::{log_error, log_info, log_warn};

#[derive(Parser)]
#[command(name = "plan-warden", about = "Planning artifact validator")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to config file (defaults to {root}/plan-warden.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity level; overrides the config file when given
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a single planning artifact
    Validate {
        /// File to validate
        file: PathBuf,
        /// Override file-type detection (state, plan, task-registry)
        #[arg(long)]
        file_type: Option<String>,
        /// Run all layers and collect every finding instead of stopping
        /// at the first failing layer
        #[arg(long)]
        collect_all: bool,
        /// Skip the audit log entry for this run
        #[arg(long)]
        no_audit: bool,
    },
    /// Validate every planning artifact under the project root
    Project {
        #[arg(long)]
        collect_all: bool,
        #[arg(long)]
        no_audit: bool,
    },
    /// Check whether a task status change is legal
    Transition {
        task_id: String,
        from: String,
        to: String,
    },
    /// Validate a file that is required to exist
    Exists { file: PathBuf },
    /// Show recent audit log entries
    Audit {
        /// Only the most recent N entries
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(&cli.root),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log_error!("Error: {}", e);
            std::process::exit(e.exit_code().code() as i32);
        }
    };

    if let Err(problems) = config::validate(&config) {
        for problem in &problems {
            log_error!("Config error: {}", problem);
        }
        std::process::exit(ExitCode::InvalidArguments.code() as i32);
    }

    cli.log_level
        .or_else(|| config.log.level.parse().ok())
        .unwrap_or(LogLevel::Info)
        .install();

    let exit = match cli.command {
        Commands::Validate {
            file,
            file_type,
            collect_all,
            no_audit,
        } => handle_validate(&cli.root, &config, &file, file_type, collect_all, no_audit).await,
        Commands::Project {
            collect_all,
            no_audit,
        } => handle_project(&cli.root, &config, collect_all, no_audit).await,
        Commands::Transition { task_id, from, to } => {
            handle_transition(&cli.root, &config, &task_id, &from, &to).await
        }
        Commands::Exists { file } => handle_exists(&cli.root, &config, &file).await,
        Commands::Audit { limit } => handle_audit(&cli.root, limit),
    };

    std::process::exit(exit.code() as i32);
}

fn options_for(config: &WardenConfig, collect_all: bool) -> ValidationOptions {
    ValidationOptions {
        stop_on_first_error: !collect_all && config.validation.stop_on_first_error,
        ..Default::default()
    }
}

fn report_file(report: &FileReport) {
    let path = report.file_path.display();
    for warning in &report.result.warnings {
        log_warn!("warning {}: {} ({})", warning.code, warning.message, path);
    }
    if report.result.valid {
        log_info!(
            "ok {} [{} layer(s), {} warning(s)]",
            path,
            report.result.layer_results.len(),
            report.result.warnings.len()
        );
    } else {
        for error in &report.result.errors {
            match &error.path {
                Some(pointer) => {
                    log_error!("error {}: {} (at {})", error.code, error.message, pointer)
                }
                None => log_error!("error {}: {}", error.code, error.message),
            }
        }
        log_error!("failed {} with exit code {}", path, report.result.exit_code);
    }
}

fn record_outcome(root: &Path, config: &WardenConfig, enabled: bool, passed: bool, exit_code: ExitCode, message: &str) {
    if !enabled || !config.audit.enabled {
        return;
    }
    if let Err(e) = audit::audit_validation(root, &config.audit.agent, passed, exit_code, message) {
        log_warn!("Failed to record audit entry: {}", e);
    }
}

async fn handle_validate(
    root: &Path,
    config: &WardenConfig,
    file: &Path,
    file_type: Option<String>,
    collect_all: bool,
    no_audit: bool,
) -> ExitCode {
    let file_type = match file_type.as_deref().map(parse_file_type) {
        Some(Ok(ft)) => Some(ft),
        Some(Err(message)) => {
            log_error!("Error: {}", message);
            return ExitCode::InvalidArguments;
        }
        None => None,
    };

    let options = options_for(config, collect_all);
    let report = run_validation_on_file(Some(root), file, file_type, &options).await;
    report_file(&report);

    record_outcome(
        root,
        config,
        !no_audit,
        report.result.valid,
        report.result.exit_code,
        &format!("validate {}", file.display()),
    );
    report.result.exit_code
}

async fn handle_project(
    root: &Path,
    config: &WardenConfig,
    collect_all: bool,
    no_audit: bool,
) -> ExitCode {
    let options = options_for(config, collect_all);
    let report = run_project_validation(root, &options).await;

    for file in &report.files {
        report_file(file);
    }
    log_info!(
        "{}: {} file(s), {} error(s), {} warning(s)",
        if report.valid { "valid" } else { "invalid" },
        report.files_validated,
        report.error_count,
        report.warning_count
    );

    record_outcome(
        root,
        config,
        !no_audit,
        report.valid,
        report.exit_code,
        "validate project",
    );
    report.exit_code
}

async fn handle_transition(
    root: &Path,
    config: &WardenConfig,
    task_id: &str,
    from: &str,
    to: &str,
) -> ExitCode {
    let options = HookOptions::new(root)
        .with_agent(&config.audit.agent)
        .with_audit(config.audit.enabled);

    match hooks::validate_task_state_change(task_id, from, to, &options).await {
        Ok(result) => {
            if result.valid {
                log_info!("ok {}: {} -> {}", task_id, from, to);
            } else {
                for error in &result.errors {
                    log_error!("error {}: {}", error.code, error.message);
                }
            }
            result.exit_code
        }
        Err(e) => {
            log_error!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn handle_exists(root: &Path, config: &WardenConfig, file: &Path) -> ExitCode {
    let options = HookOptions::new(root)
        .with_agent(&config.audit.agent)
        .with_audit(config.audit.enabled)
        .with_stop_on_first_error(config.validation.hooks_stop_on_first_error);

    match hooks::validate_file_exists(file, &options).await {
        Ok(result) => {
            if result.valid {
                log_info!("ok {}", file.display());
            } else {
                for error in &result.errors {
                    log_error!("error {}: {}", error.code, error.message);
                }
            }
            result.exit_code
        }
        Err(e) => {
            log_error!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn handle_audit(root: &Path, limit: Option<usize>) -> ExitCode {
    let entries = match audit::read_audit_log(root) {
        Ok(entries) => entries,
        Err(e) => {
            log_error!("Error: {}", e);
            return e.exit_code();
        }
    };

    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in &entries[skip..] {
        match serde_json::to_string(entry) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                log_error!("Error: {}", e);
                return ExitCode::GeneralError;
            }
        }
    }
    ExitCode::Success
}
