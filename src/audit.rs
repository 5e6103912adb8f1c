use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WardenError;
use crate::exit_code::ExitCode;

pub const AUDIT_LOG_FILE: &str = "AUDIT.jsonl";

/// Closed set of recordable actions.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TaskCreated,
    TaskStarted,
    TaskCompleted,
    TaskBlocked,
    StateChanged,
    ValidationPassed,
    ValidationFailed,
    AgentStarted,
    AgentCompleted,
    ErrorOccurred,
    CheckpointReached,
    DecisionMade,
}

/// One line of the audit log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuditEntry {
    pub timestamp: String,
    pub agent: String,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AuditEntry {
    /// A new entry stamped with the current UTC time.
    pub fn new(agent: &str, action: AuditAction) -> Self {
        AuditEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            agent: agent.to_string(),
            action,
            task_id: None,
            exit_code: None,
            before: None,
            after: None,
            message: None,
            metadata: None,
        }
    }

    pub fn with_task_id(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn with_exit_code(mut self, exit_code: ExitCode) -> Self {
        self.exit_code = Some(exit_code.code());
        self
    }

    pub fn with_before(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: Value) -> Self {
        self.after = Some(after);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Path of the audit log under a project root.
pub fn audit_log_path(project_path: &Path) -> PathBuf {
    project_path.join(".planning").join(AUDIT_LOG_FILE)
}

/// Create the audit log (and `.planning/`) if missing. Returns its path.
pub fn init_audit_log(project_path: &Path) -> Result<PathBuf, WardenError> {
    let path = audit_log_path(project_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WardenError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|e| WardenError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
    Ok(path)
}

/// Append one entry as one complete line.
///
/// Existing lines are never touched; a single `write_all` per entry keeps
/// concurrent appends line-atomic at OS granularity.
pub fn append_audit_entry(project_path: &Path, entry: &AuditEntry) -> Result<(), WardenError> {
    let path = init_audit_log(project_path)?;

    let mut line = serde_json::to_string(entry).map_err(|e| WardenError::Parse {
        path: path.clone(),
        source: e,
    })?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|e| WardenError::FileWrite {
            path: path.clone(),
            source: e,
        })?;

    file.write_all(line.as_bytes())
        .map_err(|e| WardenError::FileWrite { path, source: e })
}

/// All entries, oldest first. An absent log is an empty log.
pub fn read_audit_log(project_path: &Path) -> Result<Vec<AuditEntry>, WardenError> {
    let path = audit_log_path(project_path);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(WardenError::FileRead { path, source: e }),
    };

    let mut entries = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: AuditEntry =
            serde_json::from_str(line).map_err(|e| WardenError::AuditCorrupt {
                path: path.clone(),
                line: i + 1,
                source: e,
            })?;
        entries.push(entry);
    }
    Ok(entries)
}

// --- Convenience recorders ---

pub fn audit_task_created(
    project_path: &Path,
    agent: &str,
    task_id: &str,
) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::TaskCreated).with_task_id(task_id),
    )
}

pub fn audit_task_start(
    project_path: &Path,
    agent: &str,
    task_id: &str,
) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::TaskStarted).with_task_id(task_id),
    )
}

pub fn audit_task_complete(
    project_path: &Path,
    agent: &str,
    task_id: &str,
) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::TaskCompleted).with_task_id(task_id),
    )
}

pub fn audit_task_blocked(
    project_path: &Path,
    agent: &str,
    task_id: &str,
    reason: &str,
) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::TaskBlocked)
            .with_task_id(task_id)
            .with_message(reason),
    )
}

pub fn audit_state_change(
    project_path: &Path,
    agent: &str,
    task_id: Option<&str>,
    before: Value,
    after: Value,
) -> Result<(), WardenError> {
    let mut entry = AuditEntry::new(agent, AuditAction::StateChanged)
        .with_before(before)
        .with_after(after);
    if let Some(task_id) = task_id {
        entry = entry.with_task_id(task_id);
    }
    append_audit_entry(project_path, &entry)
}

/// Record a validation outcome as `validation_passed` or `validation_failed`.
pub fn audit_validation(
    project_path: &Path,
    agent: &str,
    passed: bool,
    exit_code: ExitCode,
    message: &str,
) -> Result<(), WardenError> {
    let action = if passed {
        AuditAction::ValidationPassed
    } else {
        AuditAction::ValidationFailed
    };
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, action)
            .with_exit_code(exit_code)
            .with_message(message),
    )
}

pub fn audit_agent_started(project_path: &Path, agent: &str) -> Result<(), WardenError> {
    append_audit_entry(project_path, &AuditEntry::new(agent, AuditAction::AgentStarted))
}

pub fn audit_agent_completed(project_path: &Path, agent: &str) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::AgentCompleted),
    )
}

pub fn audit_error(project_path: &Path, agent: &str, message: &str) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::ErrorOccurred).with_message(message),
    )
}

pub fn audit_checkpoint(
    project_path: &Path,
    agent: &str,
    message: &str,
) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::CheckpointReached).with_message(message),
    )
}

pub fn audit_decision(
    project_path: &Path,
    agent: &str,
    decision: &str,
) -> Result<(), WardenError> {
    append_audit_entry(
        project_path,
        &AuditEntry::new(agent, AuditAction::DecisionMade).with_message(decision),
    )
}
