use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::ValidationError;

// --- Task statuses ---

/// Lifecycle of a task in the registry.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Blocked,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
        }
    }

    /// Allowed next statuses. An empty slice marks a terminal status.
    pub fn next_states(&self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::Pending => &[TaskStatus::InProgress, TaskStatus::Blocked],
            TaskStatus::InProgress => &[TaskStatus::Completed, TaskStatus::Blocked],
            TaskStatus::Blocked => &[TaskStatus::Pending, TaskStatus::InProgress],
            TaskStatus::Completed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    /// Same-status transitions are always allowed.
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        *self == to || self.next_states().contains(&to)
    }
}

pub fn parse_task_status(s: &str) -> Result<TaskStatus, String> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" => Ok(TaskStatus::InProgress),
        "blocked" => Ok(TaskStatus::Blocked),
        "completed" => Ok(TaskStatus::Completed),
        _ => Err(format!(
            "Invalid task status '{}': expected pending, in_progress, blocked, or completed",
            s
        )),
    }
}

/// Pure transition check over the task status table.
///
/// Returns `None` for a legal transition (including a same-status no-op),
/// or the error a caller should report, carrying the allowed next set.
pub fn validate_status_transition(from: TaskStatus, to: TaskStatus) -> Option<ValidationError> {
    if from.can_transition_to(to) {
        return None;
    }
    let allowed: Vec<&str> = from.next_states().iter().map(TaskStatus::as_str).collect();
    Some(
        ValidationError::new(
            "SEMANTIC_INVALID_STATUS_TRANSITION",
            format!(
                "Invalid task status transition: {} -> {}",
                from.as_str(),
                to.as_str()
            ),
        )
        .with_details(json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "allowedTransitions": allowed,
        })),
    )
}

// --- Phase statuses (state documents) ---

/// Status of the project's current position in a state document.
///
/// `"Ready to start"` is a legacy literal that still appears in older state
/// documents; it is part of the recognised set.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Planning,
    Executing,
    Verifying,
    Complete,
    Blocked,
    #[serde(rename = "Ready to start")]
    ReadyToStart,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Planning => "planning",
            PhaseStatus::Executing => "executing",
            PhaseStatus::Verifying => "verifying",
            PhaseStatus::Complete => "complete",
            PhaseStatus::Blocked => "blocked",
            PhaseStatus::ReadyToStart => "Ready to start",
        }
    }

    pub fn next_states(&self) -> &'static [PhaseStatus] {
        match self {
            PhaseStatus::Planning => &[PhaseStatus::Executing],
            PhaseStatus::Executing => &[PhaseStatus::Verifying],
            PhaseStatus::Verifying => &[PhaseStatus::Complete, PhaseStatus::Executing],
            PhaseStatus::Complete => &[],
            PhaseStatus::Blocked => &[PhaseStatus::Planning, PhaseStatus::Executing],
            PhaseStatus::ReadyToStart => &[PhaseStatus::Planning, PhaseStatus::Executing],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    pub fn can_transition_to(&self, to: PhaseStatus) -> bool {
        *self == to || self.next_states().contains(&to)
    }
}

pub fn parse_phase_status(s: &str) -> Result<PhaseStatus, String> {
    match s {
        "planning" => Ok(PhaseStatus::Planning),
        "executing" => Ok(PhaseStatus::Executing),
        "verifying" => Ok(PhaseStatus::Verifying),
        "complete" => Ok(PhaseStatus::Complete),
        "blocked" => Ok(PhaseStatus::Blocked),
        "Ready to start" => Ok(PhaseStatus::ReadyToStart),
        _ => Err(format!(
            "Invalid phase status '{}': expected planning, executing, verifying, complete, blocked, or 'Ready to start'",
            s
        )),
    }
}

// --- Plan statuses ---

/// Lifecycle of a plan document. Unlike tasks, a blocked plan may only
/// resume in progress, never fall back to pending.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Blocked => "blocked",
            PlanStatus::Completed => "completed",
        }
    }

    pub fn next_states(&self) -> &'static [PlanStatus] {
        match self {
            PlanStatus::Pending => &[PlanStatus::InProgress],
            PlanStatus::InProgress => &[PlanStatus::Completed, PlanStatus::Blocked],
            PlanStatus::Blocked => &[PlanStatus::InProgress],
            PlanStatus::Completed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    pub fn can_transition_to(&self, to: PlanStatus) -> bool {
        *self == to || self.next_states().contains(&to)
    }
}

pub fn parse_plan_status(s: &str) -> Result<PlanStatus, String> {
    match s {
        "pending" => Ok(PlanStatus::Pending),
        "in_progress" => Ok(PlanStatus::InProgress),
        "blocked" => Ok(PlanStatus::Blocked),
        "completed" => Ok(PlanStatus::Completed),
        _ => Err(format!(
            "Invalid plan status '{}': expected pending, in_progress, blocked, or completed",
            s
        )),
    }
}

// --- Priorities ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

pub fn parse_priority(s: &str) -> Result<Priority, String> {
    match s {
        "critical" => Ok(Priority::Critical),
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        _ => Err(format!(
            "Invalid priority '{}': expected critical, high, medium, or low",
            s
        )),
    }
}
