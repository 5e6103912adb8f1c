use serde_json::{json, Map, Value};

use crate::status::{parse_phase_status, parse_task_status, PhaseStatus, TaskStatus};
use crate::types::{
    failure_result, success_result, FileType, LayerName, LayerResult, ValidationContext,
    ValidationError, ValidationWarning,
};

/// Layer 4: status transitions over time.
///
/// Transition tables live in `status`; this layer applies them to the
/// document at hand, comparing against prior state when a caller re-presents
/// the snapshot a previous run emitted. Every run ends by synthesising a
/// fresh `previous_state` snapshot into its result metadata.
pub async fn run(ctx: &ValidationContext) -> LayerResult {
    match ctx.file_type {
        FileType::State => {
            let (errors, warnings, snapshot) = check_state(&ctx.data, &ctx.previous_results);
            finish(errors, warnings, snapshot)
        }
        FileType::TaskRegistry => {
            let (errors, warnings, snapshot) = check_registry(&ctx.data, &ctx.previous_results);
            finish(errors, warnings, snapshot)
        }
        // Plans carry no state machine of their own.
        FileType::Plan => success_result(LayerName::StateMachine, None),
    }
}

fn finish(
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
    snapshot: Value,
) -> LayerResult {
    let mut metadata = Map::new();
    metadata.insert("previous_state".to_string(), snapshot);
    failure_result(LayerName::StateMachine, errors, warnings, Some(metadata))
}

/// The most recent snapshot an earlier result carries, if any.
fn prior_snapshot(previous_results: &[LayerResult]) -> Option<&Value> {
    previous_results
        .iter()
        .rev()
        .find_map(|result| result.metadata.get("previous_state"))
}

fn check_state(
    data: &Value,
    previous_results: &[LayerResult],
) -> (Vec<ValidationError>, Vec<ValidationWarning>, Value) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let raw_status = data
        .pointer("/current_position/status")
        .and_then(Value::as_str);

    let snapshot = json!({ "phase_status": raw_status });

    let Some(raw_status) = raw_status else {
        return (errors, warnings, snapshot);
    };

    let current = match parse_phase_status(raw_status) {
        Ok(status) => status,
        Err(message) => {
            errors.push(
                ValidationError::new("STATE_MACHINE_UNKNOWN_STATUS", message)
                    .with_path("/current_position/status"),
            );
            return (errors, warnings, snapshot);
        }
    };

    if current.is_terminal() {
        warnings.push(
            ValidationWarning::new(
                "STATE_MACHINE_TERMINAL_STATE",
                format!("Status '{}' is terminal; no further transitions are possible", raw_status),
            )
            .with_path("/current_position/status"),
        );
    }

    // The document's own previous_status wins over a prior-run snapshot.
    let previous = data
        .get("previous_status")
        .and_then(Value::as_str)
        .or_else(|| {
            prior_snapshot(previous_results)
                .and_then(|snap| snap.get("phase_status"))
                .and_then(Value::as_str)
        });

    if let Some(previous) = previous {
        if let Ok(from) = parse_phase_status(previous) {
            if let Some(error) = phase_transition_error(from, current) {
                errors.push(error);
            }
        }
    }

    (errors, warnings, snapshot)
}

fn phase_transition_error(from: PhaseStatus, to: PhaseStatus) -> Option<ValidationError> {
    if from.can_transition_to(to) {
        return None;
    }
    let allowed: Vec<&str> = from.next_states().iter().map(PhaseStatus::as_str).collect();
    Some(
        ValidationError::new(
            "STATE_MACHINE_INVALID_PHASE_TRANSITION",
            format!(
                "Invalid phase transition: {} -> {}",
                from.as_str(),
                to.as_str()
            ),
        )
        .with_path("/current_position/status")
        .with_details(json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "allowedTransitions": allowed,
        })),
    )
}

fn check_registry(
    data: &Value,
    previous_results: &[LayerResult],
) -> (Vec<ValidationError>, Vec<ValidationWarning>, Value) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let tasks: &[Value] = data
        .get("tasks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    // id -> raw status, in declaration order, for dependency and snapshot use.
    let mut statuses: Map<String, Value> = Map::new();
    for task in tasks {
        if let (Some(id), Some(status)) = (
            task.get("id").and_then(Value::as_str),
            task.get("status").and_then(Value::as_str),
        ) {
            statuses.insert(id.to_string(), Value::String(status.to_string()));
        }
    }

    for (i, task) in tasks.iter().enumerate() {
        let Some(id) = task.get("id").and_then(Value::as_str) else {
            continue;
        };
        let Some(raw_status) = task.get("status").and_then(Value::as_str) else {
            continue;
        };
        let status = match parse_task_status(raw_status) {
            Ok(status) => status,
            Err(message) => {
                errors.push(
                    ValidationError::new("STATE_MACHINE_UNKNOWN_STATUS", message)
                        .with_path(format!("/tasks/{}/status", i)),
                );
                continue;
            }
        };

        let incomplete_deps: Vec<&str> = task
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(Value::as_str)
                    .filter(|dep| {
                        statuses.get(*dep).and_then(Value::as_str) != Some("completed")
                    })
                    .collect()
            })
            .unwrap_or_default();

        match status {
            TaskStatus::Completed if !incomplete_deps.is_empty() => {
                errors.push(
                    ValidationError::new(
                        "STATE_MACHINE_COMPLETED_WITH_PENDING_DEPS",
                        format!(
                            "Task {} is completed but depends on incomplete tasks: {}",
                            id,
                            incomplete_deps.join(", ")
                        ),
                    )
                    .with_path(format!("/tasks/{}/status", i))
                    .with_details(json!({
                        "taskId": id,
                        "pendingDependencies": incomplete_deps,
                    })),
                );
            }
            TaskStatus::InProgress if !incomplete_deps.is_empty() => {
                warnings.push(
                    ValidationWarning::new(
                        "STATE_MACHINE_SHOULD_BE_BLOCKED",
                        format!(
                            "Task {} is in progress with incomplete dependencies: {}",
                            id,
                            incomplete_deps.join(", ")
                        ),
                    )
                    .with_path(format!("/tasks/{}/status", i))
                    .with_details(json!({
                        "taskId": id,
                        "pendingDependencies": incomplete_deps,
                    })),
                );
            }
            TaskStatus::Blocked => {
                if task.get("blocked_by").and_then(Value::as_str).is_none() {
                    warnings.push(
                        ValidationWarning::new(
                            "STATE_MACHINE_BLOCKED_NO_REASON",
                            format!("Task {} is blocked without a blocked_by reason", id),
                        )
                        .with_path(format!("/tasks/{}/blocked_by", i)),
                    );
                }
            }
            _ => {}
        }
    }

    // Compare against the prior run's statuses, when the caller supplied them.
    if let Some(prior) = prior_snapshot(previous_results)
        .and_then(|snap| snap.get("task_statuses"))
        .and_then(Value::as_object)
    {
        for (i, task) in tasks.iter().enumerate() {
            let Some(id) = task.get("id").and_then(Value::as_str) else {
                continue;
            };
            let Some(current_raw) = task.get("status").and_then(Value::as_str) else {
                continue;
            };
            let Some(prior_raw) = prior.get(id).and_then(Value::as_str) else {
                continue;
            };
            if prior_raw == current_raw {
                continue;
            }
            let Ok(from) = parse_task_status(prior_raw) else {
                continue;
            };
            if from.is_terminal() {
                errors.push(
                    ValidationError::new(
                        "STATE_MACHINE_TERMINAL_STATE_MODIFIED",
                        format!(
                            "Task {} left terminal status {} (now {})",
                            id, prior_raw, current_raw
                        ),
                    )
                    .with_path(format!("/tasks/{}/status", i))
                    .with_details(json!({ "taskId": id, "from": prior_raw, "to": current_raw })),
                );
                continue;
            }
            let legal = parse_task_status(current_raw)
                .map(|to| from.can_transition_to(to))
                .unwrap_or(false);
            if !legal {
                let allowed: Vec<&str> =
                    from.next_states().iter().map(TaskStatus::as_str).collect();
                errors.push(
                    ValidationError::new(
                        "STATE_MACHINE_INVALID_TASK_TRANSITION",
                        format!(
                            "Invalid status change for task {}: {} -> {}",
                            id, prior_raw, current_raw
                        ),
                    )
                    .with_path(format!("/tasks/{}/status", i))
                    .with_details(json!({
                        "taskId": id,
                        "from": prior_raw,
                        "to": current_raw,
                        "allowedTransitions": allowed,
                    })),
                );
            }
        }
    }

    let snapshot = json!({ "task_statuses": statuses });
    (errors, warnings, snapshot)
}
