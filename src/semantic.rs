use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{json, Value};

use crate::status::{parse_phase_status, parse_priority, parse_task_status, TaskStatus};
use crate::types::{
    failure_result, is_plan_id, FileType, LayerName, LayerResult, ValidationContext,
    ValidationError, ValidationWarning,
};

/// Layer 2: per-field value correctness.
///
/// Ranges, formats, required companion fields, and chronology. Structural
/// shape is layer 1's concern; fields that are missing or mistyped in ways
/// the schema reports are skipped here rather than re-reported.
pub async fn run(ctx: &ValidationContext) -> LayerResult {
    let (errors, warnings) = match ctx.file_type {
        FileType::State => check_state(&ctx.data),
        FileType::Plan => check_plan(&ctx.data),
        FileType::TaskRegistry => check_registry(&ctx.data),
    };
    failure_result(LayerName::Semantic, errors, warnings, None)
}

/// Strict `YYYY-MM-DD` parse. Chrono alone accepts unpadded components, so
/// the shape is checked first.
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

fn check_state(data: &Value) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(position) = data.get("current_position") {
        if let Some(phase) = position.get("phase") {
            if phase.as_i64().is_none_or(|p| p < 0) {
                errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_PHASE",
                        "current_position.phase must be a non-negative integer",
                    )
                    .with_path("/current_position/phase"),
                );
            }
        }
        if let Some(status) = position.get("status").and_then(Value::as_str) {
            if let Err(message) = parse_phase_status(status) {
                errors.push(
                    ValidationError::new("SEMANTIC_UNKNOWN_STATUS", message)
                        .with_path("/current_position/status"),
                );
            }
        }
    }

    if let Some(decisions) = data.get("decisions").and_then(Value::as_array) {
        let mut last: Option<NaiveDate> = None;
        for (i, decision) in decisions.iter().enumerate() {
            let Some(date) = decision.get("date").and_then(Value::as_str) else {
                continue;
            };
            match parse_iso_date(date) {
                None => errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_DATE_FORMAT",
                        format!("Decision date '{}' is not a valid YYYY-MM-DD date", date),
                    )
                    .with_path(format!("/decisions/{}/date", i)),
                ),
                Some(parsed) => {
                    if last.is_some_and(|prev| parsed < prev) {
                        warnings.push(
                            ValidationWarning::new(
                                "SEMANTIC_DECISIONS_OUT_OF_ORDER",
                                format!("Decision date '{}' is earlier than the previous entry", date),
                            )
                            .with_path(format!("/decisions/{}/date", i)),
                        );
                    }
                    last = Some(parsed);
                }
            }
        }
    }

    if let Some(session_log) = data.get("session_log").and_then(Value::as_array) {
        let mut last: Option<DateTime<FixedOffset>> = None;
        for (i, entry) in session_log.iter().enumerate() {
            let Some(timestamp) = entry.get("timestamp").and_then(Value::as_str) else {
                continue;
            };
            match parse_timestamp(timestamp) {
                None => errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_TIMESTAMP",
                        format!("Session log timestamp '{}' is not valid ISO 8601", timestamp),
                    )
                    .with_path(format!("/session_log/{}/timestamp", i)),
                ),
                Some(parsed) => {
                    if last.is_some_and(|prev| parsed < prev) {
                        warnings.push(
                            ValidationWarning::new(
                                "SEMANTIC_SESSION_LOG_OUT_OF_ORDER",
                                format!(
                                    "Session log timestamp '{}' is earlier than the previous entry",
                                    timestamp
                                ),
                            )
                            .with_path(format!("/session_log/{}/timestamp", i)),
                        );
                    }
                    last = Some(parsed);
                }
            }
        }
    }

    let complete = data
        .pointer("/current_position/status")
        .and_then(Value::as_str)
        == Some("complete");
    let log_empty = data
        .get("session_log")
        .and_then(Value::as_array)
        .is_none_or(|log| log.is_empty());
    if complete && log_empty {
        warnings.push(ValidationWarning::new(
            "SEMANTIC_EMPTY_SESSION_LOG",
            "Status is complete but the session log is empty",
        ));
    }

    (errors, warnings)
}

fn check_plan(data: &Value) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (field, code) in [
        ("wave", "SEMANTIC_INVALID_WAVE"),
        ("plan", "SEMANTIC_INVALID_PLAN_NUMBER"),
    ] {
        if let Some(value) = data.get(field) {
            if value.as_i64().is_none_or(|n| n < 1) {
                errors.push(
                    ValidationError::new(code, format!("{} must be a positive integer", field))
                        .with_path(format!("/{}", field)),
                );
            }
        }
    }

    if let Some(priority) = data.get("priority") {
        let recognised = priority
            .as_str()
            .is_some_and(|p| parse_priority(p).is_ok());
        if !recognised {
            errors.push(
                ValidationError::new(
                    "SEMANTIC_INVALID_PRIORITY",
                    "priority must be one of critical, high, medium, low",
                )
                .with_path("/priority"),
            );
        }
    }

    if let Some(depends_on) = data.get("depends_on").and_then(Value::as_array) {
        for (i, dep) in depends_on.iter().enumerate() {
            let well_formed = dep.as_str().is_some_and(is_plan_id);
            if !well_formed {
                errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_DEPENDS_ON",
                        format!("depends_on entry {} must match NN-NN", dep),
                    )
                    .with_path(format!("/depends_on/{}", i)),
                );
            }
        }
    }

    if data.get("autonomous").and_then(Value::as_bool) == Some(false) {
        warnings.push(ValidationWarning::new(
            "SEMANTIC_CHECKPOINTS_EXPECTED",
            "Plan is not autonomous; checkpoint approval is expected between waves",
        ));
    }

    (errors, warnings)
}

fn check_registry(data: &Value) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let tasks: &[Value] = data
        .get("tasks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut phases: Vec<i64> = Vec::new();

    for (i, task) in tasks.iter().enumerate() {
        let base = format!("/tasks/{}", i);

        if let Some(leverage) = task.get("leverage") {
            if leverage.as_i64().is_none_or(|l| !(0..=10).contains(&l)) {
                errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_LEVERAGE",
                        "leverage must be an integer between 0 and 10",
                    )
                    .with_path(format!("{}/leverage", base)),
                );
            }
        }

        if let Some(phase) = task.get("phase") {
            match phase.as_i64() {
                Some(p) if p >= 1 => phases.push(p),
                _ => errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_PHASE",
                        "phase must be an integer >= 1",
                    )
                    .with_path(format!("{}/phase", base)),
                ),
            }
        }

        let status = task
            .get("status")
            .and_then(Value::as_str)
            .map(parse_task_status);
        match status {
            Some(Err(message)) => errors.push(
                ValidationError::new("SEMANTIC_UNKNOWN_STATUS", message)
                    .with_path(format!("{}/status", base)),
            ),
            Some(Ok(TaskStatus::Completed)) => {
                if task.get("completed").and_then(Value::as_str).is_none() {
                    errors.push(
                        ValidationError::new(
                            "SEMANTIC_MISSING_COMPLETED",
                            "Completed tasks must carry a completed timestamp",
                        )
                        .with_path(format!("{}/completed", base)),
                    );
                }
            }
            Some(Ok(TaskStatus::Blocked)) => {
                if task.get("blocked_by").and_then(Value::as_str).is_none() {
                    errors.push(
                        ValidationError::new(
                            "SEMANTIC_MISSING_BLOCKED_BY",
                            "Blocked tasks must carry a blocked_by reason",
                        )
                        .with_path(format!("{}/blocked_by", base)),
                    );
                }
            }
            _ => {}
        }

        let created = task.get("created").and_then(Value::as_str);
        let created_parsed = match created {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    errors.push(
                        ValidationError::new(
                            "SEMANTIC_INVALID_TIMESTAMP",
                            format!("created timestamp '{}' is not valid ISO 8601", raw),
                        )
                        .with_path(format!("{}/created", base)),
                    );
                }
                parsed
            }
            None => None,
        };

        let completed = task.get("completed").and_then(Value::as_str);
        let completed_parsed = match completed {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    errors.push(
                        ValidationError::new(
                            "SEMANTIC_INVALID_TIMESTAMP",
                            format!("completed timestamp '{}' is not valid ISO 8601", raw),
                        )
                        .with_path(format!("{}/completed", base)),
                    );
                }
                parsed
            }
            None => None,
        };

        if let (Some(created_at), Some(completed_at)) = (created_parsed, completed_parsed) {
            if completed_at < created_at {
                errors.push(
                    ValidationError::new(
                        "SEMANTIC_INVALID_DATE_ORDER",
                        "completed timestamp precedes created timestamp",
                    )
                    .with_path(format!("{}/completed", base))
                    .with_details(json!({
                        "created": created,
                        "completed": completed,
                    })),
                );
            }
        }
    }

    if let Some(warning) = phase_gap_warning(&phases) {
        warnings.push(warning);
    }

    (errors, warnings)
}

/// One warning when the observed task phases skip an integer between the
/// minimum and maximum.
fn phase_gap_warning(phases: &[i64]) -> Option<ValidationWarning> {
    let min = *phases.iter().min()?;
    let max = *phases.iter().max()?;
    let gap = (min..=max).any(|p| !phases.contains(&p));
    if !gap {
        return None;
    }
    Some(
        ValidationWarning::new(
            "SEMANTIC_PHASE_GAP",
            format!("Task phases have gaps between {} and {}", min, max),
        )
        .with_details(json!({ "minPhase": min, "maxPhase": max })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_date_is_strict_about_shape() {
        assert!(parse_iso_date("2026-01-23").is_some());
        assert!(parse_iso_date("2026-1-23").is_none());
        assert!(parse_iso_date("2026/01/23").is_none());
        assert!(parse_iso_date("2026-13-01").is_none());
    }

    #[test]
    fn phase_gap_detection() {
        assert!(phase_gap_warning(&[]).is_none());
        assert!(phase_gap_warning(&[1, 2, 3]).is_none());
        assert!(phase_gap_warning(&[2, 2, 2]).is_none());

        let warning = phase_gap_warning(&[1, 3]).unwrap();
        assert_eq!(warning.code, "SEMANTIC_PHASE_GAP");
        let details = warning.details.unwrap();
        assert_eq!(details["minPhase"], 1);
        assert_eq!(details["maxPhase"], 3);
    }
}
