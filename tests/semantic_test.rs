mod common;

use common::{make_registry, make_state, make_task};
use plan_warden::semantic;
use plan_warden::types::{FileType, ValidationContext};
use serde_json::json;

// --- State documents ---

#[tokio::test]
async fn clean_state_passes() {
    let ctx = ValidationContext::new(FileType::State, make_state(1, "executing"));
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn negative_phase_is_an_error() {
    let ctx = ValidationContext::new(FileType::State, make_state(-1, "planning"));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_PHASE");
    assert_eq!(result.errors[0].path.as_deref(), Some("/current_position/phase"));
}

#[tokio::test]
async fn fractional_phase_is_an_error() {
    let mut state = make_state(1, "planning");
    state["current_position"]["phase"] = json!(1.5);
    let ctx = ValidationContext::new(FileType::State, state);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_PHASE");
}

#[tokio::test]
async fn unknown_phase_status_is_an_error() {
    let ctx = ValidationContext::new(FileType::State, make_state(1, "done"));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_UNKNOWN_STATUS");
}

#[tokio::test]
async fn ready_to_start_literal_is_accepted() {
    let ctx = ValidationContext::new(FileType::State, make_state(0, "Ready to start"));
    let result = semantic::run(&ctx).await;
    assert!(result.valid, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn malformed_decision_date_is_an_error() {
    let mut state = make_state(1, "executing");
    state["decisions"] = json!([
        { "date": "2026-01-05", "decision": "a", "rationale": "r" },
        { "date": "05/01/2026", "decision": "b", "rationale": "r" }
    ]);
    let ctx = ValidationContext::new(FileType::State, state);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_DATE_FORMAT");
    assert_eq!(result.errors[0].path.as_deref(), Some("/decisions/1/date"));
}

#[tokio::test]
async fn out_of_order_decisions_warn_but_stay_valid() {
    let mut state = make_state(1, "executing");
    state["decisions"] = json!([
        { "date": "2026-01-10", "decision": "a", "rationale": "r" },
        { "date": "2026-01-05", "decision": "b", "rationale": "r" }
    ]);
    let ctx = ValidationContext::new(FileType::State, state);
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    assert_eq!(result.warnings[0].code, "SEMANTIC_DECISIONS_OUT_OF_ORDER");
}

#[tokio::test]
async fn out_of_order_session_log_warns() {
    let mut state = make_state(1, "executing");
    state["session_log"] = json!([
        { "timestamp": "2026-01-10T12:00:00Z", "action": "started" },
        { "timestamp": "2026-01-10T09:00:00Z", "action": "paused" }
    ]);
    let ctx = ValidationContext::new(FileType::State, state);
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    assert_eq!(result.warnings[0].code, "SEMANTIC_SESSION_LOG_OUT_OF_ORDER");
}

#[tokio::test]
async fn unparseable_session_timestamp_is_an_error() {
    let mut state = make_state(1, "executing");
    state["session_log"] = json!([
        { "timestamp": "yesterday", "action": "started" }
    ]);
    let ctx = ValidationContext::new(FileType::State, state);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_TIMESTAMP");
}

#[tokio::test]
async fn complete_without_session_log_warns() {
    let ctx = ValidationContext::new(FileType::State, make_state(3, "complete"));
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.code == "SEMANTIC_EMPTY_SESSION_LOG"));
}

// --- Plans ---

#[tokio::test]
async fn zero_wave_is_an_error() {
    let data = json!({ "phase": "1", "plan": 1, "wave": 0 });
    let ctx = ValidationContext::new(FileType::Plan, data);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_WAVE");
}

#[tokio::test]
async fn zero_plan_number_is_an_error() {
    let data = json!({ "phase": "1", "plan": 0, "wave": 1 });
    let ctx = ValidationContext::new(FileType::Plan, data);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_PLAN_NUMBER");
}

#[tokio::test]
async fn unknown_priority_is_an_error() {
    let data = json!({ "phase": "1", "plan": 1, "wave": 1, "priority": "urgent" });
    let ctx = ValidationContext::new(FileType::Plan, data);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_PRIORITY");
}

#[tokio::test]
async fn malformed_depends_on_is_an_error() {
    let data = json!({
        "phase": "1", "plan": 1, "wave": 1,
        "depends_on": ["01-02", "1-2"]
    });
    let ctx = ValidationContext::new(FileType::Plan, data);
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_DEPENDS_ON");
    assert_eq!(result.errors[0].path.as_deref(), Some("/depends_on/1"));
}

#[tokio::test]
async fn non_autonomous_plan_warns_about_checkpoints() {
    let data = json!({ "phase": "1", "plan": 1, "wave": 1, "autonomous": false });
    let ctx = ValidationContext::new(FileType::Plan, data);
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    assert_eq!(result.warnings[0].code, "SEMANTIC_CHECKPOINTS_EXPECTED");
}

#[tokio::test]
async fn autonomous_plan_does_not_warn() {
    let data = json!({ "phase": "1", "plan": 1, "wave": 1, "autonomous": true });
    let ctx = ValidationContext::new(FileType::Plan, data);
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    assert!(result.warnings.is_empty());
}

// --- Task registries ---

#[tokio::test]
async fn leverage_out_of_range_is_an_error() {
    let mut task = make_task("T001", "pending");
    task["leverage"] = json!(11);
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_LEVERAGE");
}

#[tokio::test]
async fn leverage_bounds_pass() {
    let mut low = make_task("T001", "pending");
    low["leverage"] = json!(0);
    let mut high = make_task("T002", "pending");
    high["leverage"] = json!(10);
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(2, vec![low, high]));
    let result = semantic::run(&ctx).await;
    assert!(result.valid, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn task_phase_zero_is_an_error() {
    let mut task = make_task("T001", "pending");
    task["phase"] = json!(0);
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_PHASE");
}

#[tokio::test]
async fn completed_task_requires_completed_timestamp() {
    let task = make_task("T001", "completed");
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.code == "SEMANTIC_MISSING_COMPLETED"));
}

#[tokio::test]
async fn blocked_task_requires_blocked_by() {
    let task = make_task("T001", "blocked");
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.code == "SEMANTIC_MISSING_BLOCKED_BY"));
}

#[tokio::test]
async fn completed_before_created_is_an_error() {
    let mut task = make_task("T001", "completed");
    task["created"] = json!("2026-01-23T12:00:00Z");
    task["completed"] = json!("2026-01-23T10:00:00Z");
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.code == "SEMANTIC_INVALID_DATE_ORDER"));
}

#[tokio::test]
async fn completed_equal_to_created_passes() {
    let mut task = make_task("T001", "completed");
    task["completed"] = json!("2026-01-20T10:00:00Z");
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(result.valid, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn bad_created_timestamp_is_an_error() {
    let mut task = make_task("T001", "pending");
    task["created"] = json!("January 20th");
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_INVALID_TIMESTAMP");
}

#[tokio::test]
async fn phase_gap_produces_single_warning() {
    let mut t1 = make_task("T001", "pending");
    t1["phase"] = json!(1);
    let mut t2 = make_task("T002", "pending");
    t2["phase"] = json!(4);
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(2, vec![t1, t2]));
    let result = semantic::run(&ctx).await;
    assert!(result.valid);
    let gaps: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.code == "SEMANTIC_PHASE_GAP")
        .collect();
    assert_eq!(gaps.len(), 1);
    let details = gaps[0].details.as_ref().unwrap();
    assert_eq!(details["minPhase"], 1);
    assert_eq!(details["maxPhase"], 4);
}

#[tokio::test]
async fn unknown_task_status_is_an_error() {
    let task = make_task("T001", "done");
    let ctx = ValidationContext::new(FileType::TaskRegistry, make_registry(1, vec![task]));
    let result = semantic::run(&ctx).await;
    assert!(!result.valid);
    assert_eq!(result.errors[0].code, "SEMANTIC_UNKNOWN_STATUS");
}
