#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

/// Creates a task object with minimal valid defaults.
///
/// Timestamps are fixed (`created` = 2026-01-20T10:00:00Z) so tests are
/// deterministic. `status` is the raw string form (`"pending"`,
/// `"in_progress"`, `"blocked"`, `"completed"`).
pub fn make_task(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Task {}", id),
        "phase": 1,
        "status": status,
        "assignee": "qa-engineer",
        "dependencies": [],
        "created": "2026-01-20T10:00:00Z"
    })
}

/// Creates a completed task with a valid completed timestamp after created.
pub fn make_completed_task(id: &str) -> Value {
    let mut task = make_task(id, "completed");
    task["completed"] = json!("2026-01-21T10:00:00Z");
    task
}

/// Sets the dependency list on a task and returns it.
pub fn with_deps(mut task: Value, deps: &[&str]) -> Value {
    task["dependencies"] = json!(deps);
    task
}

/// Creates a task registry document with the given `last_task_id` and tasks.
pub fn make_registry(last_task_id: u32, tasks: Vec<Value>) -> Value {
    json!({
        "version": "1.0.0",
        "project": "demo",
        "last_task_id": last_task_id,
        "tasks": tasks
    })
}

/// Creates a minimal state document at the given phase and status.
pub fn make_state(phase: i64, status: &str) -> Value {
    json!({
        "current_position": { "phase": phase, "status": status },
        "next_steps": ["continue"]
    })
}

/// Creates a minimal plan document.
pub fn make_plan(plan: i64, wave: i64) -> Value {
    json!({
        "phase": "1",
        "plan": plan,
        "wave": wave
    })
}

/// Creates a temporary project root with an empty `.planning/plans`
/// directory. The directory is cleaned up when the handle drops.
pub fn setup_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(dir.path().join(".planning/plans")).expect("Failed to create .planning");
    dir
}

/// Writes a JSON document under `.planning/` and returns its path.
pub fn write_planning_file(root: &Path, name: &str, data: &Value) -> PathBuf {
    let path = root.join(".planning").join(name);
    fs::write(&path, serde_json::to_string_pretty(data).expect("serialize"))
        .expect("Failed to write planning file");
    path
}

/// Writes a JSON plan document under `.planning/plans/` and returns its path.
pub fn write_plan_file(root: &Path, name: &str, data: &Value) -> PathBuf {
    let path = root.join(".planning/plans").join(name);
    fs::write(&path, serde_json::to_string_pretty(data).expect("serialize"))
        .expect("Failed to write plan file");
    path
}
