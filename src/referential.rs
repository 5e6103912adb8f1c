use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::types::{
    failure_result, is_task_id, task_id_suffix, FileType, LayerName, LayerResult,
    ValidationContext, ValidationError, ValidationWarning,
};

/// Agents a plan may be assigned to. Part of the external contract.
pub const KNOWN_AGENTS: [&str; 17] = [
    "backend-architect",
    "database-engineer",
    "devops-engineer",
    "ui-ux-engineer",
    "chat-engineer",
    "data-viz-engineer",
    "langchain-engineer",
    "llm-workflow-engineer",
    "prd-spec-validator",
    "vector-store-engineer",
    "cache-engineer",
    "observability-engineer",
    "product-manager",
    "product-strategy",
    "technical-program-manager",
    "qa-engineer",
    "documentation-engineer",
];

/// Layer 3: intra- and inter-document references.
///
/// The only layer that touches the filesystem: state documents resolve task
/// references against the sibling registry, plans resolve `depends_on`
/// against the plans directory. An unreadable sibling degrades to a warning
/// so a document can still be validated in isolation.
pub async fn run(ctx: &ValidationContext) -> LayerResult {
    let project_path = ctx.project_path.as_deref();
    let (errors, warnings) = match ctx.file_type {
        FileType::TaskRegistry => check_registry(&ctx.data),
        FileType::State => check_state(&ctx.data, project_path),
        FileType::Plan => check_plan(&ctx.data, project_path),
    };
    failure_result(LayerName::Referential, errors, warnings, None)
}

fn tasks_of(data: &Value) -> &[Value] {
    data.get("tasks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn check_registry(data: &Value) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();

    let tasks = tasks_of(data);

    // Declaration order is kept so cycle reports are deterministic.
    let mut order: Vec<&str> = Vec::new();
    let mut deps_of: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (i, task) in tasks.iter().enumerate() {
        let Some(id) = task.get("id").and_then(Value::as_str) else {
            continue;
        };
        if !seen.insert(id) {
            errors.push(
                ValidationError::new(
                    "REFERENTIAL_DUPLICATE_TASK_ID",
                    format!("Task id {} is declared more than once", id),
                )
                .with_path(format!("/tasks/{}/id", i)),
            );
            continue;
        }
        order.push(id);
        let deps: Vec<&str> = task
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|deps| deps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        deps_of.insert(id, deps);
    }

    for (i, task) in tasks.iter().enumerate() {
        let Some(id) = task.get("id").and_then(Value::as_str) else {
            continue;
        };
        let Some(deps) = task.get("dependencies").and_then(Value::as_array) else {
            continue;
        };
        for (j, dep) in deps.iter().enumerate() {
            let Some(dep) = dep.as_str() else { continue };
            if dep == id {
                errors.push(
                    ValidationError::new(
                        "REFERENTIAL_SELF_DEPENDENCY",
                        format!("Task {} depends on itself", id),
                    )
                    .with_path(format!("/tasks/{}/dependencies/{}", i, j)),
                );
            } else if !seen.contains(dep) {
                errors.push(
                    ValidationError::new(
                        "REFERENTIAL_MISSING_DEPENDENCY",
                        format!("Task {} depends on unknown task {}", id, dep),
                    )
                    .with_path(format!("/tasks/{}/dependencies/{}", i, j)),
                );
            }
        }
    }

    if let Some(declared) = data.get("last_task_id").and_then(Value::as_i64) {
        let expected = order
            .iter()
            .filter_map(|id| task_id_suffix(id))
            .max()
            .unwrap_or(0) as i64;
        if declared != expected {
            errors.push(
                ValidationError::new(
                    "REFERENTIAL_LAST_TASK_ID_MISMATCH",
                    format!(
                        "last_task_id is {} but the highest task suffix is {}",
                        declared, expected
                    ),
                )
                .with_path("/last_task_id")
                .with_details(json!({ "expected": expected, "actual": declared })),
            );
        }
    }

    for cycle in find_cycles(&order, &deps_of) {
        errors.push(
            ValidationError::new(
                "REFERENTIAL_CIRCULAR_DEPENDENCY",
                format!("Circular dependency detected: {}", cycle.join(" -> ")),
            )
            .with_details(json!({ "cycle": cycle })),
        );
    }

    (errors, Vec::new())
}

/// DFS with an explicit recursion stack.
///
/// Re-entering a node that is still on the stack closes a cycle; the
/// reported vector is the path slice from that node's first occurrence with
/// the node appended again, so `A -> B -> A` comes out in full. Traversal
/// continues afterwards so disjoint cycles all surface in one pass.
fn find_cycles(order: &[&str], deps_of: &HashMap<&str, Vec<&str>>) -> Vec<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for &start in order {
        if visited.contains(start) {
            continue;
        }

        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        let mut on_stack: HashSet<&str> = HashSet::from([start]);
        let mut path: Vec<&str> = vec![start];

        loop {
            let Some(&(node, next_index)) = stack.last() else {
                break;
            };
            let deps: &[&str] = deps_of.get(node).map(Vec::as_slice).unwrap_or(&[]);

            if next_index >= deps.len() {
                visited.insert(node);
                on_stack.remove(node);
                path.pop();
                stack.pop();
                continue;
            }

            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }

            let dep = deps[next_index];
            if on_stack.contains(dep) {
                if let Some(pos) = path.iter().position(|&n| n == dep) {
                    let mut cycle: Vec<String> =
                        path[pos..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.to_string());
                    cycles.push(cycle);
                }
            } else if !visited.contains(dep) && deps_of.contains_key(dep) {
                stack.push((dep, 0));
                on_stack.insert(dep);
                path.push(dep);
            }
        }
    }

    cycles
}

fn check_state(
    data: &Value,
    project_path: Option<&Path>,
) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(questions) = data.get("open_questions").and_then(Value::as_array) {
        let mut seen: HashSet<&str> = HashSet::new();
        for (i, question) in questions.iter().enumerate() {
            let Some(id) = question.get("id").and_then(Value::as_str) else {
                continue;
            };
            if !seen.insert(id) {
                errors.push(
                    ValidationError::new(
                        "REFERENTIAL_DUPLICATE_QUESTION_ID",
                        format!("Open question id {} is declared more than once", id),
                    )
                    .with_path(format!("/open_questions/{}/id", i)),
                );
                break;
            }
        }
    }

    let Some(project_path) = project_path else {
        return (errors, warnings);
    };

    let registry_path = project_path.join(".planning").join("TASKS.json");
    let task_ids: HashSet<String> = match load_registry_ids(&registry_path) {
        Ok(ids) => ids,
        Err(detail) => {
            warnings.push(
                ValidationWarning::new(
                    "REFERENTIAL_REGISTRY_UNREADABLE",
                    format!("Cannot cross-check tasks: {}", detail),
                )
                .with_details(json!({
                    "filePath": registry_path.display().to_string(),
                    "error": detail,
                })),
            );
            return (errors, warnings);
        }
    };

    if let Some(active_ref) = active_task_reference(data.get("active_task")) {
        if !task_ids.contains(active_ref) {
            errors.push(
                ValidationError::new(
                    "REFERENTIAL_UNKNOWN_TASK",
                    format!("active_task {} does not exist in the registry", active_ref),
                )
                .with_path("/active_task"),
            );
        }
    }

    if let Some(session_log) = data.get("session_log").and_then(Value::as_array) {
        for (i, entry) in session_log.iter().enumerate() {
            let Some(task_id) = entry.get("task_id").and_then(Value::as_str) else {
                continue;
            };
            if !task_ids.contains(task_id) {
                errors.push(
                    ValidationError::new(
                        "REFERENTIAL_UNKNOWN_TASK",
                        format!("Session log references unknown task {}", task_id),
                    )
                    .with_path(format!("/session_log/{}/task_id", i)),
                );
            }
        }
    }

    (errors, warnings)
}

/// The task id an `active_task` field points at, if any.
///
/// Accepts an object with an `id` or a bare task-id string; the literal
/// `"None"`, null, and anything not shaped like a task id are no-ops.
fn active_task_reference(active_task: Option<&Value>) -> Option<&str> {
    match active_task? {
        Value::String(s) if is_task_id(s) => Some(s.as_str()),
        Value::Object(fields) => fields.get("id").and_then(Value::as_str),
        _ => None,
    }
}

fn load_registry_ids(registry_path: &Path) -> Result<HashSet<String>, String> {
    let raw = fs::read_to_string(registry_path).map_err(|e| e.to_string())?;
    let registry: Value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(tasks_of(&registry)
        .iter()
        .filter_map(|task| task.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn check_plan(
    data: &Value,
    project_path: Option<&Path>,
) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(agent) = data.get("agent").and_then(Value::as_str) {
        if !KNOWN_AGENTS.contains(&agent) {
            errors.push(
                ValidationError::new(
                    "REFERENTIAL_UNKNOWN_AGENT",
                    format!("Agent '{}' is not a recognised agent", agent),
                )
                .with_path("/agent"),
            );
        }
    }

    let depends_on: Vec<&str> = data
        .get("depends_on")
        .and_then(Value::as_array)
        .map(|deps| deps.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if depends_on.is_empty() {
        return (errors, warnings);
    }

    let Some(project_path) = project_path else {
        return (errors, warnings);
    };

    let plans_dir = project_path.join(".planning").join("plans");
    let plan_files: Vec<String> = match fs::read_dir(&plans_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect(),
        Err(e) => {
            warnings.push(
                ValidationWarning::new(
                    "REFERENTIAL_PLANS_DIR_UNREADABLE",
                    format!("Cannot resolve plan dependencies: {}", e),
                )
                .with_details(json!({
                    "plansDir": plans_dir.display().to_string(),
                    "error": e.to_string(),
                })),
            );
            return (errors, warnings);
        }
    };

    for (i, dep) in depends_on.iter().enumerate() {
        let found = plan_files.iter().any(|name| plan_file_matches(name, dep));
        if !found {
            errors.push(
                ValidationError::new(
                    "REFERENTIAL_MISSING_PLAN",
                    format!("No plan file found for dependency {}", dep),
                )
                .with_path(format!("/depends_on/{}", i))
                .with_details(json!({
                    "planId": dep,
                    "plansDir": plans_dir.display().to_string(),
                })),
            );
        }
    }

    (errors, warnings)
}

/// Canonical plan-file match: the name carries the plan id (as prefix or
/// anywhere within) and ends with `.plan.md`.
fn plan_file_matches(file_name: &str, plan_id: &str) -> bool {
    file_name.contains(plan_id) && file_name.ends_with(".plan.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(
        edges: Vec<(&'static str, Vec<&'static str>)>,
    ) -> (Vec<&'static str>, HashMap<&'static str, Vec<&'static str>>) {
        let order: Vec<&str> = edges.iter().map(|(id, _)| *id).collect();
        let deps: HashMap<&str, Vec<&str>> = edges.into_iter().collect();
        (order, deps)
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let (order, deps) = graph(vec![
            ("T001", vec![]),
            ("T002", vec!["T001"]),
            ("T003", vec!["T001", "T002"]),
        ]);
        assert!(find_cycles(&order, &deps).is_empty());
    }

    #[test]
    fn two_node_cycle_is_reported_in_full() {
        let (order, deps) = graph(vec![("T001", vec!["T002"]), ("T002", vec!["T001"])]);
        let cycles = find_cycles(&order, &deps);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec!["T001", "T002", "T001"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let (order, deps) = graph(vec![("T001", vec!["T001"])]);
        let cycles = find_cycles(&order, &deps);
        assert_eq!(cycles, vec![vec!["T001", "T001"]]);
    }

    #[test]
    fn disjoint_cycles_surface_in_one_pass() {
        let (order, deps) = graph(vec![
            ("T001", vec!["T002"]),
            ("T002", vec!["T001"]),
            ("T003", vec!["T004"]),
            ("T004", vec!["T003"]),
            ("T005", vec![]),
        ]);
        let cycles = find_cycles(&order, &deps);
        assert_eq!(cycles.len(), 2);
        assert!(cycles[0].contains(&"T001".to_string()));
        assert!(cycles[1].contains(&"T003".to_string()));
    }

    #[test]
    fn cycle_slice_starts_at_reentry_node() {
        // T001 -> T002 -> T003 -> T002: the cycle excludes T001.
        let (order, deps) = graph(vec![
            ("T001", vec!["T002"]),
            ("T002", vec!["T003"]),
            ("T003", vec!["T002"]),
        ]);
        let cycles = find_cycles(&order, &deps);
        assert_eq!(cycles, vec![vec!["T002", "T003", "T002"]]);
    }

    #[test]
    fn active_task_reference_forms() {
        use serde_json::json;
        assert_eq!(
            active_task_reference(Some(&json!("T001"))),
            Some("T001")
        );
        assert_eq!(
            active_task_reference(Some(&json!({"id": "T002", "title": "x"}))),
            Some("T002")
        );
        assert_eq!(active_task_reference(Some(&json!("None"))), None);
        assert_eq!(active_task_reference(Some(&json!(null))), None);
        assert_eq!(active_task_reference(None), None);
    }

    #[test]
    fn plan_file_matching() {
        assert!(plan_file_matches("01-02.plan.md", "01-02"));
        assert!(plan_file_matches("01-02-auth.plan.md", "01-02"));
        assert!(plan_file_matches("phase-01-02.plan.md", "01-02"));
        assert!(!plan_file_matches("01-02.md", "01-02"));
        assert!(!plan_file_matches("01-02.plan.json", "01-02"));
        assert!(!plan_file_matches("01-03.plan.md", "01-02"));
    }

    #[test]
    fn known_agents_is_exactly_seventeen() {
        assert_eq!(KNOWN_AGENTS.len(), 17);
        assert!(KNOWN_AGENTS.contains(&"qa-engineer"));
    }
}
