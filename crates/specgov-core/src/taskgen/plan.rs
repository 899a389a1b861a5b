use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

fn default_priority() -> String {
    "medium".to_string()
}

/// One implementation task as proposed by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub title: String,
    /// `domain-core`, `application`, `adapter-in`, `adapter-out`,
    /// `middleware` or `test`.
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub source_artifacts: Vec<String>,
    #[serde(default)]
    pub target_files: Vec<String>,
    #[serde(default)]
    pub contracts: Vec<String>,
    #[serde(default)]
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub quality_gates: Vec<String>,
}

/// Tasks generated for one delta.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskPlan {
    pub delta_id: String,
    pub delta_title: String,
    pub generation_date: String,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
}

/// Tasks and summary from an LLM answer. Entries that are not objects are
/// skipped. A task ID names the task's file, so it must be non-empty and
/// free of path separators.
pub fn parse_tasks(response: &str) -> Result<(Vec<Task>, String)> {
    let value = llm_client::extract_json(response)?;
    let Some(root) = value.as_object() else {
        return Err(SpecError::Plan("expected a JSON object".to_string()));
    };
    let mut tasks = Vec::new();
    let entries = root.get("tasks").and_then(Value::as_array);
    for (i, entry) in entries.into_iter().flatten().enumerate() {
        if !entry.is_object() {
            tracing::warn!(index = i, "task entry is not an object, skipping");
            continue;
        }
        let task: Task = serde_json::from_value(entry.clone())
            .map_err(|e| SpecError::Plan(format!("tasks[{i}]: {e}")))?;
        if task.task_id.trim().is_empty() {
            return Err(SpecError::Plan(format!("tasks[{i}]: missing task_id")));
        }
        if task.task_id.contains(['/', '\\']) {
            return Err(SpecError::Plan(format!(
                "tasks[{i}]: task_id '{}' must not contain path separators",
                task.task_id
            )));
        }
        tasks.push(task);
    }
    let summary = root
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok((tasks, summary))
}

fn layer_rank(layer: &str) -> u8 {
    match layer {
        "domain-core" => 0,
        "application" => 1,
        "adapter-in" | "adapter-out" => 2,
        "middleware" => 3,
        "test" => 4,
        _ => 99,
    }
}

/// Order tasks by layer, then task ID, then pull dependencies ahead of
/// their dependents. Unknown dependency IDs are ignored; a cycle is broken
/// at the edge that closes it. Every task appears exactly once.
pub fn topological_sort(tasks: Vec<Task>) -> Vec<Task> {
    let mut seeds: Vec<usize> = (0..tasks.len()).collect();
    seeds.sort_by(|&a, &b| {
        (layer_rank(&tasks[a].layer), &tasks[a].task_id)
            .cmp(&(layer_rank(&tasks[b].layer), &tasks[b].task_id))
    });

    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (i, t) in tasks.iter().enumerate() {
        by_id.entry(t.task_id.as_str()).or_insert(i);
    }

    let mut done: HashSet<usize> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(tasks.len());
    for seed in seeds {
        let mut visiting = HashSet::new();
        visit(seed, &tasks, &by_id, &mut visiting, &mut done, &mut order);
    }

    let mut slots: Vec<Option<Task>> = tasks.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

fn visit(
    idx: usize,
    tasks: &[Task],
    by_id: &HashMap<&str, usize>,
    visiting: &mut HashSet<usize>,
    done: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    if done.contains(&idx) {
        return;
    }
    if !visiting.insert(idx) {
        tracing::warn!(task = %tasks[idx].task_id, "circular dependency, breaking cycle");
        return;
    }
    for dep in &tasks[idx].depends_on {
        if let Some(&d) = by_id.get(dep.as_str()) {
            visit(d, tasks, by_id, visiting, done, order);
        }
    }
    visiting.remove(&idx);
    done.insert(idx);
    order.push(idx);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, layer: &str, deps: &[&str]) -> Task {
        Task {
            task_id: id.to_string(),
            title: format!("{id} title"),
            layer: layer.to_string(),
            domain: String::new(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            source_artifacts: Vec::new(),
            target_files: Vec::new(),
            contracts: Vec::new(),
            error_codes: Vec::new(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            priority: default_priority(),
            quality_gates: Vec::new(),
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.task_id.as_str()).collect()
    }

    #[test]
    fn parses_tasks_with_defaults() {
        let (tasks, summary) = parse_tasks(
            r#"{"tasks": [{"task_id": "TASK-001", "title": "Order aggregate", "layer": "domain-core"}, 7],
                "summary": "Checkout core"}"#,
        )
        .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, "medium");
        assert!(tasks[0].depends_on.is_empty());
        assert_eq!(summary, "Checkout core");
    }

    #[test]
    fn mistyped_task_is_plan_error() {
        let err = parse_tasks(r#"{"tasks": [{"task_id": "TASK-001", "depends_on": "TASK-002"}]}"#).unwrap_err();
        assert!(matches!(err, SpecError::Plan(_)));
        assert!(err.to_string().contains("tasks[0]"));
    }

    #[test]
    fn task_ids_must_be_file_names() {
        let err = parse_tasks(r#"{"tasks": [{"title": "No id"}]}"#).unwrap_err();
        assert!(err.to_string().contains("tasks[0]: missing task_id"));

        for id in ["../../escaped", "TASK-001/x", r"..\TASK-001", "  "] {
            let response = serde_json::json!({"tasks": [{"task_id": id}]}).to_string();
            let err = parse_tasks(&response).unwrap_err();
            assert!(matches!(err, SpecError::Plan(_)), "{id}");
        }
    }

    #[test]
    fn orders_by_layer_then_id() {
        let sorted = topological_sort(vec![
            task("TASK-004", "test", &[]),
            task("TASK-003", "adapter-in", &[]),
            task("TASK-002", "application", &[]),
            task("TASK-001", "domain-core", &[]),
            task("TASK-005", "docs", &[]),
            task("TASK-006", "middleware", &[]),
        ]);
        assert_eq!(
            ids(&sorted),
            vec!["TASK-001", "TASK-002", "TASK-003", "TASK-006", "TASK-004", "TASK-005"]
        );
    }

    #[test]
    fn dependencies_come_first() {
        let sorted = topological_sort(vec![
            task("TASK-001", "domain-core", &["TASK-003"]),
            task("TASK-002", "domain-core", &[]),
            task("TASK-003", "test", &["TASK-404"]),
        ]);
        assert_eq!(ids(&sorted), vec!["TASK-003", "TASK-001", "TASK-002"]);
    }

    #[test]
    fn cycles_are_broken_without_losing_tasks() {
        let sorted = topological_sort(vec![
            task("TASK-001", "domain-core", &["TASK-002"]),
            task("TASK-002", "domain-core", &["TASK-001"]),
            task("TASK-003", "application", &["TASK-003"]),
        ]);
        assert_eq!(ids(&sorted), vec!["TASK-002", "TASK-001", "TASK-003"]);
    }
}
