use super::plan::{Task, TaskPlan};
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct DeltaRef<'a> {
    id: &'a str,
    title: &'a str,
}

fn is_empty(items: &&[String]) -> bool {
    items.is_empty()
}

#[derive(Serialize)]
struct TaskEntry<'a> {
    task_id: &'a str,
    title: &'a str,
    layer: &'a str,
    domain: &'a str,
    description: &'a str,
    acceptance_criteria: &'a [String],
    source_artifacts: &'a [String],
    priority: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    target_files: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    contracts: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    error_codes: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    depends_on: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    quality_gates: &'a [String],
}

#[derive(Serialize)]
struct TaskDocument<'a> {
    delta: DeltaRef<'a>,
    generation_date: &'a str,
    tasks: Vec<TaskEntry<'a>>,
}

impl<'a> From<&'a Task> for TaskEntry<'a> {
    fn from(t: &'a Task) -> Self {
        TaskEntry {
            task_id: &t.task_id,
            title: &t.title,
            layer: &t.layer,
            domain: &t.domain,
            description: &t.description,
            acceptance_criteria: &t.acceptance_criteria,
            source_artifacts: &t.source_artifacts,
            priority: &t.priority,
            target_files: &t.target_files,
            contracts: &t.contracts,
            error_codes: &t.error_codes,
            depends_on: &t.depends_on,
            quality_gates: &t.quality_gates,
        }
    }
}

/// The task list as one YAML document. Optional lists are left out when
/// empty.
pub fn format_yaml(plan: &TaskPlan) -> Result<String> {
    let doc = TaskDocument {
        delta: DeltaRef {
            id: &plan.delta_id,
            title: &plan.delta_title,
        },
        generation_date: &plan.generation_date,
        tasks: plan.tasks.iter().map(TaskEntry::from).collect(),
    };
    Ok(serde_yaml::to_string(&doc)?)
}

fn section(lines: &mut Vec<String>, heading: &str, items: &[String], code: bool) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("## {heading}"));
    lines.push(String::new());
    for item in items {
        if code {
            lines.push(format!("- `{item}`"));
        } else {
            lines.push(format!("- {item}"));
        }
    }
    lines.push(String::new());
}

/// A task as a standalone markdown brief for a coding agent.
pub fn format_task_markdown(task: &Task, delta_id: &str) -> String {
    let mut lines = vec![
        format!("# {}: {}", task.task_id, task.title),
        String::new(),
        format!("**Delta**: {delta_id}"),
        format!("**Layer**: {}", task.layer),
        format!("**Domain**: {}", task.domain),
        format!("**Priority**: {}", task.priority),
        String::new(),
    ];
    if !task.depends_on.is_empty() {
        lines.push(format!("**Depends on**: {}", task.depends_on.join(", ")));
        lines.push(String::new());
    }
    lines.extend([
        "## Description".to_string(),
        String::new(),
        task.description.clone(),
        String::new(),
    ]);
    if !task.acceptance_criteria.is_empty() {
        lines.push("## Acceptance Criteria".to_string());
        lines.push(String::new());
        lines.extend(task.acceptance_criteria.iter().map(|ac| format!("- [ ] {ac}")));
        lines.push(String::new());
    }
    section(&mut lines, "Source Artifacts", &task.source_artifacts, false);
    section(&mut lines, "Target Files", &task.target_files, true);
    section(&mut lines, "Contracts & References", &task.contracts, false);
    section(&mut lines, "Error Codes", &task.error_codes, true);
    section(&mut lines, "Quality Gates", &task.quality_gates, true);
    lines.join("\n")
}
