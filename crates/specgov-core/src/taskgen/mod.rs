//! Task generation: pending deltas in, ordered implementation tasks out.
//!
//! ```text
//! delta ─► impact analysis ─► prompt ─► LLM ─► parse ─► order ─► yaml | files
//! ```
//!
//! Status-only changes are dropped before the LLM sees them. With
//! `plan_only` the pipeline stops after impact analysis.

pub mod format;
pub mod impact;
pub mod plan;
pub mod prompt;

use crate::delta::{load_delta, Delta};
use crate::error::Result;
use crate::io;
use crate::paths;
use chrono::NaiveDate;
use llm_client::ChatClient;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use impact::{analyze_impact, ImpactEntry};
pub use plan::{parse_tasks, topological_sort, Task, TaskPlan};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One YAML document, printed or written to `<out-dir>/tasks-<DELTA>.yaml`.
    #[default]
    Yaml,
    /// One markdown brief per task plus `index.yaml`.
    Files,
}

#[derive(Debug, Clone, Default)]
pub struct TaskgenOptions {
    pub format: OutputFormat,
    pub out_dir: Option<PathBuf>,
    pub plan_only: bool,
}

/// Result of running the pipeline over one delta.
#[derive(Debug, Clone, Serialize)]
pub struct TaskgenOutcome {
    pub delta_id: String,
    pub delta_title: String,
    pub delta_file: String,
    pub impacts: Vec<ImpactEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<TaskPlan>,
    /// Root-relative files written.
    pub written: Vec<String>,
    /// YAML rendering when it was not written to a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaml: Option<String>,
}

impl TaskgenOutcome {
    pub fn code_impacts(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.impacts.iter().filter(|i| !i.status_only)
    }
}

/// Run the pipeline for the delta at `delta_path`. The client is only
/// called when there is at least one code-impacting change and
/// `plan_only` is off.
pub fn run(
    root: &Path,
    client: &dyn ChatClient,
    delta_path: &Path,
    opts: &TaskgenOptions,
    today: NaiveDate,
) -> Result<TaskgenOutcome> {
    let delta = load_delta(delta_path)?;
    tracing::info!(
        delta = %delta.id,
        title = %delta.title,
        status = %delta.status,
        changes = delta.changes.len(),
        "loaded delta"
    );
    let impacts = analyze_impact(root, &delta)?;

    let mut outcome = TaskgenOutcome {
        delta_id: delta.id.clone(),
        delta_title: delta.title.clone(),
        delta_file: paths::rel(root, delta_path),
        impacts,
        plan: None,
        written: Vec::new(),
        yaml: None,
    };
    if opts.plan_only {
        return Ok(outcome);
    }
    if outcome.code_impacts().next().is_none() {
        tracing::info!("no code-impacting changes, nothing to generate");
        return Ok(outcome);
    }

    let system = prompt::system_prompt(root, &outcome.impacts)?;
    let user = prompt::user_prompt(&delta, &outcome.impacts)?;
    tracing::info!(
        client = %client.describe(),
        system_chars = system.len(),
        user_chars = user.len(),
        "requesting tasks"
    );
    let response = client.complete(&system, &user)?;
    let (tasks, summary) = parse_tasks(&response)?;
    tracing::info!(tasks = tasks.len(), summary = %summary, "generated tasks");

    let plan = TaskPlan {
        delta_id: delta.id.clone(),
        delta_title: delta.title.clone(),
        generation_date: today.format("%Y-%m-%d").to_string(),
        tasks: topological_sort(tasks),
        summary,
    };
    write_output(root, &delta, &plan, opts, &mut outcome)?;
    outcome.plan = Some(plan);
    Ok(outcome)
}

fn write_output(
    root: &Path,
    delta: &Delta,
    plan: &TaskPlan,
    opts: &TaskgenOptions,
    outcome: &mut TaskgenOutcome,
) -> Result<()> {
    let index = format::format_yaml(plan)?;
    match opts.format {
        OutputFormat::Yaml => match &opts.out_dir {
            Some(dir) => {
                let path = dir.join(format!("tasks-{}.yaml", delta.id));
                io::atomic_write(&path, index.as_bytes())?;
                tracing::info!(file = %paths::rel(root, &path), "wrote tasks");
                outcome.written.push(paths::rel(root, &path));
            }
            None => outcome.yaml = Some(index),
        },
        OutputFormat::Files => {
            let dir = opts
                .out_dir
                .clone()
                .unwrap_or_else(|| root.join(paths::TASKS_DIR).join(&delta.id));
            for task in &plan.tasks {
                let path = dir.join(format!("{}.md", task.task_id));
                io::atomic_write(&path, format::format_task_markdown(task, &delta.id).as_bytes())?;
                outcome.written.push(paths::rel(root, &path));
            }
            let path = dir.join("index.yaml");
            io::atomic_write(&path, index.as_bytes())?;
            outcome.written.push(paths::rel(root, &path));
            tracing::info!(dir = %paths::rel(root, &dir), files = outcome.written.len(), "wrote task files");
        }
    }
    Ok(())
}
