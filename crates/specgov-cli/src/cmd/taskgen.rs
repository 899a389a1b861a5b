use crate::output::{print_json, rule};
use anyhow::{bail, Context};
use clap::{ArgGroup, Args, ValueEnum};
use llm_client::LazyChatClient;
use specgov_core::config::{LlmSettings, Pipeline};
use specgov_core::delta::find_pending_deltas;
use specgov_core::taskgen::{self, ImpactEntry, OutputFormat, TaskgenOptions, TaskgenOutcome};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Single YAML document
    Yaml,
    /// One markdown file per task plus index.yaml
    Files,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Yaml => OutputFormat::Yaml,
            FormatArg::Files => OutputFormat::Files,
        }
    }
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["delta", "all_pending"])))]
pub struct TaskgenArgs {
    /// Delta file (relative paths resolve against the root)
    #[arg(long, short = 'd')]
    delta: Option<PathBuf>,

    /// Process every delta with status proposed or applied
    #[arg(long)]
    all_pending: bool,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "yaml")]
    format: FormatArg,

    /// Output directory for generated files
    #[arg(long, short = 'o')]
    out_dir: Option<PathBuf>,

    /// Impact analysis only (no LLM call)
    #[arg(long)]
    plan: bool,

    /// LLM provider: openai or anthropic
    #[arg(long, env = "TASKGEN_LLM_PROVIDER")]
    provider: Option<String>,

    /// API base URL
    #[arg(long, env = "TASKGEN_LLM_BASE_URL")]
    base_url: Option<String>,

    /// API key (only needed when tasks are generated)
    #[arg(long, env = "TASKGEN_LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name
    #[arg(long, env = "TASKGEN_LLM_MODEL")]
    model: Option<String>,
}

pub fn run(root: &Path, args: TaskgenArgs, json: bool) -> anyhow::Result<()> {
    let deltas = match &args.delta {
        Some(p) => {
            let path = if p.is_absolute() { p.clone() } else { root.join(p) };
            if !path.is_file() {
                bail!("Delta file not found: {}", p.display());
            }
            vec![path]
        }
        None => {
            let pending = find_pending_deltas(root)?;
            if pending.is_empty() {
                if json {
                    return print_json(&Vec::<TaskgenOutcome>::new());
                }
                println!("No pending deltas found.");
                return Ok(());
            }
            tracing::info!(count = pending.len(), "found pending deltas");
            pending
        }
    };

    let settings = LlmSettings {
        provider: args.provider,
        base_url: args.base_url,
        api_key: args.api_key,
        model: args.model,
    };
    let client = LazyChatClient::new(settings.client_config(Pipeline::Taskgen)?);
    let opts = TaskgenOptions {
        format: args.format.into(),
        out_dir: args.out_dir,
        plan_only: args.plan,
    };
    let today = chrono::Local::now().date_naive();

    let mut outcomes = Vec::with_capacity(deltas.len());
    for path in &deltas {
        let outcome = taskgen::run(root, &client, path, &opts, today)
            .with_context(|| format!("task generation failed for {}", path.display()))?;
        if !json {
            display(&outcome, opts.plan_only);
        }
        outcomes.push(outcome);
    }
    if json {
        print_json(&outcomes)?;
    }
    Ok(())
}

fn display_impact(imp: &ImpactEntry) {
    let domain = imp.domain.as_deref().map(|d| format!(" [{d}]")).unwrap_or_default();
    println!("  {:10} {}{}", imp.change.change_type, imp.change.target, domain);
    println!("             {}", imp.change.description);
    let ids = |specs: &[specgov_core::markdown::DomainSection]| {
        specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", ")
    };
    if !imp.cmd_specs.is_empty() {
        println!("             Commands: {}", ids(&imp.cmd_specs));
    }
    if !imp.evt_specs.is_empty() {
        println!("             Events: {}", ids(&imp.evt_specs));
    }
    if !imp.br_specs.is_empty() {
        let brs: Vec<&str> = imp
            .br_specs
            .iter()
            .map(|b| b.get("id").and_then(|v| v.as_str()).unwrap_or("?"))
            .collect();
        println!("             BRs: {}", brs.join(", "));
    }
    if !imp.middleware.is_empty() {
        println!("             Middleware: {}", imp.middleware.join(", "));
    }
}

fn display(outcome: &TaskgenOutcome, plan_only: bool) {
    println!();
    rule();
    println!("IMPACT ANALYSIS");
    rule();
    println!("Delta: {} ({})", outcome.delta_id, outcome.delta_file);
    println!("Title: {}", outcome.delta_title);
    println!("Changes: {}", outcome.impacts.len());

    let status_only: Vec<&ImpactEntry> = outcome.impacts.iter().filter(|i| i.status_only).collect();
    if !status_only.is_empty() {
        println!("\nStatus-only changes ({}), skipped:", status_only.len());
        for imp in status_only {
            println!("  {}: {}", imp.change.target, imp.change.description);
        }
    }
    let code: Vec<&ImpactEntry> = outcome.code_impacts().collect();
    if !code.is_empty() {
        println!("\nCode-impacting changes ({}):", code.len());
        for imp in code {
            display_impact(imp);
        }
    }
    rule();

    if plan_only {
        println!("\n[--plan] Impact analysis complete. No LLM call made.");
        return;
    }
    let Some(plan) = &outcome.plan else {
        println!("\nNo code-impacting changes. Nothing to generate.");
        return;
    };

    println!();
    rule();
    println!("TASK PLAN");
    rule();
    println!("Delta: {} ({})", plan.delta_id, plan.delta_title);
    println!("Generated: {}", plan.generation_date);
    println!("Tasks: {}", plan.tasks.len());
    if !plan.summary.is_empty() {
        println!("Summary: {}", plan.summary);
    }

    let mut by_layer: BTreeMap<&str, Vec<&taskgen::Task>> = BTreeMap::new();
    let mut layer_order: Vec<&str> = Vec::new();
    for t in &plan.tasks {
        if !by_layer.contains_key(t.layer.as_str()) {
            layer_order.push(&t.layer);
        }
        by_layer.entry(&t.layer).or_default().push(t);
    }
    for layer in layer_order {
        println!("\n  [{layer}]");
        for t in &by_layer[layer] {
            let deps = if t.depends_on.is_empty() {
                String::new()
            } else {
                format!(" (depends: {})", t.depends_on.join(", "))
            };
            println!("    {}: {}{}", t.task_id, t.title, deps);
            if !t.source_artifacts.is_empty() {
                println!("           sources: {}", t.source_artifacts.join(", "));
            }
        }
    }
    rule();

    if let Some(yaml) = &outcome.yaml {
        println!("\n--- YAML OUTPUT ---");
        println!("{yaml}");
    }
    for file in &outcome.written {
        println!("  wrote {file}");
    }
}
