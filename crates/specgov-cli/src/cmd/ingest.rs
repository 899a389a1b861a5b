use crate::output::{print_json, print_table, rule, truncate};
use anyhow::Context;
use clap::{ArgGroup, Args};
use llm_client::HttpChatClient;
use specgov_core::config::{LlmSettings, Pipeline};
use specgov_core::ingest::{self, IngestOptions, IngestOutcome, IngestionPlan};
use std::path::{Path, PathBuf};

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "file"])))]
pub struct IngestArgs {
    /// Single requirement text (natural language)
    #[arg(long, short = 'i')]
    input: Option<String>,

    /// Input file (.txt as-is; .yaml/.yml with a `requirements` list)
    #[arg(long, short = 'f')]
    file: Option<PathBuf>,

    /// Show the decomposition without writing any files
    #[arg(long)]
    plan: bool,

    /// Log the files that would be written, but do not write them
    #[arg(long)]
    dry_run: bool,

    /// Skip the validation gate
    #[arg(long)]
    skip_validation: bool,

    /// LLM provider: openai or anthropic
    #[arg(long, env = "REQINGEST_LLM_PROVIDER")]
    provider: Option<String>,

    /// API base URL
    #[arg(long, env = "REQINGEST_LLM_BASE_URL")]
    base_url: Option<String>,

    /// API key
    #[arg(long, env = "REQINGEST_LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name
    #[arg(long, env = "REQINGEST_LLM_MODEL")]
    model: Option<String>,
}

pub fn run(root: &Path, args: IngestArgs, json: bool) -> anyhow::Result<()> {
    let text = ingest::read_input(args.input.as_deref(), args.file.as_deref())
        .context("failed to read requirement input")?;
    tracing::info!(input = %truncate(&text, 120), "read requirement");

    let settings = LlmSettings {
        provider: args.provider,
        base_url: args.base_url,
        api_key: args.api_key,
        model: args.model,
    };
    let client = HttpChatClient::new(settings.client_config(Pipeline::Ingest)?)?;

    let opts = IngestOptions {
        plan_only: args.plan,
        dry_run: args.dry_run,
        skip_validation: args.skip_validation,
    };
    let today = chrono::Local::now().date_naive();
    let outcome = ingest::run(root, &client, &text, opts, today)?;

    if json {
        return print_json(&outcome);
    }
    display_plan(&outcome.plan);
    display_result(&outcome, opts);
    Ok(())
}

fn display_plan(plan: &IngestionPlan) {
    println!();
    rule();
    println!("INGESTION PLAN SUMMARY");
    rule();
    println!();
    println!("Input: {}", truncate(&plan.raw_input, 200));
    println!("Delta: {}", plan.delta_title);
    if !plan.delta_rationale.is_empty() {
        println!("Rationale: {}", plan.delta_rationale);
    }

    println!();
    println!("Artifacts ({}):", plan.artifacts.len());
    let rows = plan
        .artifacts
        .iter()
        .map(|a| {
            let label = match a.label() {
                "" => "?",
                l => l,
            };
            vec![a.kind.to_string(), a.id.clone(), label.to_string()]
        })
        .collect();
    print_table(&["KIND", "ID", "TITLE"], rows);

    println!();
    println!("Trace Links ({}):", plan.trace_links.len());
    for link in &plan.trace_links {
        println!("  {} --[{}]--> {}", link.from, link.link_type, link.to);
        if let Some(r) = &link.rationale {
            println!("    {r}");
        }
    }

    let governed = plan.governed().count();
    println!();
    println!("Governed artifacts: {governed} (delta-tracked)");
    println!(
        "Domain artifacts: {} (CMD/EVT in markdown)",
        plan.artifacts.len() - governed
    );
    rule();
}

fn display_result(outcome: &IngestOutcome, opts: IngestOptions) {
    if opts.plan_only {
        println!("\n[--plan] No files written.");
        return;
    }
    if opts.dry_run {
        println!("\n[--dry-run] No files written; validation skipped.");
        return;
    }
    println!();
    for file in &outcome.files {
        println!("  wrote {file}");
    }
    if let (Some(id), Some(file)) = (&outcome.delta_id, &outcome.delta_file) {
        println!("  delta {id} ({file})");
    }
    if outcome.validated {
        println!("\nOK: ingestion complete, validation passed (attempt {})", outcome.attempts);
    } else {
        println!("\nOK: ingestion complete, validation skipped");
    }
}
