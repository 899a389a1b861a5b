mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specgov",
    about = "Specification governance: validate the spec graph, ingest requirements, generate tasks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from specs/ or .git/)
    #[arg(long, global = true, env = "SPECGOV_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Defaults to `validate`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every spec file, trace link, delta and registry (fail-fast)
    Validate,

    /// Decompose free-text requirements into spec artifacts via an LLM
    Ingest(cmd::ingest::IngestArgs),

    /// Generate implementation tasks from pending deltas via an LLM
    Taskgen(cmd::taskgen::TaskgenArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        None | Some(Commands::Validate) => tracing::Level::WARN,
        Some(_) => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        None | Some(Commands::Validate) => cmd::validate::run(&root, cli.json),
        Some(Commands::Ingest(args)) => cmd::ingest::run(&root, args, cli.json),
        Some(Commands::Taskgen(args)) => cmd::taskgen::run(&root, args, cli.json),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {e:#}");
        std::process::exit(1);
    }
}
