//! Chromesweep CLI - clean up leaked browser-automation processes
//!
//! A command-line tool for finding and terminating Chrome, Chromium, and
//! ChromeDriver processes left behind by automation runs.
//!
//! Best-effort tool semantics: the exit code is always 0; the report's
//! `success` field carries the real outcome.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chromesweep")]
#[command(author, version, about = "Clean up leaked browser-automation processes")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cleanup session
    Run(commands::run::RunArgs),

    /// List matching processes without killing anything
    #[command(alias = "ls")]
    Scan,

    /// Show the effective persisted configuration
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Engine logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run(args)) => commands::run::run(args, cli.json).await,
        Some(Commands::Scan) => commands::scan::run(cli.json).await,
        Some(Commands::Config) => commands::config::show(cli.json).await,
        // Default action: run a cleanup with persisted settings.
        None => commands::run::run(commands::run::RunArgs::default(), cli.json).await,
    };

    // Always exit 0: cleanup is best-effort and callers read the report.
    if let Err(e) = result {
        eprintln!("chromesweep: {e:#}");
    }

    Ok(())
}
