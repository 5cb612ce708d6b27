//! Conductor CLI: run and inspect declarative agent workflows.

use clap::{Parser, Subcommand};

use conductor_cli::commands;
use conductor_cli::commands::run::RunOptions;

/// Conductor: multi-agent workflow orchestration
#[derive(Parser)]
#[command(name = "conductor", version, about = "Conductor: multi-agent workflow orchestration")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow against a query
    Run {
        /// Path to the workflow YAML file
        config: String,
        /// The query handed to the workflow
        #[arg(long, short = 'q')]
        query: String,
        /// Workflow id (generated when omitted)
        #[arg(long, env = "CONDUCTOR_WORKFLOW_ID")]
        workflow_id: Option<String>,
        /// Restore the stored snapshot of --workflow-id before executing
        #[arg(long, requires = "workflow_id")]
        resume: bool,
        /// Print the full execution result as JSON
        #[arg(long)]
        json: bool,
        /// Enable debug logging
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Validate a workflow YAML file without executing it
    Validate {
        /// Path to the workflow YAML file
        config: String,
    },

    /// Inspect stored workflow memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Summarize a stored snapshot
    Show {
        /// Workflow id
        workflow_id: String,
        /// Snapshot directory
        #[arg(long, default_value = "memory")]
        dir: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    let default_filter = if verbose {
        "conductor_core=debug,conductor_cli=debug"
    } else {
        "conductor_core=info,conductor_cli=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            query,
            workflow_id,
            resume,
            json,
            verbose: _,
        } => {
            let options = RunOptions {
                workflow_id,
                resume,
                json,
            };
            commands::run::run(&config, &query, options).await
        }
        Commands::Validate { config } => commands::validate::validate(&config),
        Commands::Memory { action } => match action {
            MemoryAction::Show { workflow_id, dir } => commands::memory::show(&workflow_id, &dir),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
