//! Conductor CLI — command-line interface for the workflow scheduling engine.

use clap::{Parser, Subcommand};
use conductor_cli::commands;

/// Conductor — schedule multi-step workflows across worker agents
#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Conductor — schedule multi-step workflows across worker agents"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate or run workflow definition files
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Send a raw JSON-RPC request against fresh in-memory state
    Rpc {
        /// JSON-RPC method name (e.g. "workflows.validate")
        #[arg(long)]
        method: String,
        /// JSON-RPC params as a JSON string
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Serve JSON-RPC over stdio; dispatches are sent as `steps.dispatch` notifications
    Serve,
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Check a workflow file for duplicate ids, unknown dependencies and cycles
    Validate {
        /// Path to the workflow YAML/JSON file
        file: String,
    },

    /// Run a workflow on a simulated local worker pool
    Run {
        /// Path to the workflow YAML/JSON file
        file: String,
        /// Agent roster file (YAML/JSON list)
        #[arg(long, env = "CONDUCTOR_AGENTS")]
        agents: String,
        /// Step id whose worker reports failure (repeatable)
        #[arg(long = "fail-step")]
        fail_steps: Vec<String>,
        /// Simulated per-step latency in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor_core=warn,conductor_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Workflow { action } => match action {
            WorkflowAction::Validate { file } => commands::workflow::validate(&file).await,
            WorkflowAction::Run {
                file,
                agents,
                fail_steps,
                latency_ms,
            } => commands::workflow::run(&file, &agents, &fail_steps, latency_ms).await,
        },

        Commands::Rpc { method, params } => commands::rpc::call(&method, &params).await,

        Commands::Serve => commands::serve::run().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
