//! Threadwise CLI — the main entry point.
//!
//! Commands:
//! - `remember`   — Store a memory in a session
//! - `pin`/`unpin` — Toggle a memory's pinned flag
//! - `summarize`  — Store a session summary
//! - `assemble`   — Assemble the next context for a session
//! - `inspect`    — Show a saved context and its debug trail
//! - `trace`      — Attach a trace id to a saved context
//! - `config`     — Show configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "threadwise",
    about = "Threadwise — deterministic context assembly for LLM conversations",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.threadwise/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a memory in a session
    Remember {
        /// Session the memory belongs to
        #[arg(short, long)]
        session: String,

        /// Memory text
        content: String,

        /// Author role (user, assistant, system, tool)
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Memory type (message, fact, tool_output, summary, rag_result, system, agent_state)
        #[arg(short = 't', long = "type", default_value = "message")]
        memory_type: String,

        /// Priority 0–100
        #[arg(short, long, default_value_t = 50)]
        priority: u8,

        /// Pin the memory immediately
        #[arg(long)]
        pinned: bool,

        /// Token count; estimated from the content when omitted
        #[arg(long)]
        tokens: Option<usize>,

        /// Explicit memory id
        #[arg(long)]
        id: Option<String>,
    },

    /// Pin a memory so it is gathered as a pinned fact
    Pin {
        /// Memory id
        id: String,
    },

    /// Unpin a memory
    Unpin {
        /// Memory id
        id: String,
    },

    /// Store a summary for a session
    Summarize {
        #[arg(short, long)]
        session: String,

        /// Summary text
        summary: String,
    },

    /// Assemble the next context for a session and print it as JSON
    Assemble {
        #[arg(short, long)]
        session: String,

        /// The current user message
        #[arg(short, long)]
        message: String,

        /// Model id recorded on the context
        #[arg(long)]
        model: Option<String>,

        /// Token budget
        #[arg(short, long)]
        budget: Option<usize>,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Enable retrieval from this source (repeatable)
        #[arg(long = "rag-source")]
        rag_sources: Vec<String>,

        /// Skip the session summary
        #[arg(long)]
        no_summary: bool,
    },

    /// Show a saved context
    Inspect {
        /// Context id
        id: String,

        /// Print the raw JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Attach a trace id to a saved context
    Trace {
        /// Context id
        context_id: String,

        /// Trace id from your observability system
        trace_id: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the default configuration
    Default,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Remember {
            session,
            content,
            role,
            memory_type,
            priority,
            pinned,
            tokens,
            id,
        } => {
            let args = commands::memory::RememberArgs {
                session,
                content,
                role,
                memory_type,
                priority,
                pinned,
                tokens,
                id,
            };
            commands::memory::remember(config_path, args).await?
        }
        Commands::Pin { id } => commands::memory::set_pinned(config_path, &id, true).await?,
        Commands::Unpin { id } => commands::memory::set_pinned(config_path, &id, false).await?,
        Commands::Summarize { session, summary } => {
            commands::memory::summarize(config_path, &session, &summary).await?
        }
        Commands::Assemble {
            session,
            message,
            model,
            budget,
            system,
            rag_sources,
            no_summary,
        } => {
            let args = commands::context::AssembleArgs {
                session,
                message,
                model,
                budget,
                system,
                rag_sources,
                no_summary,
            };
            commands::context::assemble(config_path, args).await?
        }
        Commands::Inspect { id, json } => commands::context::inspect(config_path, &id, json).await?,
        Commands::Trace {
            context_id,
            trace_id,
        } => commands::context::trace(config_path, &context_id, &trace_id).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Default => commands::config_cmd::default()?,
            ConfigAction::Path => commands::config_cmd::path(config_path)?,
        },
    }

    Ok(())
}
