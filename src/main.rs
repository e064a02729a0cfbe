mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vigil::config::VigilConfig;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Daily accountability check-in MCP server")]
struct Cli {
    /// Config file (defaults to ~/.vigil/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Show a user's streak and today's check-in state
    Status { user_id: String },
    /// List recent check-ins
    History {
        user_id: String,
        #[arg(long, default_value_t = 14)]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Spend a streak shield to cover yesterday
    Shield { user_id: String },
    /// Correct one checklist answer of a past check-in
    Correct {
        user_id: String,
        /// Check-in date (YYYY-MM-DD)
        date: String,
        /// Checklist item key, e.g. deep_work
        item: String,
        /// Mark the item as not done
        #[arg(long)]
        no: bool,
        #[arg(long)]
        detail: Option<String>,
    },
    /// Clear idle and closed sessions
    Sweep,
    /// Run database diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user
    Add {
        user_id: String,
        /// IANA time zone, e.g. Europe/Berlin
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => VigilConfig::load_from(path)?,
        None => VigilConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve_stdio(config).await?;
        }
        Command::User { action } => match action {
            UserAction::Add {
                user_id,
                timezone,
                name,
            } => cli::user::add(&config, &user_id, timezone.as_deref(), name.as_deref())?,
        },
        Command::Status { user_id } => cli::status::status(&config, &user_id)?,
        Command::History {
            user_id,
            limit,
            json,
        } => cli::history::history(&config, &user_id, limit, json)?,
        Command::Shield { user_id } => cli::shield::shield(&config, &user_id)?,
        Command::Correct {
            user_id,
            date,
            item,
            no,
            detail,
        } => cli::correct::correct(&config, &user_id, &date, &item, !no, detail.as_deref())?,
        Command::Sweep => cli::sweep::sweep(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
