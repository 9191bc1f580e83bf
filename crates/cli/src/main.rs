//! Dossier CLI, the main entry point.
//!
//! Commands:
//! - `onboard` writes a default config
//! - `run`     researches a ticker and delivers a report
//! - `status`  reads persisted generation state for a session
//! - `list`    lists sessions in the store
//! - `doctor`  checks config and backend reachability

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "dossier",
    about = "Dossier: multi-producer research and chunked report synthesis",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Research a ticker and deliver a report
    Run {
        /// Ticker symbol, e.g. AAPL
        ticker: String,

        /// Reader expertise from 1 (novice) to 10 (expert)
        #[arg(short, long, default_value_t = 5)]
        expertise: u8,

        /// Session id; defaults to a timestamp
        #[arg(short, long)]
        session: Option<String>,

        /// Generate from artifacts already in the session
        #[arg(long)]
        skip_research: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show generation state for a session
    Status {
        session: String,

        /// Limit to one ticker
        #[arg(short, long)]
        ticker: Option<String>,
    },

    /// List sessions in the store
    List,

    /// Diagnose config and backend health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Run {
            ticker,
            expertise,
            session,
            skip_research,
            json,
        } => {
            commands::run::run(commands::run::RunArgs {
                ticker,
                expertise,
                session,
                skip_research,
                json,
            })
            .await?
        }
        Commands::Status { session, ticker } => commands::status::run(session, ticker).await?,
        Commands::List => commands::list::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
