use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod commands;

#[derive(Parser)]
#[command(
    name = "pubtrack",
    about = "Track publications from PubMed and Scopus",
    long_about = "Searches PubMed and Scopus, stores results in a local database tagged with the search terms that found them, and reports publication trends"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API key for NCBI E-utilities (increases rate limit)
    #[arg(long, env = "NCBI_API_KEY", global = true)]
    api_key: Option<String>,

    /// Email for NCBI requests (recommended)
    #[arg(long, env = "NCBI_EMAIL", global = true)]
    email: Option<String>,

    /// Tool name for NCBI requests
    #[arg(long, env = "NCBI_TOOL", default_value = "pubtrack", global = true)]
    tool: String,

    /// Elsevier API key for Scopus
    #[arg(long, env = "SCOPUS_API_KEY", global = true)]
    scopus_api_key: Option<String>,

    /// Elsevier institutional token
    #[arg(long, env = "SCOPUS_INST_TOKEN", global = true)]
    scopus_inst_token: Option<String>,

    /// SQLite database holding stored publications
    #[arg(
        long,
        env = "PUBTRACK_DATABASE",
        default_value = "publications.db",
        global = true
    )]
    database: PathBuf,

    /// Keep records in memory only
    #[arg(long, global = true)]
    in_memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a provider and store new results
    Search(commands::search::Search),
    /// Fetch (and store) the full abstract of a Scopus document
    Abstract(commands::abstracts::Abstract),
    /// Publication counts per year over the trend window
    Counts(commands::trends::Counts),
    /// Publication counts per type over the trend window
    Types(commands::trends::Types),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let options = commands::TrackerOptions {
        api_key: cli.api_key.clone(),
        email: cli.email.clone(),
        tool: cli.tool.clone(),
        scopus_api_key: cli.scopus_api_key.clone(),
        scopus_inst_token: cli.scopus_inst_token.clone(),
        database: (!cli.in_memory).then(|| cli.database.clone()),
    };
    let tracker = commands::create_tracker(&options)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding requests");
            on_signal.cancel();
        }
    });

    match &cli.command {
        Commands::Search(cmd) => cmd.execute(&tracker, &cancel).await,
        Commands::Abstract(cmd) => cmd.execute(&tracker, &cancel).await,
        Commands::Counts(cmd) => cmd.execute(&tracker, &cancel).await,
        Commands::Types(cmd) => cmd.execute(&tracker, &cancel).await,
    }
}
