//! Wallet Exposure Probe - shows which wallet accounts an embedded frame can read
//!
//! Every context here is simulated in-process; no browser is involved.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

// Use the library crate
use wallet_exposure_probe::cli::commands;
use wallet_exposure_probe::config::Config;

/// Wallet Exposure Probe - cross-context wallet account leak demo
#[derive(Parser)]
#[command(name = "wallet-probe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a page with an embedded tracker frame and log exposure summaries
    Demo {
        /// How long to keep the trackers running
        #[arg(short, long, default_value = "12")]
        duration_secs: u64,

        /// Probe the top-level page once more before exiting
        #[arg(long)]
        manual_rerun: bool,
    },

    /// Discover and probe wallets once in a simulated context, print the report
    Discover {
        /// Probe from inside the tracker frame instead of the top-level page
        #[arg(long)]
        frame: bool,

        /// Label recorded in the report
        #[arg(long, default_value = "manual")]
        label: String,
    },

    /// Show current configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(
        "wallet_exposure_probe=info"
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Demo {
            duration_secs,
            manual_rerun,
        } => commands::demo(&config, duration_secs, manual_rerun).await,
        Commands::Discover { frame, label } => commands::discover(&config, frame, &label).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
