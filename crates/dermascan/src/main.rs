//! DermaScan CLI - skin-condition image classification service.
//!
//! Serves a pretrained image classifier over HTTP. Each uploaded photo gets
//! a predicted condition, a confidence percentage, and a description with
//! precautions from a static knowledge base.
//!
//! # Usage
//!
//! ```bash
//! # Start the server (downloads the model on first run)
//! dermascan serve --port 8000
//!
//! # Fetch the model ahead of time
//! dermascan models download
//!
//! # View configuration
//! dermascan config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;
mod server;

/// DermaScan - skin-condition image classification service.
#[derive(Parser, Debug)]
#[command(name = "dermascan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the model and serve the HTTP API
    Serve(cli::serve::ServeArgs),

    /// Manage the classifier model (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// List the conditions the knowledge base describes
    Diseases,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match dermascan_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `dermascan config path`."
            );
            dermascan_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("DermaScan v{}", dermascan_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, &config).await,
        Commands::Diseases => cli::diseases::execute(&config),
    }
}
