//! vidqa CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidqa::cli::{commands, Cli, Commands};
use vidqa::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidqa={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Ask {
            file,
            question,
            sources,
        } => {
            commands::run_ask(file, question, *sources, settings).await?;
        }

        Commands::Search { file, query, k } => {
            commands::run_search(file, query, *k, settings).await?;
        }

        Commands::Doctor => {
            let path: PathBuf = config_path.unwrap_or_else(Settings::default_config_path);
            commands::run_doctor(&settings, &path)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
