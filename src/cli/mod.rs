//! CLI module for vidqa.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// vidqa - Ask questions about a video transcript
///
/// Ingests a transcript, indexes it for semantic retrieval and answers
/// questions with a language model grounded in the retrieved passages.
#[derive(Parser, Debug)]
#[command(name = "vidqa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Ingest a transcript file and answer one question about it
    Ask {
        /// Transcript text file
        file: String,

        /// The question to ask
        question: String,

        /// Show the passages the answer was grounded on
        #[arg(short, long)]
        sources: bool,
    },

    /// Ingest a transcript file and show the passages most similar to a query
    Search {
        /// Transcript text file
        file: String,

        /// Search query
        query: String,

        /// Number of passages to return (1-10)
        #[arg(short, long, default_value = "3")]
        k: usize,
    },

    /// Check credentials and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration (secrets are never shown)
    Show,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_k() {
        let cli = Cli::try_parse_from(["vidqa", "-vv", "search", "talk.txt", "neural nets", "-k", "5"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { file, query, k } => {
                assert_eq!(file, "talk.txt");
                assert_eq!(query, "neural nets");
                assert_eq!(k, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["vidqa", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 8000);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_path_with_global_config() {
        let cli = Cli::try_parse_from(["vidqa", "config", "path", "--config", "/tmp/vidqa.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/vidqa.toml"));
        assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Path }));
    }
}
