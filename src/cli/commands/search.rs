//! Search command implementation.

use super::ask::ingest_file;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::Pipeline;
use crate::session::MAX_SEARCH_K;
use anyhow::{bail, Result};

/// Run the search command.
pub async fn run_search(file: &str, query: &str, k: usize, settings: Settings) -> Result<()> {
    if !(1..=MAX_SEARCH_K).contains(&k) {
        bail!("-k must be between 1 and {}, got {}", MAX_SEARCH_K, k);
    }

    let path = Settings::expand_path(file);
    if let Err(e) = preflight::check(Operation::Query, &settings, Some(&path)) {
        Output::error(&format!("{}", e));
        Output::info("Run 'vidqa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::from_settings(&settings)?;
    ingest_file(&pipeline, path).await?;

    let spinner = Output::spinner("Searching...");
    let results = pipeline.search_similar(query, Some(k)).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) if results.is_empty() => {
            Output::warning("No passages found matching your query.");
        }
        Ok(results) => {
            Output::success(&format!("Found {} passages", results.len()));
            for (rank, result) in results.iter().enumerate() {
                Output::passage(
                    rank + 1,
                    result.document.metadata.get("chunk_index").and_then(|v| v.as_u64()),
                    result.score,
                    &result.document.content,
                );
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
