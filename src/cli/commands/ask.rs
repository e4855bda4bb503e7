//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{IngestSource, Pipeline};
use anyhow::Result;
use std::path::PathBuf;

/// Run the ask command.
pub async fn run_ask(file: &str, question: &str, show_sources: bool, settings: Settings) -> Result<()> {
    let path = Settings::expand_path(file);

    if let Err(e) = preflight::check(Operation::Query, &settings, Some(&path)) {
        Output::error(&format!("{}", e));
        Output::info("Run 'vidqa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::from_settings(&settings)?;
    ingest_file(&pipeline, path).await?;

    let spinner = Output::spinner("Thinking...");
    let response = pipeline.query_with_sources(question).await;
    spinner.finish_and_clear();

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    };

    println!("\n{}\n", response.answer);

    if show_sources {
        Output::header("Sources");
        for (rank, result) in response.sources.iter().enumerate() {
            Output::passage(
                rank + 1,
                result.document.metadata.get("chunk_index").and_then(|v| v.as_u64()),
                result.score,
                &result.document.content,
            );
        }
    }

    Ok(())
}

/// Ingest a transcript file into a fresh pipeline, reporting progress.
pub(super) async fn ingest_file(pipeline: &Pipeline, path: PathBuf) -> Result<usize> {
    let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
    let result = pipeline.ingest(IngestSource::File(path)).await;
    spinner.finish_and_clear();

    match result {
        Ok(chunks) => {
            Output::success(&format!(
                "Indexed {} chunks ({} backend)",
                chunks,
                pipeline.backend()
            ));
            Ok(chunks)
        }
        Err(e) => {
            Output::error(&format!("{}", e));
            Err(e.into())
        }
    }
}
