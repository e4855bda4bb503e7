//! Context formatting for RAG prompts and display.

use crate::vector_store::SearchResult;

/// Separator placed between retrieved passages in a prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join retrieved passages in rank order for the prompt's context section.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.document.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Format retrieved passages for display to the user.
pub fn format_sources_for_display(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let location = r
                .document
                .metadata
                .get("chunk_index")
                .and_then(|v| v.as_u64())
                .map(|idx| format!(" (chunk {})", idx))
                .unwrap_or_default();

            format!(
                "[{}]{} score: {:.2}\n{}",
                i + 1,
                location,
                r.score,
                r.document.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
