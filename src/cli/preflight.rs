//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and configuration are usable before starting
//! operations that would otherwise fail midway through an ingest.

use crate::config::Settings;
use crate::error::Result;
use std::path::Path;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Serving requires valid settings.
    Serve,
    /// One-shot ask or search requires valid settings and a readable transcript.
    Query,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings, transcript: Option<&Path>) -> Result<()> {
    settings.validate()?;

    if let (Operation::Query, Some(path)) = (operation, transcript) {
        check_transcript(path)?;
    }
    Ok(())
}

fn check_transcript(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(crate::error::VidqaError::InvalidInput(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(())
}
