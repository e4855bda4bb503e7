//! Doctor command - verify credentials and configuration.

use crate::cli::Output;
use crate::config::{Settings, VectorStoreProvider, OPENAI_API_KEY_ENV, PINECONE_API_KEY_ENV};
use crate::chunking::RecursiveChunker;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("vidqa Doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let sections = [
        ("API Configuration", check_credentials(settings)),
        ("Vector Store", check_vector_store(settings)),
        ("Configuration", check_configuration(settings, config_path)),
    ];

    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
        }
        println!();
    }

    let checks: Vec<&CheckResult> = sections.iter().flat_map(|(_, c)| c.iter()).collect();
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using vidqa.",
            errors
        ));
        anyhow::bail!("{} doctor check(s) failed", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! vidqa is ready to use.");
    }

    Ok(())
}

fn check_api_key(name: &str, key: Option<&str>, prefix: Option<&str>) -> CheckResult {
    let hint = format!("Set with: export {}='...'", name);
    match key {
        None => CheckResult::error(name, "not set", &hint),
        Some(key) if key.chars().count() > 12 => {
            let head: String = key.chars().take(4).collect();
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            let masked = format!("configured ({}...{})", head, tail);
            match prefix {
                Some(p) if !key.starts_with(p) => CheckResult::warning(
                    name,
                    "set but format looks unusual",
                    &format!("Expected format: {}...", p),
                ),
                _ => CheckResult::ok(name, &masked),
            }
        }
        Some(_) => CheckResult::warning(name, "set but suspiciously short", &hint),
    }
}

fn check_credentials(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![check_api_key(
        OPENAI_API_KEY_ENV,
        settings.credentials.openai_api_key.as_deref(),
        Some("sk-"),
    )];

    if settings.vector_store.provider == VectorStoreProvider::Pinecone {
        results.push(check_api_key(
            PINECONE_API_KEY_ENV,
            settings.credentials.pinecone_api_key.as_deref(),
            None,
        ));
    }

    results
}

fn check_vector_store(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match settings.vector_store.provider {
        VectorStoreProvider::Memory => results.push(CheckResult::ok(
            "Backend",
            "memory (ephemeral, lost on restart)",
        )),
        VectorStoreProvider::Pinecone => {
            results.push(CheckResult::ok("Backend", "pinecone (persistent)"));
            match settings.index_name() {
                Some(name) => results.push(CheckResult::ok(
                    "Index",
                    &format!(
                        "{} ({}/{})",
                        name, settings.vector_store.cloud, settings.vector_store.region
                    ),
                )),
                None => results.push(CheckResult::error(
                    "Index",
                    "no index name configured",
                    "Set vector_store.index_name or VIDQA_INDEX_NAME",
                )),
            }
        }
    }

    if settings.vector_store.top_k == 0 {
        results.push(CheckResult::error(
            "top_k",
            "must be greater than 0",
            "Set vector_store.top_k or VIDQA_TOP_K",
        ));
    } else {
        results.push(CheckResult::ok("top_k", &settings.vector_store.top_k.to_string()));
    }

    results
}

fn check_configuration(settings: &Settings, config_path: &Path) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if config_path.exists() {
        results.push(CheckResult::ok("Config file", &format!("{}", config_path.display())));
    } else {
        results.push(CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: vidqa config init",
        ));
    }

    match RecursiveChunker::new(settings.chunking.chunk_size, settings.chunking.chunk_overlap) {
        Ok(chunker) => results.push(CheckResult::ok(
            "Chunking",
            &format!(
                "{} chars, {} overlap",
                chunker.chunk_size(),
                chunker.chunk_overlap()
            ),
        )),
        Err(e) => results.push(CheckResult::error(
            "Chunking",
            &e.to_string(),
            "chunk_overlap must be smaller than chunk_size",
        )),
    }

    results.push(CheckResult::ok(
        "Models",
        &format!("{} / {}", settings.llm.model, settings.embedding.model),
    ));

    match settings.validate() {
        Ok(()) => results.push(CheckResult::ok("Settings", "valid")),
        Err(e) => results.push(CheckResult::error(
            "Settings",
            &e.to_string(),
            "Fix the reported setting and run 'vidqa doctor' again",
        )),
    }

    results
}
