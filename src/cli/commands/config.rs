//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                Output::warning(&format!(
                    "Config already exists at {}. Use --force to overwrite.",
                    config_path.display()
                ));
                return Ok(());
            }
            settings.save_to(&config_path)?;
            Output::success(&format!("Wrote config to {}", config_path.display()));
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.chunking.chunk_size = 500;
        settings.credentials.openai_api_key = Some("sk-secret".to_string());

        run_config(&ConfigAction::Init { force: false }, settings, Some(path.clone())).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("chunk_size = 500"));
        assert!(!written.contains("sk-secret"));
    }

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "# keep me\n").unwrap();

        run_config(
            &ConfigAction::Init { force: false },
            Settings::default(),
            Some(file.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "# keep me\n");
    }
}
