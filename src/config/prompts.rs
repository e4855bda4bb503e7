//! Prompt templates for vidqa.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompt for answering a question from retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// Template with `{{context}}` and `{{question}}` placeholders.
    pub template: String,
}

/// Phrase the model is told to answer with when the context is insufficient.
pub const FALLBACK_ANSWER: &str = "I don't know";

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            template: r#"Answer the question based on the context below. If you can't
answer the question, reply "I don't know".

Context: {{context}}

Question: {{question}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are filled in a single left-to-right pass, so inserted
    /// values are never scanned for further placeholders. Unknown
    /// placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            result.push_str(&rest[..open]);
            let after = &rest[open + 2..];

            let Some(close) = after.find("}}") else {
                result.push_str(&rest[open..]);
                return result;
            };

            let name = &after[..close];
            if name.contains("{{") {
                result.push_str("{{");
                rest = after;
                continue;
            }

            match vars.get(name) {
                Some(value) => result.push_str(value),
                None => {
                    result.push_str("{{");
                    result.push_str(name);
                    result.push_str("}}");
                }
            }
            rest = &after[close + 2..];
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Render the question-answering prompt.
    pub fn render_rag(&self, context: &str, question: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context.to_string());
        vars.insert("question".to_string(), question.to_string());
        self.render_with_custom(&self.rag.template, &vars)
    }
}
