use std::sync::Arc;
use tracing::{debug, warn};

use crate::generator::Generator;

/// Outcome of one generation attempt, scoped to a single pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// The model produced a candidate fragment (prefix-stripped, trimmed)
    Candidate(String),
    /// No model is loaded in this process
    Unavailable,
    /// The model was invoked but raised an error
    Failed,
}

/// Wraps the opaque generation capability with the fixed prompting
/// convention. Failures of the underlying model never escape this adapter.
pub struct GenerativeAdapter {
    generator: Option<Arc<dyn Generator>>,
    prompt_prefix: String,
}

impl GenerativeAdapter {
    pub fn new(generator: Option<Arc<dyn Generator>>, prompt_prefix: String) -> Self {
        Self {
            generator,
            prompt_prefix,
        }
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn generate(&self, fragment: &str) -> GenerationResult {
        let Some(generator) = &self.generator else {
            return GenerationResult::Unavailable;
        };

        let prompt = format!("{}{}", self.prompt_prefix, fragment);
        match generator.generate(&prompt).await {
            Ok(raw) => {
                // Some checkpoints echo the task prefix back
                let cleaned = raw
                    .strip_prefix(self.prompt_prefix.trim_end())
                    .unwrap_or(&raw)
                    .trim()
                    .to_string();
                debug!(chars = cleaned.len(), "generation produced a candidate");
                GenerationResult::Candidate(cleaned)
            }
            Err(e) => {
                warn!("generation failed, falling through to heuristics: {e}");
                GenerationResult::Failed
            }
        }
    }
}
