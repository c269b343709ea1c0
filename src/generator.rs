use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{MendError, Result};

/// Capability implemented by anything that can turn a prompted fragment into
/// corrected markup. The pipeline only ever sees this trait, so tests can
/// substitute a deterministic stand-in.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

impl std::fmt::Debug for dyn Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Generator")
    }
}

/// Create the process-wide generator from configuration, if possible.
///
/// Returns `Ok(None)` when no model is present on disk; the pipeline then
/// degrades to heuristics-only operation. With WMEND_MODEL_STRICT set,
/// a missing or broken model is a startup error instead.
pub fn create_generator(config: &Config) -> Result<Option<Arc<dyn Generator>>> {
    let model_dir = Path::new(&config.system.model_dir);
    if !model_dir.is_dir() {
        if config.runtime.model_strict {
            return Err(MendError::Model {
                message: format!(
                    "model directory {} not found and WMEND_MODEL_STRICT is set",
                    config.system.model_dir
                ),
            });
        }
        warn!(
            "Model directory {} not found; running heuristics-only",
            config.system.model_dir
        );
        return Ok(None);
    }

    match crate::codet5_generator::CodeT5Generator::new(
        model_dir,
        config.pipeline.max_new_tokens,
        config.pipeline.num_beams,
    ) {
        Ok(g) => {
            info!(
                "Loaded generative model '{}' from {}",
                config.system.model_name, config.system.model_dir
            );
            Ok(Some(Arc::new(g)))
        }
        Err(e) if config.runtime.model_strict => Err(MendError::Model {
            message: format!("failed to load generative model: {e:#}"),
        }),
        Err(e) => {
            warn!("Failed to load generative model: {e}; running heuristics-only");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_missing_model() -> Config {
        let mut config = Config::default();
        config.system.model_dir = "/nonexistent/model-dir".to_string();
        config
    }

    #[test]
    fn missing_model_degrades_to_none() {
        let generator = create_generator(&config_with_missing_model()).unwrap();
        assert!(generator.is_none());
    }

    #[test]
    fn strict_mode_makes_missing_model_fatal() {
        let mut config = config_with_missing_model();
        config.runtime.model_strict = true;
        let err = create_generator(&config).unwrap_err();
        assert!(matches!(err, MendError::Model { .. }));
    }
}
