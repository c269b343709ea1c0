pub mod adapter;
pub mod codet5_generator;
pub mod config;
pub mod error;
pub mod gate;
pub mod generator;
pub mod heuristics;
pub mod http;
pub mod pipeline;

use crate::adapter::GenerativeAdapter;
use crate::config::Config;
use crate::error::{MendError, Result};
use crate::gate::QualityGate;
use crate::heuristics::HeuristicEngine;
use crate::pipeline::CorrectionPipeline;

/// Assemble the correction pipeline from configuration: load the model (if
/// present) once and wire it through the adapter, gate, and heuristics.
pub fn build_pipeline(config: &Config) -> Result<CorrectionPipeline> {
    let generator = generator::create_generator(config)?;
    let adapter = GenerativeAdapter::new(generator, config.pipeline.prompt_prefix.clone());
    let gate = QualityGate::new(
        config.pipeline.ratio_min,
        config.pipeline.ratio_max,
        &config.pipeline.bad_patterns,
    )
    .map_err(|e| MendError::Config {
        message: format!("quality gate rejected configuration: {e}"),
    })?;
    Ok(CorrectionPipeline::new(
        adapter,
        gate,
        HeuristicEngine::new(),
    ))
}

/// Load env from .env if present, silently ignoring a missing file.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}
