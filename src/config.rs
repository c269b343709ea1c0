use serde::{Deserialize, Serialize};

use crate::error::{MendError, Result};

/// Main configuration structure loaded from wcag_mend.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub system: SystemConfig,
    pub pipeline: PipelineConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// System-level configuration for the generative model
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    /// Directory containing config.json, tokenizer.json and model.safetensors
    pub model_dir: String,
    pub model_name: String,
}

/// Tunables for the correction pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Task prefix prepended to every fragment before generation
    pub prompt_prefix: String,
    /// Upper bound on generated tokens per fragment
    pub max_new_tokens: usize,
    /// Decoding breadth; 1 collapses to greedy decoding
    pub num_beams: usize,
    /// Lower bound of the accepted candidate/original length ratio (inclusive)
    pub ratio_min: f64,
    /// Upper bound of the accepted candidate/original length ratio (inclusive)
    pub ratio_max: f64,
    /// Patterns that disqualify a generated candidate when reintroduced
    pub bad_patterns: Vec<String>,
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub http_bind: std::net::SocketAddr,
    pub log_level: String,
    /// Fail startup when the model directory cannot be loaded
    pub model_strict: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1:8000"
                .parse()
                .expect("default bind address should parse"),
            log_level: "wcag_mend=info".to_string(),
            model_strict: false,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("WMEND_HTTP_BIND")
            && let Ok(bind) = v.parse::<std::net::SocketAddr>()
        {
            cfg.http_bind = bind;
        }
        cfg.log_level =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wcag_mend=info".to_string());
        if let Ok(strict) = std::env::var("WMEND_MODEL_STRICT") {
            cfg.model_strict = strict == "1" || strict.eq_ignore_ascii_case("true");
        }

        cfg
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system: SystemConfig {
                model_dir: "./models/wcag-codet5".to_string(),
                model_name: "codet5-small".to_string(),
            },
            pipeline: PipelineConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_prefix: "fix wcag: ".to_string(),
            max_new_tokens: 128,
            num_beams: 5,
            ratio_min: 0.5,
            ratio_max: 2.0,
            bad_patterns: vec![r#"role=["']button["']"#.to_string()],
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses WCAG_MEND_CONFIG environment variable or defaults to "wcag_mend.toml".
    pub fn load() -> Result<Self> {
        // Load environment variables from .env if present
        let _ = dotenvy::dotenv();

        let config_path =
            std::env::var("WCAG_MEND_CONFIG").unwrap_or_else(|_| "wcag_mend.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content).map_err(|e| MendError::Config {
                message: format!("failed to parse {config_path}: {e}"),
            })?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        // Env overrides for the model location (env-first)
        if let Ok(dir) = std::env::var("WMEND_MODEL_DIR") {
            config.system.model_dir = dir;
        }
        if let Ok(prefix) = std::env::var("WMEND_PROMPT_PREFIX") {
            config.pipeline.prompt_prefix = prefix;
        }
        if let Some(max) = std::env::var("WMEND_MAX_NEW_TOKENS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.pipeline.max_new_tokens = max;
        }
        if let Some(min) = std::env::var("WMEND_RATIO_MIN")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            config.pipeline.ratio_min = min;
        }
        if let Some(max) = std::env::var("WMEND_RATIO_MAX")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            config.pipeline.ratio_max = max;
        }

        config.runtime = RuntimeConfig::load_from_env();

        config.validate()?;
        Ok(config)
    }

    /// Validate and clamp pipeline tunables
    fn validate(&mut self) -> Result<()> {
        if self.pipeline.num_beams == 0 {
            tracing::warn!("num_beams must be at least 1, clamping to 1");
            self.pipeline.num_beams = 1;
        }
        if self.pipeline.max_new_tokens == 0 {
            return Err(MendError::Config {
                message: "max_new_tokens must be greater than 0".to_string(),
            });
        }
        if self.pipeline.ratio_min <= 0.0 {
            return Err(MendError::Config {
                message: "ratio_min must be greater than 0".to_string(),
            });
        }
        if self.pipeline.ratio_min >= self.pipeline.ratio_max {
            return Err(MendError::Config {
                message: format!(
                    "ratio_min {} must be below ratio_max {}",
                    self.pipeline.ratio_min, self.pipeline.ratio_max
                ),
            });
        }
        for pattern in &self.pipeline.bad_patterns {
            regex::Regex::new(pattern).map_err(|e| MendError::Config {
                message: format!("bad_patterns entry '{pattern}' is invalid: {e}"),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.prompt_prefix, "fix wcag: ");
        assert_eq!(config.pipeline.ratio_min, 0.5);
        assert_eq!(config.pipeline.ratio_max, 2.0);
    }

    #[test]
    fn zero_beams_clamped() {
        let mut config = Config::default();
        config.pipeline.num_beams = 0;
        config.validate().unwrap();
        assert_eq!(config.pipeline.num_beams, 1);
    }

    #[test]
    fn inverted_ratio_band_rejected() {
        let mut config = Config::default();
        config.pipeline.ratio_min = 3.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MendError::Config { .. }));
    }

    #[test]
    fn invalid_bad_pattern_rejected() {
        let mut config = Config::default();
        config.pipeline.bad_patterns = vec!["[".to_string()];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MendError::Config { .. }));
    }
}
