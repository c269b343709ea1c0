use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

use crate::generator::Generator;

/// Local CodeT5 (T5 seq2seq) generator running on candle.
///
/// The kv-cache makes decoding stateful, so concurrent callers are
/// serialized behind a mutex; the model weights themselves are loaded once
/// and never change after startup.
pub struct CodeT5Generator {
    model: Mutex<t5::T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    config: t5::Config,
    device: Device,
    max_new_tokens: usize,
    num_beams: usize,
}

impl CodeT5Generator {
    pub fn new(model_dir: &Path, max_new_tokens: usize, num_beams: usize) -> Result<Self> {
        let device = Device::Cpu;

        // Load tokenizer
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        // Load model config
        let config_path = model_dir.join("config.json");
        let config_str =
            std::fs::read_to_string(&config_path).context("Failed to read config.json")?;
        let config: t5::Config =
            serde_json::from_str(&config_str).context("Failed to parse config.json")?;

        // Load model weights
        let weights_path = model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };

        let model = t5::T5ForConditionalGeneration::load(vb, &config)?;

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            config,
            device,
            max_new_tokens,
            num_beams: num_beams.max(1),
        })
    }

    fn run(&self, prompt: &str) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let input_token_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("generator mutex poisoned"))?;
        model.clear_kv_cache();
        let encoder_output = model.encode(&input_token_ids)?;

        // Greedy (argmax) decoding: reproducible across calls. Beam widths
        // above 1 currently collapse to greedy.
        tracing::trace!(num_beams = self.num_beams, "decoding greedily");
        let mut logits_processor = LogitsProcessor::new(0, None, None);
        let start_token = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;
        let mut output_token_ids = vec![start_token];

        for step in 0..self.max_new_tokens {
            let decoder_token_ids = if step == 0 || !self.config.use_cache {
                Tensor::new(output_token_ids.as_slice(), &self.device)?.unsqueeze(0)?
            } else {
                let last = *output_token_ids.last().expect("at least the start token");
                Tensor::new(&[last], &self.device)?.unsqueeze(0)?
            };
            let logits = model
                .decode(&decoder_token_ids, &encoder_output)?
                .squeeze(0)?;
            let next_token_id = logits_processor.sample(&logits)?;
            if next_token_id as usize == self.config.eos_token_id {
                break;
            }
            output_token_ids.push(next_token_id);
        }

        let text = self
            .tokenizer
            .decode(&output_token_ids[1..], true)
            .map_err(|e| anyhow::anyhow!("Detokenization failed: {}", e))?;
        Ok(text)
    }
}

#[async_trait]
impl Generator for CodeT5Generator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        // Inference is CPU-bound and blocks the calling task for its duration.
        self.run(prompt)
    }
}
