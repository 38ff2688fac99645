//! Tract-based local embedding pipeline (fallback for musl and Intel Mac).
//!
//! Pure-Rust path: loads the sentence-transformers ONNX export with tract-onnx,
//! tokenizes with the tokenizers crate, mean-pools the last hidden state over
//! the attention mask and L2-normalises. No ONNX Runtime or system deps.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

use super::Embedder;
use crate::config::EmbeddingConfig;

/// Model manifest: name -> (Hugging Face repo, onnx path in repo, tokenizer path in repo).
fn model_manifest(model_name: &str) -> Result<(&'static str, &'static str, &'static str)> {
    match model_name {
        "all-mpnet-base-v2" => Ok((
            "sentence-transformers/all-mpnet-base-v2",
            "onnx/model.onnx",
            "tokenizer.json",
        )),
        "all-minilm-l6-v2" => Ok((
            "sentence-transformers/all-MiniLM-L6-v2",
            "onnx/model.onnx",
            "tokenizer.json",
        )),
        "all-minilm-l12-v2" => Ok((
            "sentence-transformers/all-MiniLM-L12-v2",
            "onnx/model.onnx",
            "tokenizer.json",
        )),
        _ => bail!(
            "Tract backend supports all-mpnet-base-v2, all-minilm-l6-v2 and all-minilm-l12-v2. Requested: '{}'",
            model_name
        ),
    }
}

fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        path.replace(' ', "%20")
    );
    tracing::info!(%url, "downloading model file");
    let resp = reqwest::blocking::get(&url)
        .with_context(|| format!("Download {}", url))?
        .error_for_status()
        .with_context(|| format!("Download {}", url))?;
    let bytes = resp.bytes().context("Read download body")?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent).context("Create model cache directory")?;
    }
    std::fs::write(cache_path, &bytes)
        .with_context(|| format!("Write {}", cache_path.display()))?;
    Ok(())
}

/// Ensure model and tokenizer are in cache; return (onnx path, tokenizer path).
fn ensure_cached(cache_dir: &Path, model_name: &str) -> Result<(PathBuf, PathBuf)> {
    let (repo, onnx_rel, tokenizer_rel) = model_manifest(model_name)?;
    let model_dir = cache_dir.join(model_name);
    let onnx_path = model_dir.join(onnx_rel);
    let tokenizer_path = model_dir.join(tokenizer_rel);
    download_to_cache(repo, onnx_rel, &onnx_path)?;
    download_to_cache(repo, tokenizer_rel, &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path))
}

pub struct TractEmbedder {
    model_name: String,
    dims: usize,
    max_length: usize,
    model: TypedModel,
    input_count: usize,
    tokenizer: tokenizers::Tokenizer,
}

impl TractEmbedder {
    pub fn new(config: &EmbeddingConfig, model_name: String, dims: usize) -> Result<Self> {
        let (onnx_path, tokenizer_path) = ensure_cached(&config.cache_dir(), &model_name)?;
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Load tokenizer {}: {}", tokenizer_path.display(), e))?;

        let model = tract_onnx::onnx()
            .model_for_path(&onnx_path)
            .map_err(|e| anyhow::anyhow!("Load ONNX {}: {}", onnx_path.display(), e))?
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("Optimize: {}", e))?;
        // BERT-style exports take token_type_ids as a third input; MPNet does not.
        let input_count = model
            .input_outlets()
            .map_err(|e| anyhow::anyhow!("Inspect ONNX inputs: {}", e))?
            .len();

        Ok(Self {
            model_name,
            dims,
            max_length: config.max_length,
            model,
            input_count,
            tokenizer,
        })
    }
}

impl Embedder for TractEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let model = self
            .model
            .clone()
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("Build tract runnable: {}", e))?;

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenize: {}", e))?;
        let ids = encoding.get_ids();
        let seq_len = ids.len().clamp(1, self.max_length);

        let mut input_ids = vec![0i64; seq_len];
        let mut attention_mask = vec![0i64; seq_len];
        for (j, &id) in ids.iter().take(seq_len).enumerate() {
            input_ids[j] = id as i64;
            attention_mask[j] = 1;
        }

        let input_ids_t: Tensor = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| anyhow::anyhow!("Input ids shape: {}", e))?
            .into();
        let attention_mask_t: Tensor =
            ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(|e| anyhow::anyhow!("Attention mask shape: {}", e))?
                .into();

        let mut inputs = tvec!(input_ids_t.into(), attention_mask_t.into());
        if self.input_count >= 3 {
            let token_type_ids: Tensor = ndarray::Array2::<i64>::zeros((1, seq_len)).into();
            inputs.push(token_type_ids.into());
        }

        let result = model.run(inputs)?;
        let output = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No output tensor"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| anyhow::anyhow!("Output to array: {}", e))?;

        // [1, seq_len, dims] is last_hidden_state; [1, dims] is an already pooled export.
        let shape = view.shape().to_vec();
        let pooled: Vec<f32> = match shape.as_slice() {
            [1, dims] => view.iter().copied().take(*dims).collect(),
            [1, out_len, dims] => {
                let mut sum = vec![0f32; *dims];
                let mut count = 0f32;
                for j in 0..(*out_len).min(seq_len) {
                    if attention_mask[j] == 0 {
                        continue;
                    }
                    for (k, &v) in view.slice(ndarray::s![0, j, ..]).iter().enumerate() {
                        sum[k] += v;
                    }
                    count += 1.0;
                }
                if count > 0.0 {
                    for x in &mut sum {
                        *x /= count;
                    }
                }
                sum
            }
            _ => bail!("Unexpected output shape: {:?}", shape),
        };

        Ok(normalize_l2(pooled))
    }
}

fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
