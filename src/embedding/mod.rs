//! Local sentence-embedding backends.
//!
//! Defines the [`Embedder`] trait and the local implementations selected at
//! compile time:
//! - **fastembed** (`local-embeddings-fastembed`, default): ONNX Runtime bundled
//!   by fastembed; models download from Hugging Face on first use.
//! - **tract** (`local-embeddings-tract`): pure-Rust ONNX inference for musl and
//!   Intel Mac, see `local_tract`.
//!
//! The default model is `all-mpnet-base-v2` (768 dimensions). Use
//! [`create_embedder`] to build the backend for a configuration:
//!
//! ```rust,no_run
//! # use herd_utils::config::EmbeddingConfig;
//! # use herd_utils::embedding::create_embedder;
//! let config = EmbeddingConfig::default();
//! let mut embedder = create_embedder(&config).unwrap();
//! let vector = embedder.embed("hello world").unwrap();
//! assert_eq!(vector.len(), embedder.dims());
//! ```

#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use anyhow::{bail, Result};

use crate::config::EmbeddingConfig;

/// Something that turns text into a fixed-length vector.
///
/// The model itself is opaque: implementations load it however they like and
/// only promise that every vector has [`dims`](Embedder::dims) elements.
pub trait Embedder {
    /// Short model identifier (e.g. `"all-mpnet-base-v2"`).
    fn model_name(&self) -> &str;
    /// Length of every vector returned by [`embed`](Embedder::embed).
    fn dims(&self) -> usize;
    /// Encode one text.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;
}

/// Model names accepted by the local backends, with their output dimensionality.
pub const SUPPORTED_MODELS: &[(&str, usize)] = &[
    ("all-mpnet-base-v2", 768),
    ("all-minilm-l6-v2", 384),
    ("all-minilm-l12-v2", 384),
    ("paraphrase-multilingual-mpnet-base-v2", 768),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("bge-large-en-v1.5", 1024),
    ("nomic-embed-text-v1.5", 768),
];

/// Resolve the configured model name and its dimensionality.
///
/// `embedding.dims` wins over the table so a custom export with a different
/// width can still be checked.
pub fn resolve_local_model(config: &EmbeddingConfig) -> Result<(String, usize)> {
    let model_name = config.model.trim().to_lowercase();
    let known = SUPPORTED_MODELS
        .iter()
        .find(|(name, _)| *name == model_name)
        .map(|(_, dims)| *dims);

    let Some(table_dims) = known else {
        bail!(
            "Unknown local embedding model: '{}'. Supported models: {}",
            config.model,
            supported_model_names()
        );
    };

    Ok((model_name, config.dims.unwrap_or(table_dims)))
}

fn supported_model_names() -> String {
    SUPPORTED_MODELS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the local embedder compiled into this binary.
///
/// # Errors
///
/// Returns an error for unknown model names, when the model cannot be
/// downloaded or loaded, or when no local backend feature is enabled.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let (model_name, dims) = resolve_local_model(config)?;
    tracing::debug!(model = %model_name, dims, "loading embedding model");

    build_local(config, model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn build_local(
    config: &EmbeddingConfig,
    model_name: String,
    dims: usize,
) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FastembedEmbedder::new(config, model_name, dims)?))
}

#[cfg(all(
    feature = "local-embeddings-tract",
    not(feature = "local-embeddings-fastembed")
))]
fn build_local(
    config: &EmbeddingConfig,
    model_name: String,
    dims: usize,
) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(local_tract::TractEmbedder::new(
        config, model_name, dims,
    )?))
}

#[cfg(not(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
)))]
fn build_local(
    _config: &EmbeddingConfig,
    _model_name: String,
    _dims: usize,
) -> Result<Box<dyn Embedder>> {
    bail!(
        "Local embeddings require one of: --features local-embeddings-fastembed, --features local-embeddings-tract"
    )
}

// ============ fastembed backend ============

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-mpnet-base-v2" => Ok(fastembed::EmbeddingModel::AllMpnetBaseV2),
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "paraphrase-multilingual-mpnet-base-v2" => {
            Ok(fastembed::EmbeddingModel::ParaphraseMLMpnetBaseV2)
        }
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: {}",
            other,
            supported_model_names()
        ),
    }
}

/// Runs a fastembed [`TextEmbedding`](fastembed::TextEmbedding) in-process.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct FastembedEmbedder {
    model_name: String,
    dims: usize,
    model: fastembed::TextEmbedding,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl FastembedEmbedder {
    pub fn new(config: &EmbeddingConfig, model_name: String, dims: usize) -> Result<Self> {
        let fastembed_model = config_to_fastembed_model(&model_name)?;
        let cache_dir = config.cache_dir();

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(config.show_download_progress),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

        Ok(Self {
            model_name,
            dims,
            model,
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
impl Embedder for FastembedEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self
            .model
            .embed(vec![text], None)
            .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}
