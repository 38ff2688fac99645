//! TOML configuration shared by the `embed` and `add-api-base` binaries.
//!
//! Both binaries run without a config file. When `--config` is given, the file
//! must exist and parse; missing tables and keys fall back to the defaults
//! below.

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub patcher: PatcherConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the dimensionality looked up from the model name.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Where downloaded model files are kept. Defaults to `~/.cache/herd-utils/models`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub show_download_progress: bool,
    /// Token limit applied by the tract backend before inference.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            dims: None,
            cache_dir: None,
            show_download_progress: false,
            max_length: default_max_length(),
        }
    }
}

fn default_model() -> String {
    "all-mpnet-base-v2".to_string()
}
fn default_max_length() -> usize {
    384
}

impl EmbeddingConfig {
    /// Resolved model cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(base)
            .join(".cache")
            .join("herd-utils")
            .join("models")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatcherConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Substring that marks the line to patch after.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Substring proving a file has already been patched.
    #[serde(default = "default_companion_marker")]
    pub companion_marker: String,
    /// Line inserted after the marker, without indentation or line ending.
    #[serde(default = "default_insert_line")]
    pub insert_line: String,
    #[serde(default)]
    pub editor: EditorConfig,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            marker: default_marker(),
            companion_marker: default_companion_marker(),
            insert_line: default_insert_line(),
            editor: EditorConfig::default(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.py".to_string()]
}
fn default_marker() -> String {
    "openai.api_key".to_string()
}
fn default_companion_marker() -> String {
    "openai.api_base".to_string()
}
fn default_insert_line() -> String {
    r#"openai.api_base = os.environ.get("OPENAI_API_BASE")"#.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    /// Editor launched first for every "open file" request. Empty disables it.
    #[serde(default = "default_editor_command")]
    pub command: Option<String>,
    /// Replaces the platform opener (`open` / `start`). The file path is appended.
    #[serde(default)]
    pub open_command: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: default_editor_command(),
            open_command: Vec::new(),
        }
    }
}

fn default_editor_command() -> Option<String> {
    Some("code".to_string())
}

/// Load the config file at `path`, or the defaults when no path is given.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.max_length == 0 {
        bail!("embedding.max_length must be > 0");
    }

    let patcher = &config.patcher;
    if patcher.marker.is_empty() {
        bail!("patcher.marker must not be empty");
    }
    if patcher.companion_marker.is_empty() {
        bail!("patcher.companion_marker must not be empty");
    }
    if patcher.insert_line.trim().is_empty() {
        bail!("patcher.insert_line must not be empty");
    }
    if patcher.include_globs.is_empty() {
        bail!("patcher.include_globs must list at least one pattern");
    }
    for pattern in patcher.include_globs.iter().chain(&patcher.exclude_globs) {
        Glob::new(pattern).with_context(|| format!("Invalid glob in patcher config: {}", pattern))?;
    }

    Ok(())
}
