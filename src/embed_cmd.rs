//! The `embed` command: one file in, one vector out.
//!
//! The vector is written to stdout with no trailing newline so callers can
//! capture it verbatim. Diagnostics go through `tracing` on stderr.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;

use crate::embedding::Embedder;

/// Output encoding for the `embed` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// `f1,f2,...,fn`
    #[default]
    Csv,
    /// OpenAI-style embeddings response object.
    Json,
}

/// Read the whole input file as UTF-8 text.
pub fn read_input(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "read input");
    Ok(text)
}

/// Encode `text` and check the vector has the model's dimensionality.
pub fn embed_text(embedder: &mut dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let vector = embedder
        .embed(text)
        .with_context(|| format!("Model '{}' failed to encode input", embedder.model_name()))?;

    if vector.len() != embedder.dims() {
        bail!(
            "Model '{}' returned {} dimensions, expected {}",
            embedder.model_name(),
            vector.len(),
            embedder.dims()
        );
    }

    Ok(vector)
}

/// Join the vector as comma-separated decimals, shortest round-trip form.
pub fn format_csv(vector: &[f32]) -> String {
    vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn format_json(model: &str, vector: &[f32]) -> serde_json::Value {
    serde_json::json!({
        "object": "list",
        "data": [{
            "object": "embedding",
            "index": 0,
            "embedding": vector,
        }],
        "model": model,
    })
}

/// Embed `text` and write the formatted vector to `out` without a trailing newline.
pub fn run_embed(
    embedder: &mut dyn Embedder,
    text: &str,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let vector = embed_text(embedder, text)?;

    let rendered = match format {
        OutputFormat::Csv => format_csv(&vector),
        OutputFormat::Json => format_json(embedder.model_name(), &vector).to_string(),
    };

    out.write_all(rendered.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Deterministic stand-in for a real model: character statistics.
    struct CharStatsEmbedder {
        dims: usize,
        calls: Vec<String>,
    }

    impl Embedder for CharStatsEmbedder {
        fn model_name(&self) -> &str {
            "char-stats"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
            self.calls.push(text.to_string());
            let mut v = vec![0f32; self.dims];
            for (i, b) in text.bytes().enumerate() {
                v[i % self.dims] += b as f32 / 255.0;
            }
            v[0] = -0.25;
            Ok(v)
        }
    }

    struct WrongWidthEmbedder;

    impl Embedder for WrongWidthEmbedder {
        fn model_name(&self) -> &str {
            "wrong-width"
        }
        fn dims(&self) -> usize {
            4
        }
        fn embed(&mut self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 2.0])
        }
    }

    fn input_file(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("input.txt");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_csv_has_dims_tokens_and_no_newline() {
        let mut embedder = CharStatsEmbedder {
            dims: 16,
            calls: Vec::new(),
        };

        let mut out = Vec::new();
        run_embed(
            &mut embedder,
            "first line\nsecond line\n",
            OutputFormat::Csv,
            &mut out,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(!text.starts_with('\n'));
        assert!(!text.ends_with('\n'));
        let tokens: Vec<&str> = text.split(',').collect();
        assert_eq!(tokens.len(), 16);
        for token in tokens {
            token.parse::<f32>().unwrap();
        }
    }

    #[test]
    fn test_whole_file_is_one_text() {
        let dir = TempDir::new().unwrap();
        let path = input_file(&dir, "alpha\nbeta\n\ngamma");
        let mut embedder = CharStatsEmbedder {
            dims: 8,
            calls: Vec::new(),
        };

        let text = read_input(&path).unwrap();
        embed_text(&mut embedder, &text).unwrap();
        assert_eq!(embedder.calls, vec!["alpha\nbeta\n\ngamma".to_string()]);
    }

    #[test]
    fn test_format_csv() {
        assert_eq!(format_csv(&[0.5, -1.0, 0.125]), "0.5,-1,0.125");
        assert_eq!(format_csv(&[]), "");
    }

    #[test]
    fn test_format_json_shape() {
        let json = format_json("all-mpnet-base-v2", &[0.5, 0.25]);
        assert_eq!(json["object"], "list");
        assert_eq!(json["model"], "all-mpnet-base-v2");
        assert_eq!(json["data"][0]["object"], "embedding");
        assert_eq!(json["data"][0]["index"], 0);
        assert_eq!(json["data"][0]["embedding"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_json_output_has_no_newline() {
        let mut embedder = CharStatsEmbedder {
            dims: 4,
            calls: Vec::new(),
        };

        let mut out = Vec::new();
        run_embed(&mut embedder, "hello", OutputFormat::Json, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["model"], "char-stats");
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = TempDir::new().unwrap();
        let err = read_input(&dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let err = embed_text(&mut WrongWidthEmbedder, "text").unwrap_err();
        assert!(err.to_string().contains("returned 2 dimensions, expected 4"));
    }
}
