//! # `embed`
//!
//! Print the sentence embedding of a text file.
//!
//! ```bash
//! embed ./input.txt                  # 0.0123,-0.0456,...  (no trailing newline)
//! embed ./input.txt --format json    # {"object":"list","data":[...],"model":"..."}
//! embed ./input.txt --model all-minilm-l6-v2
//! ```
//!
//! Exits non-zero when the file cannot be read or the model fails to load or
//! encode.

use clap::Parser;
use std::path::PathBuf;

use herd_utils::embed_cmd::{self, OutputFormat};
use herd_utils::{config, embedding, logging};

/// Print the embedding vector of a text file as comma-separated floats.
#[derive(Parser)]
#[command(
    name = "embed",
    about = "Print the sentence embedding of a text file as comma-separated floats",
    version
)]
struct Cli {
    /// Text file whose full contents are embedded as one input.
    input: PathBuf,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local model to use instead of `embedding.model` (e.g. `all-minilm-l6-v2`).
    #[arg(long)]
    model: Option<String>,

    /// Output encoding.
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Debug logging on stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    });
    logging::init(cli.verbose);

    let mut cfg = config::load_config_or_default(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        cfg.embedding.model = model;
    }

    // Read first so a bad path fails before any model download.
    let text = embed_cmd::read_input(&cli.input)?;
    let mut embedder = embedding::create_embedder(&cfg.embedding)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    embed_cmd::run_embed(embedder.as_mut(), &text, cli.format, &mut out)
}
