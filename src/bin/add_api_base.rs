//! # `add-api-base`
//!
//! Walk a Python project and offer to insert
//! `openai.api_base = os.environ.get("OPENAI_API_BASE")` below each file's
//! `openai.api_key` assignment.
//!
//! ```bash
//! add-api-base ./my-project
//! add-api-base ./my-project --dry-run
//! add-api-base ./my-project --config ./herd.toml
//! ```
//!
//! For every spot the operator answers two questions on stdin: whether to open
//! the file in an editor, and whether to insert the line. Exit status is 1 on
//! a usage error, when the path is not a directory, or when "open the file" is
//! requested on a platform without a known opener.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use herd_utils::editor::{SystemEditor, UnsupportedPlatform};
use herd_utils::operator::TerminalOperator;
use herd_utils::patcher::Patcher;
use herd_utils::progress::{JsonProgress, PatchReporter, StdoutProgress};
use herd_utils::{config, logging};

/// Interactively add `openai.api_base` next to `openai.api_key` in a project.
#[derive(Parser)]
#[command(
    name = "add-api-base",
    about = "Interactively add openai.api_base next to openai.api_key in a Python project",
    version
)]
struct Cli {
    /// Project folder to scan recursively.
    project_folder: PathBuf,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report potential spots without prompting or writing.
    #[arg(long)]
    dry_run: bool,

    /// Emit progress as JSON lines instead of the human transcript.
    #[arg(long)]
    json: bool,

    /// Debug logging on stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config_or_default(cli.config.as_deref())?;
    let patcher_cfg = cfg.patcher;

    let mut operator = TerminalOperator::stdio(cli.json);
    let mut editor = SystemEditor::new(&patcher_cfg.editor);
    let progress: Box<dyn PatchReporter> = if cli.json {
        Box::new(JsonProgress)
    } else {
        Box::new(StdoutProgress)
    };

    let summary = Patcher::new(&patcher_cfg, &mut operator, &mut editor, progress.as_ref())
        .dry_run(cli.dry_run)
        .scan_directory(&cli.project_folder)?;
    tracing::debug!(?summary, "patch run finished");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    });
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<UnsupportedPlatform>().is_some() => {
            println!("{}", e);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
