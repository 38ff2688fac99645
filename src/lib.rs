//! # herd-utils
//!
//! Two small command-line tools around a local OpenAI-compatible LLM setup.
//!
//! - **`embed`** loads a local sentence-embedding model (all-mpnet-base-v2 by
//!   default) and prints the embedding of a text file as `f1,f2,...,fn`.
//! - **`add-api-base`** walks a Python project and, with the operator's
//!   consent, inserts `openai.api_base = os.environ.get("OPENAI_API_BASE")`
//!   below each file's `openai.api_key` assignment so the project can be
//!   pointed at a local server.
//!
//! ## Quick Start
//!
//! ```bash
//! embed ./prompt.txt > vector.csv
//! embed ./prompt.txt --format json
//! add-api-base ./my-project
//! add-api-base ./my-project --dry-run
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Local embedding backends |
//! | [`embed_cmd`] | File-to-vector command |
//! | [`patcher`] | Directory walk and per-file patch state machine |
//! | [`operator`] | Yes/no decisions from the terminal or a script |
//! | [`editor`] | Opening files in an external editor |
//! | [`progress`] | Patcher progress events |
//! | [`logging`] | `tracing` setup |

pub mod config;
pub mod editor;
pub mod embed_cmd;
pub mod embedding;
pub mod logging;
pub mod operator;
pub mod patcher;
pub mod progress;
