//! Patcher progress reporting.
//!
//! The patcher emits a [`PatchEvent`] at each step of its per-file state
//! machine. [`StdoutProgress`] prints the human transcript the operator reads
//! between prompts; [`JsonProgress`] prints one JSON object per line for
//! scripts. Both write to **stdout**, which is where the operator is looking.

use serde::Serialize;
use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;

use crate::patcher::PatchSummary;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PatchEvent {
    /// A candidate file is about to be scanned.
    FileStarted { path: PathBuf },
    /// The marker was found and the operator is about to be asked.
    SpotFound {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
    /// The companion line was written to disk.
    LineInserted { path: PathBuf, line_number: usize },
    /// Dry run: the companion line would have been inserted.
    WouldInsert { path: PathBuf, line_number: usize },
    /// Scanning of one file is done.
    FileScanned { path: PathBuf, lines_added: usize },
    /// The whole walk is done.
    Finished {
        files_scanned: usize,
        spots_found: usize,
        lines_added: usize,
    },
}

impl PatchEvent {
    pub fn finished(summary: &PatchSummary) -> Self {
        PatchEvent::Finished {
            files_scanned: summary.files_scanned,
            spots_found: summary.spots_found,
            lines_added: summary.lines_added,
        }
    }
}

pub trait PatchReporter {
    fn report(&self, event: PatchEvent);
}

/// Human transcript on stdout.
pub struct StdoutProgress;

/// Render the human transcript lines for one event.
pub fn render_human(event: &PatchEvent) -> String {
    match event {
        PatchEvent::FileStarted { path } => {
            format!("\nProcessing file: {}\n", path.display())
        }
        PatchEvent::SpotFound {
            path,
            line_number,
            line,
        } => format!(
            "\nPotential spot found!\nFile: {}\nLine {}: {}\n",
            path.display(),
            line_number,
            line.trim()
        ),
        PatchEvent::LineInserted { .. } => "API base added to file\n".to_string(),
        PatchEvent::WouldInsert { line_number, .. } => {
            format!("Dry run: would add API base after line {}\n", line_number)
        }
        PatchEvent::FileScanned { path, lines_added } => {
            format!("Scanned {}, {} lines added.\n", path.display(), lines_added)
        }
        PatchEvent::Finished {
            files_scanned,
            spots_found,
            lines_added,
        } => format!(
            "\nDone: {} files scanned, {} spots found, {} lines added.\n",
            files_scanned, spots_found, lines_added
        ),
    }
}

impl PatchReporter for StdoutProgress {
    fn report(&self, event: PatchEvent) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(render_human(&event).as_bytes());
        let _ = out.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stdout.
pub struct JsonProgress;

impl PatchReporter for JsonProgress {
    fn report(&self, event: PatchEvent) {
        let Ok(line) = serde_json::to_string(&event) else {
            return;
        };
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct CollectingProgress {
    events: RefCell<Vec<PatchEvent>>,
}

impl CollectingProgress {
    pub fn events(&self) -> Vec<PatchEvent> {
        self.events.borrow().clone()
    }
}

impl PatchReporter for CollectingProgress {
    fn report(&self, event: PatchEvent) {
        self.events.borrow_mut().push(event);
    }
}
