//! Interactive `openai.api_base` patcher.
//!
//! Walks a project tree and, for every matching source file, runs a small
//! state machine:
//!
//! ```text
//! SCANNING ──no marker / already patched──▶ DONE
//!    │ marker found
//!    ▼
//! AWAITING_OPERATOR_DECISION ──declined──▶ DONE
//!    │ confirmed
//!    ▼
//! INSERTING ──────────────────────────────▶ DONE
//! ```
//!
//! At most one line is inserted per file, directly below the first marker
//! line and with the same indentation. Files that already contain the
//! companion marker are never touched. Any I/O error aborts the whole walk.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::PatcherConfig;
use crate::editor::EditorLauncher;
use crate::operator::Operator;
use crate::progress::{PatchEvent, PatchReporter};

/// Where the companion line should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spot {
    /// Zero-based index of the marker line.
    pub index: usize,
    /// Leading whitespace of the marker line.
    pub indentation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    NoMarker,
    AlreadyPatched,
    Spot(Spot),
}

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    NoMarker,
    AlreadyPatched,
    Declined { line_number: usize },
    Inserted { line_number: usize },
    WouldInsert { line_number: usize },
}

impl FileOutcome {
    pub fn lines_added(&self) -> usize {
        match self {
            FileOutcome::Inserted { .. } => 1,
            _ => 0,
        }
    }

    pub fn spot_found(&self) -> bool {
        matches!(
            self,
            FileOutcome::Declined { .. }
                | FileOutcome::Inserted { .. }
                | FileOutcome::WouldInsert { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub files_scanned: usize,
    pub spots_found: usize,
    pub lines_added: usize,
}

fn leading_whitespace(line: &str) -> &str {
    let rest = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - rest.len()]
}

/// Find the first marker line, unless the file is already patched.
pub fn scan_lines<S: AsRef<str>>(lines: &[S], config: &PatcherConfig) -> ScanResult {
    let Some(index) = lines
        .iter()
        .position(|line| line.as_ref().contains(&config.marker))
    else {
        return ScanResult::NoMarker;
    };

    if lines
        .iter()
        .any(|line| line.as_ref().contains(&config.companion_marker))
    {
        return ScanResult::AlreadyPatched;
    }

    ScanResult::Spot(Spot {
        index,
        indentation: leading_whitespace(lines[index].as_ref()).to_string(),
    })
}

/// Return a copy of `lines` with the companion line inserted after `spot`.
///
/// Lines keep their own terminators. The new line uses the file's line ending
/// (`\r\n` if the first terminated line has one). When the marker is the last
/// line and has no terminator, it gets one and the new line becomes the
/// unterminated last line.
pub fn insert_line(lines: &[String], spot: &Spot, config: &PatcherConfig) -> Vec<String> {
    let eol = match lines.iter().find(|l| l.ends_with('\n')) {
        Some(l) if l.ends_with("\r\n") => "\r\n",
        _ => "\n",
    };

    let mut patched = lines.to_vec();
    let mut new_line = format!("{}{}", spot.indentation, config.insert_line);
    if patched[spot.index].ends_with('\n') {
        new_line.push_str(eol);
    } else {
        patched[spot.index].push_str(eol);
    }
    patched.insert(spot.index + 1, new_line);
    patched
}

fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

/// Replace `path` with `contents` via a temp file in the same directory.
///
/// The original permissions are kept. A crash before the rename leaves the
/// original file intact. A symlink is resolved first so its target is
/// rewritten and the link stays in place.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let target = std::fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    let path = target.as_path();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Every file under `root` matching the include globs and none of the
/// exclude globs, each once, sorted by path.
pub fn collect_candidates(root: &Path, config: &PatcherConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        // Symlinks to files count even when links are not followed into directories.
        if !entry.path().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Runs the per-file state machine with injected operator, editor and reporter.
pub struct Patcher<'a> {
    config: &'a PatcherConfig,
    operator: &'a mut dyn Operator,
    editor: &'a mut dyn EditorLauncher,
    progress: &'a dyn PatchReporter,
    dry_run: bool,
}

impl<'a> Patcher<'a> {
    pub fn new(
        config: &'a PatcherConfig,
        operator: &'a mut dyn Operator,
        editor: &'a mut dyn EditorLauncher,
        progress: &'a dyn PatchReporter,
    ) -> Self {
        Self {
            config,
            operator,
            editor,
            progress,
            dry_run: false,
        }
    }

    /// Report spots without prompting or writing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn scan_directory(&mut self, root: &Path) -> Result<PatchSummary> {
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }

        let files = collect_candidates(root, self.config)?;
        tracing::debug!(root = %root.display(), candidates = files.len(), "walk complete");

        let mut summary = PatchSummary::default();
        for path in &files {
            self.progress
                .report(PatchEvent::FileStarted { path: path.clone() });
            let outcome = self.patch_file(path)?;

            summary.files_scanned += 1;
            if outcome.spot_found() {
                summary.spots_found += 1;
            }
            summary.lines_added += outcome.lines_added();
        }

        self.progress.report(PatchEvent::finished(&summary));
        Ok(summary)
    }

    pub fn patch_file(&mut self, path: &Path) -> Result<FileOutcome> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let lines = split_lines(&content);

        let outcome = match scan_lines(&lines, self.config) {
            ScanResult::NoMarker => FileOutcome::NoMarker,
            ScanResult::AlreadyPatched => {
                tracing::debug!(path = %path.display(), "already patched");
                FileOutcome::AlreadyPatched
            }
            ScanResult::Spot(spot) => self.decide(path, &lines, &spot)?,
        };

        tracing::debug!(path = %path.display(), ?outcome, "file done");
        self.progress.report(PatchEvent::FileScanned {
            path: path.to_path_buf(),
            lines_added: outcome.lines_added(),
        });
        Ok(outcome)
    }

    fn decide(&mut self, path: &Path, lines: &[String], spot: &Spot) -> Result<FileOutcome> {
        let line_number = spot.index + 1;
        self.progress.report(PatchEvent::SpotFound {
            path: path.to_path_buf(),
            line_number,
            line: lines[spot.index].trim_end().to_string(),
        });

        if self.dry_run {
            self.progress.report(PatchEvent::WouldInsert {
                path: path.to_path_buf(),
                line_number,
            });
            return Ok(FileOutcome::WouldInsert { line_number });
        }

        if self.operator.confirm("Do you want to open the file?")? {
            self.editor.open(path)?;
        }

        let question = format!("Do you want to add \"{}\"?", self.config.insert_line);
        if !self.operator.confirm(&question)? {
            return Ok(FileOutcome::Declined { line_number });
        }

        let patched = insert_line(lines, spot, self.config);
        write_atomic(path, &patched.concat())?;
        self.progress.report(PatchEvent::LineInserted {
            path: path.to_path_buf(),
            line_number,
        });
        Ok(FileOutcome::Inserted { line_number })
    }
}
