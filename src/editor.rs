//! Opening a file for the operator to look at.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::config::EditorConfig;

pub trait EditorLauncher {
    fn open(&mut self, path: &Path) -> Result<()>;
}

/// Returned when no opener is known for the host OS and none is configured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported platform")]
pub struct UnsupportedPlatform {
    pub os: String,
}

/// Launches the configured editor, then the platform opener.
///
/// Both commands are fire-and-forget: the patcher continues without waiting
/// for the editor to close.
pub struct SystemEditor {
    command: Option<String>,
    open_command: Vec<String>,
    os: String,
}

impl SystemEditor {
    pub fn new(config: &EditorConfig) -> Self {
        Self::for_os(config, std::env::consts::OS)
    }

    pub fn for_os(config: &EditorConfig, os: &str) -> Self {
        Self {
            command: config.command.clone().filter(|c| !c.trim().is_empty()),
            open_command: config.open_command.clone(),
            os: os.to_string(),
        }
    }

    /// The opener argv for this platform, path not yet appended.
    pub fn opener(&self) -> std::result::Result<Vec<String>, UnsupportedPlatform> {
        if !self.open_command.is_empty() {
            return Ok(self.open_command.clone());
        }
        match self.os.as_str() {
            "macos" => Ok(vec!["open".to_string()]),
            "windows" => Ok(vec![
                "cmd".to_string(),
                "/C".to_string(),
                "start".to_string(),
                String::new(),
            ]),
            other => Err(UnsupportedPlatform {
                os: other.to_string(),
            }),
        }
    }
}

fn spawn(argv: &[String], path: &Path) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("Empty editor command"))?;
    tracing::debug!(%program, ?args, path = %path.display(), "launching");
    Command::new(program)
        .args(args)
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to launch '{}'", program))?;
    Ok(())
}

impl EditorLauncher for SystemEditor {
    fn open(&mut self, path: &Path) -> Result<()> {
        if let Some(command) = &self.command {
            // A missing editor binary is not fatal; the platform opener still runs.
            if let Err(e) = spawn(&[command.clone()], path) {
                tracing::warn!("{:#}", e);
            }
        }

        let opener = self.opener()?;
        spawn(&opener, path)
    }
}

/// Remembers which files were requested instead of launching anything.
#[derive(Debug, Default)]
pub struct RecordingEditor {
    pub opened: Vec<PathBuf>,
}

impl EditorLauncher for RecordingEditor {
    fn open(&mut self, path: &Path) -> Result<()> {
        self.opened.push(path.to_path_buf());
        Ok(())
    }
}
