//! Yes/no decisions asked of the person running the patcher.
//!
//! [`TerminalOperator`] reads answers from a terminal (or any `BufRead`);
//! [`ScriptedOperator`] replays canned answers so the patcher can run
//! unattended and be tested without a terminal.

use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::io::{BufRead, Write};

pub trait Operator {
    /// Ask `prompt` and return whether the answer was yes.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// An answer counts as yes only when it is `y` (any case, surrounding whitespace ignored).
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalOperator<std::io::StdinLock<'static>, Box<dyn Write>> {
    /// Answers from stdin. Prompts go to stdout, or to stderr when stdout is
    /// reserved for machine-readable output.
    pub fn stdio(prompts_on_stderr: bool) -> Self {
        let output: Box<dyn Write> = if prompts_on_stderr {
            Box::new(std::io::stderr())
        } else {
            Box::new(std::io::stdout())
        };
        Self::new(std::io::stdin().lock(), output)
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{} (y/n) ", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read answer from terminal")?;
        if read == 0 {
            bail!("Input closed while waiting for an answer to: {}", prompt);
        }
        Ok(is_yes(&line))
    }
}

/// Replays a fixed list of answers and remembers every prompt it was shown.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        match self.answers.pop_front() {
            Some(answer) => Ok(is_yes(&answer)),
            None => bail!("No scripted answer left for: {}", prompt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes("Y\n"));
        assert!(is_yes("  y  "));
        assert!(!is_yes("yes"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
    }

    #[test]
    fn test_terminal_reads_one_line_per_question() {
        let mut out = Vec::new();
        {
            let mut op = TerminalOperator::new(Cursor::new("y\nn\n"), &mut out);
            assert!(op.confirm("Open?").unwrap());
            assert!(!op.confirm("Add?").unwrap());
        }
        assert_eq!(String::from_utf8(out).unwrap(), "Open? (y/n) Add? (y/n) ");
    }

    #[test]
    fn test_terminal_eof_is_error() {
        let mut op = TerminalOperator::new(Cursor::new(""), Vec::new());
        let err = op.confirm("Open?").unwrap_err();
        assert!(err.to_string().contains("Input closed"));
    }

    #[test]
    fn test_scripted_records_prompts() {
        let mut op = ScriptedOperator::new(["n", "Y"]);
        assert!(!op.confirm("first").unwrap());
        assert!(op.confirm("second").unwrap());
        assert_eq!(op.prompts(), ["first", "second"]);
        assert_eq!(op.remaining(), 0);
        assert!(op.confirm("third").is_err());
    }
}
