//! Manual facility entry for records the join could not match.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::models::UnmatchedEntry;

/// Supplies a facility name for an unmatched entry.
///
/// `Ok(None)` (or a blank string) leaves the entry unresolved.
pub trait ManualEntryCollector {
    fn collect(&mut self, entry: &UnmatchedEntry) -> Result<Option<String>>;
}

impl<F> ManualEntryCollector for F
where
    F: FnMut(&UnmatchedEntry) -> Option<String>,
{
    fn collect(&mut self, entry: &UnmatchedEntry) -> Result<Option<String>> {
        Ok(self(entry))
    }
}

const PROMPT: &str = "요양원명 입력";

/// Prompts one line per entry on `output` and reads the answer from `input`.
pub struct PromptCollector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptCollector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ManualEntryCollector for PromptCollector<R, W> {
    fn collect(&mut self, entry: &UnmatchedEntry) -> Result<Option<String>> {
        write!(
            self.output,
            "[row {}] {} - {}: ",
            entry.row,
            entry.label(),
            PROMPT
        )?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            // EOF: leave the rest unresolved
            return Ok(None);
        }
        let answer = line.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}
