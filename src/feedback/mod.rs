//! Suggestion/execution correlation and the shared feedback log.
//!
//! The feedback file is shared by every shell on the machine. It is only
//! ever opened in append mode and each record is written with one
//! `write_all`, which keeps concurrent small appends from interleaving.

use crate::metadata::SuggestionRecord;
use crate::safety::comment_out;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One line of the feedback file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub timestamp: String,
    pub query: String,
    pub generated_command: String,
    pub executed_command: String,
    pub matched: bool,
}

/// True if `executed` is the generated command, either as-is or still
/// carrying the comment marker it was staged with.
pub fn is_match(generated: &str, executed: &str, comment_marker: &str) -> bool {
    executed == generated || executed == comment_out(generated, comment_marker)
}

/// Compare a consumed suggestion with the command that was actually run.
pub fn correlate(
    suggestion: &SuggestionRecord,
    executed: &str,
    comment_marker: &str,
    timestamp: String,
) -> FeedbackEntry {
    FeedbackEntry {
        timestamp,
        query: suggestion.query.clone(),
        generated_command: suggestion.generated_command.clone(),
        executed_command: executed.to_string(),
        matched: is_match(&suggestion.generated_command, executed, comment_marker),
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackLog {
    path: PathBuf,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line. Never truncates.
    pub fn append(&self, entry: &FeedbackEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry).context("serializing feedback entry")?;
        line.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))
    }

    /// Every parseable record, skipping lines that are not valid JSON.
    pub fn read(&self) -> Result<Vec<FeedbackEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };
        let mut entries = Vec::new();
        for (i, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::debug!(line = i + 1, error = %err, "skipping feedback line"),
            }
        }
        Ok(entries)
    }
}
