//! Per-shell session log.
//!
//! Plain text, one block per executed command:
//!
//! ```text
//! [2025-01-01T12:00:00+00:00] [exit:0] [cwd:/home/user]
//! $ ls -la
//! ---
//! ```
//!
//! Continuation lines of a multi-line command that start with `---`, `[` or
//! `\` are written with a leading `\`, so a command body can never pass
//! for a terminator or a header.
//!
//! Only the owning shell writes the file, so appends need no locking. A
//! trailing block without its `---` terminator (the process died mid-write)
//! is ignored by [`SessionLog::read`], and a header line always opens a new
//! block, so the next append is never glued onto such a fragment.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const TERMINATOR: &str = "---";
const COMMAND_PREFIX: &str = "$ ";
const ESCAPE: char = '\\';

fn needs_escape(line: &str) -> bool {
    line.starts_with(TERMINATOR) || line.starts_with('[') || line.starts_with(ESCAPE)
}

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLogEntry {
    pub timestamp: String,
    pub exit_code: i32,
    pub cwd: String,
    pub command: String,
}

impl SessionLogEntry {
    /// Render the entry as a complete, terminated block.
    pub fn to_block(&self) -> String {
        let mut lines = self.command.split('\n');
        let mut block = format!(
            "[{}] [exit:{}] [cwd:{}]\n{}{}\n",
            self.timestamp,
            self.exit_code,
            self.cwd,
            COMMAND_PREFIX,
            lines.next().unwrap_or_default()
        );
        for line in lines {
            if needs_escape(line) {
                block.push(ESCAPE);
            }
            block.push_str(line);
            block.push('\n');
        }
        block.push_str(TERMINATOR);
        block.push('\n');
        block
    }

    /// Parse the lines of one block (terminator excluded).
    fn from_lines(lines: &[&str]) -> Option<Self> {
        let (header, body) = lines.split_first()?;
        let (timestamp, exit_code, cwd) = parse_header(header)?;
        let (first, rest) = body.split_first()?;
        let mut command = first.strip_prefix(COMMAND_PREFIX)?.to_string();
        for &line in rest {
            command.push('\n');
            command.push_str(line.strip_prefix(ESCAPE).unwrap_or(line));
        }
        Some(Self {
            timestamp: timestamp.to_string(),
            exit_code,
            cwd: cwd.to_string(),
            command,
        })
    }
}

fn parse_header(line: &str) -> Option<(&str, i32, &str)> {
    let rest = line.strip_prefix('[')?.strip_suffix(']')?;
    let (timestamp, rest) = rest.split_once("] [exit:")?;
    let (code, cwd) = rest.split_once("] [cwd:")?;
    let exit_code = code.trim().parse().ok()?;
    Some((timestamp, exit_code, cwd))
}

/// Split log text into entries, dropping an unterminated tail, a fragment
/// cut short by a newer header, and any terminated block whose header does
/// not parse.
pub fn parse(contents: &str) -> Vec<SessionLogEntry> {
    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in contents.lines() {
        if !block.is_empty() && parse_header(line).is_some() {
            tracing::debug!(lines = block.len(), "dropping interrupted session log block");
            block.clear();
            block.push(line);
        } else if line == TERMINATOR {
            match SessionLogEntry::from_lines(&block) {
                Some(entry) => entries.push(entry),
                None if block.is_empty() => {}
                None => tracing::debug!(lines = block.len(), "skipping malformed session log block"),
            }
            block.clear();
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        tracing::debug!(lines = block.len(), "ignoring unterminated session log block");
    }
    entries
}

/// Handle to one shell's log file. The file is created on first append.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Append one complete entry in a single write, creating the file and
    /// its parent directory if needed. A fragment left without a final
    /// newline is closed off first so the new header starts its own line.
    pub fn append(&self, entry: &SessionLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut block = entry.to_block();
        if !ends_with_newline(&mut file)
            .with_context(|| format!("reading {}", self.path.display()))?
        {
            block.insert(0, '\n');
        }
        file.write_all(block.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))
    }

    /// All complete entries in order. A missing file reads as empty.
    pub fn read(&self) -> Result<Vec<SessionLogEntry>> {
        match self.read_raw()? {
            Some(contents) => Ok(parse(&contents)),
            None => Ok(Vec::new()),
        }
    }

    /// The most recent `limit` entries.
    pub fn tail(&self, limit: usize) -> Result<Vec<SessionLogEntry>> {
        let mut entries = self.read()?;
        let start = entries.len().saturating_sub(limit);
        Ok(entries.split_off(start))
    }

    pub fn line_count(&self) -> Result<usize> {
        Ok(self.read_raw()?.map_or(0, |c| c.lines().count()))
    }

    /// Rewrite the file keeping only the last `max_entries` entries.
    ///
    /// The new content goes to a temporary file in the same directory and is
    /// renamed over the log, so an interrupted compaction leaves the old log
    /// in place. Returns the number of entries retained.
    pub fn compact(&self, max_entries: usize) -> Result<usize> {
        let Some(contents) = self.read_raw()? else {
            return Ok(0);
        };
        let entries = parse(&contents);
        let start = entries.len().saturating_sub(max_entries);
        let kept = &entries[start..];

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temporary file in {}", dir.display()))?;
        for entry in kept {
            tmp.write_all(entry.to_block().as_bytes())
                .context("writing compacted session log")?;
        }
        tmp.flush().context("flushing compacted session log")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        tracing::debug!(
            path = %self.path.display(),
            before = entries.len(),
            after = kept.len(),
            "compacted session log"
        );
        Ok(kept.len())
    }

    /// Compact when the file has grown past `threshold` lines. Returns
    /// whether compaction ran.
    pub fn compact_if_over(&self, threshold: usize, max_entries: usize) -> Result<bool> {
        if self.line_count()? > threshold {
            self.compact(max_entries)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Delete the file, ignoring "not found".
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }

    fn read_raw(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(c) => Ok(Some(c)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

/// Whether the file is empty or its last byte is a newline.
fn ends_with_newline(file: &mut fs::File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
