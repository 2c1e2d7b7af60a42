//! Per-shell lifecycle recording and suggestion tracking.
//!
//! ## State Machine
//!
//! ```text
//! Idle       --dispatch(cmd)-->  Dispatched   (feedback correlated first)
//! Dispatched --complete(code)--> Idle         (entry appended to the log)
//! Idle       --complete(code)--> Idle         (no-op: nothing was dispatched)
//! any        --exit-->           (log and state file deleted)
//! ```
//!
//! Each hook runs as its own process, so the transient state travels in
//! `<pid>.state.json` between invocations. Only the owning shell touches
//! its files.

use crate::feedback::{self, FeedbackLog};
use crate::metadata::{PendingCommand, ShellState, SuggestionRecord};
use crate::preferences::Preferences;
use crate::session_log::{SessionLog, SessionLogEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Events forwarded by the host shell's native hooks.
///
/// Implementations must never fail the shell: errors are logged and dropped.
pub trait ShellHooks {
    fn on_dispatch(&mut self, command: &str, cwd: &Path, at: DateTime<Local>);
    fn on_complete(&mut self, exit_code: i32);
    fn on_exit(&mut self);
}

pub fn timestamp(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Remove a file, ignoring "not found" errors.
fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

pub struct ShellSession {
    pid: u32,
    capture: bool,
    session_size: usize,
    trim_threshold: usize,
    comment_marker: String,
    state_path: PathBuf,
    log: SessionLog,
    feedback: FeedbackLog,
    state: ShellState,
}

impl ShellSession {
    /// Bind to the files of shell `pid` and load its carried-over state.
    ///
    /// A missing or unreadable state file starts the shell from Idle.
    pub fn open(prefs: &Preferences, pid: u32) -> Self {
        let mut session = Self::fresh(prefs, pid);
        match session.read_state() {
            Ok(Some(state)) => session.state = state,
            Ok(None) => {}
            Err(err) => tracing::debug!(pid, error = %format!("{err:#}"), "discarding shell state"),
        }
        session
    }

    /// Bind to the files of shell `pid` without loading any state.
    pub fn fresh(prefs: &Preferences, pid: u32) -> Self {
        let dir = &prefs.session_dir;
        Self {
            pid,
            capture: prefs.session_capture,
            session_size: prefs.session_size,
            trim_threshold: prefs.trim_threshold(),
            comment_marker: prefs.comment_marker.clone(),
            state_path: dir.join(format!("{pid}.state.json")),
            log: SessionLog::new(dir.join(format!("{pid}.log"))),
            feedback: FeedbackLog::new(&prefs.feedback_file),
            state: ShellState::default(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.state.pending.as_ref()
    }

    pub fn suggestion(&self) -> Option<&SuggestionRecord> {
        self.state.suggestion.as_ref()
    }

    /// Remember a generated command so the next dispatch can be correlated
    /// with it. Replaces any unconsumed suggestion.
    pub fn record_suggestion(&mut self, query: &str, generated_command: &str) {
        self.state.suggestion = Some(SuggestionRecord {
            query: query.to_string(),
            generated_command: generated_command.to_string(),
        });
    }

    // ---------------------------------------------------------------
    // State file
    // ---------------------------------------------------------------

    fn read_state(&self) -> Result<Option<ShellState>> {
        match fs::read_to_string(&self.state_path) {
            Ok(s) => {
                let state = serde_json::from_str(&s)
                    .with_context(|| format!("parsing {}", self.state_path.display()))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.state_path.display())),
        }
    }

    /// Write the in-memory state back for the next hook invocation, or
    /// remove the file when there is nothing to carry.
    pub fn save(&self) -> Result<()> {
        if self.state.is_empty() {
            return remove_if_exists(&self.state_path);
        }
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string(&self.state).context("serializing shell state")?;
        fs::write(&self.state_path, json)
            .with_context(|| format!("writing {}", self.state_path.display()))
    }

    // ---------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------

    /// Consume the pending suggestion, if any, and log how it was used.
    fn correlate_feedback(&mut self, command: &str, at: &DateTime<Local>) -> Result<()> {
        let Some(suggestion) = self.state.suggestion.take() else {
            return Ok(());
        };
        let entry = feedback::correlate(&suggestion, command, &self.comment_marker, timestamp(at));
        tracing::debug!(pid = self.pid, matched = entry.matched, "suggestion consumed");
        self.feedback.append(&entry)
    }

    fn begin(&mut self, command: &str, cwd: &Path, at: &DateTime<Local>) {
        if !self.capture {
            return;
        }
        self.state.pending = Some(PendingCommand {
            command: command.to_string(),
            started_at: timestamp(at),
            cwd: cwd.to_path_buf(),
        });
    }

    fn finish(&mut self, exit_code: i32) -> Result<()> {
        let Some(pending) = self.state.pending.take() else {
            return Ok(());
        };
        if !self.capture {
            return Ok(());
        }
        let entry = SessionLogEntry {
            timestamp: pending.started_at,
            exit_code,
            cwd: pending.cwd.display().to_string(),
            command: pending.command,
        };
        self.log.append(&entry)?;
        self.log
            .compact_if_over(self.trim_threshold, self.session_size)?;
        Ok(())
    }

    /// Remove both session files. Each removal is attempted; the first
    /// failure is reported.
    fn teardown(&mut self) -> Result<()> {
        self.state = ShellState::default();
        let log = self.log.remove();
        let state = remove_if_exists(&self.state_path);
        log.and(state)
    }
}

impl ShellHooks for ShellSession {
    fn on_dispatch(&mut self, command: &str, cwd: &Path, at: DateTime<Local>) {
        if let Err(err) = self.correlate_feedback(command, &at) {
            tracing::debug!(pid = self.pid, error = %format!("{err:#}"), "feedback not recorded");
        }
        self.begin(command, cwd, &at);
    }

    fn on_complete(&mut self, exit_code: i32) {
        if let Err(err) = self.finish(exit_code) {
            tracing::debug!(pid = self.pid, error = %format!("{err:#}"), "session capture failed");
        }
    }

    fn on_exit(&mut self) {
        if let Err(err) = self.teardown() {
            tracing::debug!(pid = self.pid, error = %format!("{err:#}"), "session cleanup failed");
        }
    }
}
