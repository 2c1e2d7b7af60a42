use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A command that has been dispatched but has not yet reported its exit
/// status. At most one exists per shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub command: String,
    pub started_at: String,
    pub cwd: PathBuf,
}

/// The last generated command, kept until the next dispatch consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub query: String,
    pub generated_command: String,
}

/// Transient per-shell state carried between hook invocations.
/// Stored as `<session_dir>/<pid>.state.json` and removed once empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<SuggestionRecord>,
}

impl ShellState {
    pub fn is_empty(&self) -> bool {
        self.pending.is_none() && self.suggestion.is_none()
    }
}
