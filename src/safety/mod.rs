//! Staging policy for generated commands.
//!
//! The generator decides whether a command is destructive; this module only
//! turns that verdict into what ends up in the editable buffer. A
//! destructive command is never staged in a form that runs as-is.

use crate::preferences::DestructiveMode;

pub const EXIT_SAFE: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_DESTRUCTIVE: i32 = 2;

/// The generator's verdict, decoded from its exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Safe,
    Destructive,
    /// Generation failed; carries the status to propagate.
    Failed(i32),
}

impl Classification {
    /// `None` means the process was killed by a signal.
    pub fn from_status(status: Option<i32>) -> Self {
        match status {
            Some(EXIT_SAFE) => Classification::Safe,
            Some(EXIT_DESTRUCTIVE) => Classification::Destructive,
            Some(code) => Classification::Failed(code),
            None => Classification::Failed(EXIT_ERROR),
        }
    }
}

/// What the interactive surface hands back to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    /// Ready to run on the next Enter.
    Runnable(String),
    /// Destructive command behind a comment marker.
    Commented(String),
    /// Destructive command shown on stderr only; the buffer is left alone.
    Reported(String),
}

impl Staged {
    /// Text to place in the buffer, if any.
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Staged::Runnable(text) | Staged::Commented(text) => Some(text),
            Staged::Reported(_) => None,
        }
    }

    /// Whether the staged buffer would execute the generated command
    /// without an edit.
    pub fn is_directly_executable(&self) -> bool {
        matches!(self, Staged::Runnable(_))
    }
}

/// Prefix `command` with the comment marker. Every line is commented so a
/// multi-line command stays inert as a whole.
pub fn comment_out(command: &str, marker: &str) -> String {
    command
        .lines()
        .map(|line| format!("{marker} {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply the policy to a successful generation. Returns `None` for a failed
/// classification: nothing is staged.
pub fn stage(
    classification: Classification,
    command: &str,
    marker: &str,
    mode: DestructiveMode,
) -> Option<Staged> {
    match classification {
        Classification::Safe => Some(Staged::Runnable(command.to_string())),
        Classification::Destructive => match mode {
            DestructiveMode::Comment => Some(Staged::Commented(comment_out(command, marker))),
            DestructiveMode::Report => Some(Staged::Reported(command.to_string())),
        },
        Classification::Failed(_) => None,
    }
}
