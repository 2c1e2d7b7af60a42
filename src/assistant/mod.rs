//! The user-facing entry points: the `shai` shell function and the
//! key-bound widget.
//!
//! Both validate the request, assemble context, call the generator once and
//! apply the staging policy. The suggestion is recorded before anything is
//! staged, destructive or not, so that the next dispatched command can be
//! correlated with it.

use crate::context::ContextAssembler;
use crate::generator::{GenerationRequest, Generator};
use crate::preferences::Preferences;
use crate::safety::{self, Classification, EXIT_DESTRUCTIVE, EXIT_ERROR, EXIT_SAFE, Staged};
use crate::session::ShellSession;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Prefix of the inline status the widget leaves after a failure.
pub const STATUS_MARKER: &str = "  # shai: ";

#[derive(Debug, Error)]
pub enum AskError {
    #[error("usage: shai <description of the command you want>")]
    EmptyQuery,

    #[error("could not run generator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("command generation failed (exit status {0})")]
    Generation(i32),

    #[error("generator returned no command")]
    EmptyOutput,
}

impl AskError {
    /// Status the interactive surface returns for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AskError::Generation(code) => *code,
            _ => EXIT_ERROR,
        }
    }
}

/// One user request, as seen from the shell.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub query: &'a str,
    pub cwd: &'a Path,
    /// Raw recent history text.
    pub history: &'a str,
    pub aliases: Option<&'a str>,
    pub quiet: bool,
}

/// Exit status for a staging result.
pub fn staged_exit_code(staged: &Staged) -> i32 {
    match staged {
        Staged::Runnable(_) | Staged::Commented(_) => EXIT_SAFE,
        Staged::Reported(_) => EXIT_DESTRUCTIVE,
    }
}

/// Collapse runs of whitespace so `shai  list   files` and the widget's
/// buffer produce the same query.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a status comment left in the buffer by a previous failure.
pub fn strip_status(buffer: &str) -> &str {
    match buffer.find(STATUS_MARKER) {
        Some(idx) => &buffer[..idx],
        None => buffer,
    }
}

/// What the widget puts back into the line editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOutcome {
    pub buffer: String,
    pub exit_code: i32,
    /// A destructive command shown to the user instead of being staged.
    pub reported: Option<String>,
}

impl WidgetOutcome {
    fn failed(original: &str, message: &str, exit_code: i32) -> Self {
        Self {
            buffer: format!("{original}{STATUS_MARKER}{message}"),
            exit_code,
            reported: None,
        }
    }
}

pub struct Assistant<'a, G> {
    prefs: &'a Preferences,
    generator: G,
}

impl<'a, G: Generator> Assistant<'a, G> {
    pub fn new(prefs: &'a Preferences, generator: G) -> Self {
        Self { prefs, generator }
    }

    /// Turn a request into a staged buffer.
    pub fn ask(&self, session: &mut ShellSession, request: &Request<'_>) -> Result<Staged, AskError> {
        let query = normalize_query(request.query);
        if query.is_empty() {
            return Err(AskError::EmptyQuery);
        }

        let bundle = ContextAssembler::new(self.prefs).build(
            request.cwd,
            request.history,
            request.aliases,
            session.log(),
        );
        let dir_context = bundle.render_dir_context().unwrap_or_else(|err| {
            tracing::debug!(error = %format!("{err:#}"), "falling back to bare cwd context");
            bundle.cwd.display().to_string()
        });
        let generation = GenerationRequest {
            query: query.clone(),
            history: bundle.recent_history,
            session_file: bundle.session_log,
            dir_context,
            quiet: request.quiet,
        };

        let output = self
            .generator
            .generate(&generation)
            .map_err(|source| AskError::Spawn {
                program: self.prefs.generator.clone(),
                source,
            })?;
        let classification = output.classification();
        if let Classification::Failed(code) = classification {
            return Err(AskError::Generation(code));
        }
        if output.command.is_empty() {
            return Err(AskError::EmptyOutput);
        }

        session.record_suggestion(&query, &output.command);
        tracing::debug!(
            pid = session.pid(),
            destructive = classification == Classification::Destructive,
            "suggestion recorded"
        );

        safety::stage(
            classification,
            &output.command,
            &self.prefs.comment_marker,
            self.prefs.destructive_mode,
        )
        .ok_or(AskError::Generation(EXIT_ERROR))
    }

    /// Run the widget on the current line-editor buffer.
    ///
    /// On success the buffer is replaced by the staged text; otherwise the
    /// original text is kept and a status comment is appended.
    pub fn widget(&self, session: &mut ShellSession, request: &Request<'_>) -> WidgetOutcome {
        let original = strip_status(request.query).trim_end();
        let request = Request {
            query: original,
            ..*request
        };
        match self.ask(session, &request) {
            Ok(Staged::Reported(command)) => WidgetOutcome {
                reported: Some(command),
                ..WidgetOutcome::failed(original, "destructive command not staged", EXIT_DESTRUCTIVE)
            },
            Ok(staged) => WidgetOutcome {
                buffer: staged.buffer().unwrap_or_default().to_string(),
                exit_code: staged_exit_code(&staged),
                reported: None,
            },
            Err(AskError::EmptyQuery) => {
                WidgetOutcome::failed(original, "type a request first", EXIT_ERROR)
            }
            Err(err) => WidgetOutcome::failed(original, &err.to_string(), err.exit_code()),
        }
    }
}
