//! Gathers what the generator gets to see about the user's terminal.
//!
//! No generation logic lives here: only collecting, capping and formatting.

use crate::preferences::Preferences;
use crate::session_log::SessionLog;
use anyhow::{Context, Result};
use minijinja::{Environment, context};
use std::fs;
use std::path::{Path, PathBuf};

const DIR_CONTEXT_TEMPLATE: &str = include_str!("dir_context.j2");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBundle {
    /// Oldest first.
    pub recent_history: Vec<String>,
    pub cwd: PathBuf,
    pub os: String,
    pub aliases: Option<String>,
    pub directory_listing: Vec<String>,
    /// Entry count before capping.
    pub listing_total: usize,
    pub session_log: Option<PathBuf>,
}

impl ContextBundle {
    pub fn listing_truncated(&self) -> bool {
        self.listing_total > self.directory_listing.len()
    }

    /// Render the directory/OS/alias part of the bundle as the text passed
    /// to the generator's `--dir-context`.
    pub fn render_dir_context(&self) -> Result<String> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("dir_context", DIR_CONTEXT_TEMPLATE)
            .context("parsing directory context template")?;
        let tmpl = env
            .get_template("dir_context")
            .context("loading directory context template")?;
        let rendered = tmpl
            .render(context! {
                cwd => self.cwd.display().to_string(),
                os => self.os,
                listing => self.directory_listing,
                truncated => self.listing_truncated(),
                total => self.listing_total,
                aliases => self.aliases,
            })
            .context("rendering directory context")?;
        Ok(rendered.trim_end().to_string())
    }
}

pub struct ContextAssembler<'a> {
    prefs: &'a Preferences,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(prefs: &'a Preferences) -> Self {
        Self { prefs }
    }

    /// Build the bundle for one request.
    ///
    /// `history` is raw history text (one command per line, as printed by
    /// `fc -ln` or read from a history file). `aliases` is ignored unless
    /// alias inclusion is enabled.
    pub fn build(
        &self,
        cwd: &Path,
        history: &str,
        aliases: Option<&str>,
        session_log: &SessionLog,
    ) -> ContextBundle {
        let (directory_listing, listing_total) =
            match directory_listing(cwd, self.prefs.listing_cap) {
                Ok(listing) => listing,
                Err(err) => {
                    tracing::debug!(error = %err, "directory listing unavailable");
                    (Vec::new(), 0)
                }
            };
        let aliases = if self.prefs.include_aliases {
            aliases
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
        } else {
            None
        };
        let session_log = if self.prefs.session_capture && session_log.exists() {
            Some(session_log.path().to_path_buf())
        } else {
            None
        };
        ContextBundle {
            recent_history: recent_history(history, self.prefs.history_lines),
            cwd: cwd.to_path_buf(),
            os: os_identifier(),
            aliases,
            directory_listing,
            listing_total,
            session_log,
        }
    }
}

pub fn os_identifier() -> String {
    format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH)
}

/// The last `limit` non-blank history lines, oldest first.
///
/// Accepts plain lines, `fc -l` style numbered lines and zsh extended
/// history (`: <start>:<elapsed>;<command>`).
pub fn recent_history(text: &str, limit: usize) -> Vec<String> {
    let lines: Vec<String> = text
        .lines()
        .map(strip_history_prefix)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].to_vec()
}

fn strip_history_prefix(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(": ") {
        if let Some((stamp, command)) = rest.split_once(';') {
            if stamp
                .split(':')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
            {
                return command.trim();
            }
        }
    }
    if let Some((number, command)) = line.split_once(char::is_whitespace) {
        let number = number.trim_end_matches('*');
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            return command.trim();
        }
    }
    line
}

/// Read the tail of a history file. Bytes that are not UTF-8 (zsh
/// metafication) are replaced rather than rejected.
pub fn read_history_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Non-hidden entries of `dir` sorted by name, directories suffixed with
/// `/`, capped at `cap`. Also returns the uncapped count.
pub fn directory_listing(dir: &Path, cap: usize) -> Result<(Vec<String>, usize)> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        names.push(if is_dir { format!("{name}/") } else { name });
    }
    names.sort();
    let total = names.len();
    names.truncate(cap);
    Ok((names, total))
}
