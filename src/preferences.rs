use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILENAME: &str = "config.toml";
const APP_DIR: &str = "shai";

/// What to do with a command the generator classified as destructive.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DestructiveMode {
    /// Stage the command behind a comment marker.
    #[default]
    Comment,
    /// Print the command to stderr and stage nothing.
    Report,
}

impl DestructiveMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "comment" => Some(DestructiveMode::Comment),
            "report" => Some(DestructiveMode::Report),
            _ => None,
        }
    }
}

/// User-facing preferences stored in `<config_dir>/shai/config.toml`.
///
/// Every key is optional in the file; environment variables are applied on
/// top by [`Preferences::load`].
#[derive(Debug, Clone, Deserialize)]
pub struct Preferences {
    /// Record executed commands into the per-shell session log.
    #[serde(default = "default_true")]
    pub session_capture: bool,

    /// Send the shell's alias table along with the context.
    #[serde(default)]
    pub include_aliases: bool,

    /// Directory holding `<pid>.log` and `<pid>.state.json`.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    /// Number of entries kept by compaction.
    #[serde(default = "default_session_size")]
    pub session_size: usize,

    /// Compaction runs once the log has more than
    /// `trim_factor * session_size` lines.
    #[serde(default = "default_trim_factor")]
    pub trim_factor: usize,

    /// Shared, append-only feedback log.
    #[serde(default = "default_feedback_file")]
    pub feedback_file: PathBuf,

    /// Program that turns a request into a command.
    #[serde(default = "default_generator")]
    pub generator: String,

    /// Arguments placed before the ones shai passes to the generator.
    #[serde(default)]
    pub generator_args: Vec<String>,

    /// Prefix that keeps a destructive command from running on Enter. Must
    /// start with `#`.
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,

    #[serde(default)]
    pub destructive_mode: DestructiveMode,

    #[serde(default = "default_history_lines")]
    pub history_lines: usize,

    #[serde(default = "default_listing_cap")]
    pub listing_cap: usize,

    /// Key sequence bound to the widget by `shai init`.
    #[serde(default = "default_widget_key")]
    pub widget_key: String,
}

fn default_true() -> bool {
    true
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR)
}

fn default_session_dir() -> PathBuf {
    dirs::state_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(data_root)
        .join("sessions")
}

fn default_session_size() -> usize {
    100
}

fn default_trim_factor() -> usize {
    4
}

fn default_feedback_file() -> PathBuf {
    data_root().join("feedback.jsonl")
}

fn default_generator() -> String {
    "shai-gen".into()
}

fn default_comment_marker() -> String {
    "#".into()
}

fn default_history_lines() -> usize {
    10
}

fn default_listing_cap() -> usize {
    200
}

fn default_widget_key() -> String {
    "^G".into()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            session_capture: default_true(),
            include_aliases: false,
            session_dir: default_session_dir(),
            session_size: default_session_size(),
            trim_factor: default_trim_factor(),
            feedback_file: default_feedback_file(),
            generator: default_generator(),
            generator_args: Vec::new(),
            comment_marker: default_comment_marker(),
            destructive_mode: DestructiveMode::default(),
            history_lines: default_history_lines(),
            listing_cap: default_listing_cap(),
            widget_key: default_widget_key(),
        }
    }
}

impl Preferences {
    /// Load preferences from `$SHAI_CONFIG` (or the default config path) and
    /// apply `SHAI_*` environment overrides.
    pub fn load() -> Result<Self> {
        let path = match env::var_os("SHAI_CONFIG") {
            Some(p) => Some(PathBuf::from(p)),
            None => dirs::config_dir().map(|d| d.join(APP_DIR).join(FILENAME)),
        };
        let mut prefs = match path {
            Some(path) => Self::load_file(&path)?,
            None => Preferences::default(),
        };
        prefs.apply_env(|key| env::var(key).ok())?;
        prefs.validate()?;
        Ok(prefs)
    }

    /// Read a config file. A missing file yields the defaults; missing keys
    /// in an existing file are filled in by serde.
    pub fn load_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Apply overrides from an environment-style lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SHAI_SESSION_CAPTURE") {
            self.session_capture = parse_flag("SHAI_SESSION_CAPTURE", &v)?;
        }
        if let Some(v) = lookup("SHAI_INCLUDE_ALIASES") {
            self.include_aliases = parse_flag("SHAI_INCLUDE_ALIASES", &v)?;
        }
        if let Some(v) = lookup("SHAI_SESSION_DIR") {
            self.session_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHAI_SESSION_SIZE") {
            self.session_size = v
                .trim()
                .parse()
                .with_context(|| format!("SHAI_SESSION_SIZE: invalid count {v:?}"))?;
        }
        if let Some(v) = lookup("SHAI_TRIM_FACTOR") {
            self.trim_factor = v
                .trim()
                .parse()
                .with_context(|| format!("SHAI_TRIM_FACTOR: invalid factor {v:?}"))?;
        }
        if let Some(v) = lookup("SHAI_FEEDBACK_FILE") {
            self.feedback_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHAI_GENERATOR") {
            self.generator = v;
        }
        if let Some(v) = lookup("SHAI_DESTRUCTIVE_MODE") {
            self.destructive_mode = DestructiveMode::parse(&v)
                .with_context(|| format!("SHAI_DESTRUCTIVE_MODE: expected comment or report, got {v:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_size == 0 {
            bail!("session_size must be at least 1");
        }
        if self.trim_factor == 0 {
            bail!("trim_factor must be at least 1");
        }
        if self.generator.trim().is_empty() {
            bail!("generator must not be empty");
        }
        if !self.comment_marker.starts_with('#') || self.comment_marker.contains('\n') {
            bail!(
                "comment_marker must start with '#' and fit on one line, got {:?}",
                self.comment_marker
            );
        }
        Ok(())
    }

    /// Line count past which the session log is compacted.
    pub fn trim_threshold(&self) -> usize {
        self.trim_factor.saturating_mul(self.session_size)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => bail!("{key}: expected a boolean, got {value:?}"),
    }
}
