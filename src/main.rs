//! shai: natural-language requests turned into commands staged in the
//! interactive shell, plus the hooks that record what actually ran.
//!
//! ## Subcommands
//!
//! - `hook dispatch|complete|exit`: forwarded shell lifecycle hooks (never fail)
//! - `ask`: the `shai` shell function; prints the buffer to stage
//! - `widget`: the key-bound widget; prints the replacement buffer
//! - `init`: prints the shell integration

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use shai::assistant::{self, Assistant, Request, staged_exit_code};
use shai::generator::CommandGenerator;
use shai::preferences::Preferences;
use shai::safety::{EXIT_ERROR, Staged};
use shai::session::{ShellHooks, ShellSession};
use shai::{context, init, logging};
use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "shai")]
#[command(about = "Turn requests into shell commands, staged for review")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shell lifecycle events (called by the shell integration)
    Hook {
        #[command(subcommand)]
        event: HookEvent,
    },

    /// Generate a command and print the buffer to stage
    Ask {
        /// Shell process ID
        #[arg(long)]
        pid: u32,

        /// Hide the generator's explanation
        #[arg(short, long)]
        quiet: bool,

        /// Alias definitions to include as context
        #[arg(long)]
        aliases: Option<String>,

        /// What the command should do
        #[arg(value_name = "REQUEST", trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Replace the line-editor buffer with a generated command
    Widget {
        /// Shell process ID
        #[arg(long)]
        pid: u32,

        /// Alias definitions to include as context
        #[arg(long)]
        aliases: Option<String>,

        /// Current buffer contents
        #[arg(value_name = "BUFFER", allow_hyphen_values = true, default_value = "")]
        buffer: String,
    },

    /// Print the shell integration script
    Init {
        #[arg(value_enum)]
        shell: init::Shell,
    },
}

#[derive(Subcommand)]
enum HookEvent {
    /// A command is about to run
    Dispatch {
        #[arg(long)]
        pid: u32,

        /// Command line as typed
        #[arg(value_name = "COMMAND", allow_hyphen_values = true, default_value = "")]
        command: String,
    },

    /// The previous command finished
    Complete {
        #[arg(long)]
        pid: u32,

        /// Exit status of the finished command
        #[arg(long, allow_hyphen_values = true)]
        status: i32,
    },

    /// The shell is exiting
    Exit {
        #[arg(long)]
        pid: u32,
    },
}

fn current_dir() -> PathBuf {
    env::current_dir()
        .ok()
        .or_else(|| env::var_os("PWD").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Recent history: piped stdin when available, otherwise `$HISTFILE`.
fn read_history() -> String {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut buffer = String::new();
        match stdin.lock().read_to_string(&mut buffer) {
            Ok(_) => return buffer,
            Err(err) => tracing::debug!(error = %err, "history not readable from stdin"),
        }
    }
    env::var_os("HISTFILE")
        .map(PathBuf::from)
        .and_then(|path| match context::read_history_file(&path) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::debug!(error = %format!("{err:#}"), "history file not readable");
                None
            }
        })
        .unwrap_or_default()
}

fn run_hook(event: HookEvent) {
    // Instrumentation must never break the shell: every failure stops here.
    let prefs = match Preferences::load() {
        Ok(p) => p,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "hook skipped: configuration invalid");
            return;
        }
    };
    match event {
        HookEvent::Dispatch { pid, command } => {
            let mut session = ShellSession::open(&prefs, pid);
            session.on_dispatch(&command, &current_dir(), Local::now());
            save_quietly(&session);
        }
        HookEvent::Complete { pid, status } => {
            let mut session = ShellSession::open(&prefs, pid);
            session.on_complete(status);
            save_quietly(&session);
        }
        HookEvent::Exit { pid } => {
            ShellSession::fresh(&prefs, pid).on_exit();
        }
    }
}

fn save_quietly(session: &ShellSession) {
    if let Err(err) = session.save() {
        tracing::debug!(pid = session.pid(), error = %format!("{err:#}"), "shell state not saved");
    }
}

fn run_ask(pid: u32, quiet: bool, aliases: Option<String>, words: Vec<String>) -> Result<i32> {
    let query = words.join(" ");
    if assistant::normalize_query(&query).is_empty() {
        eprintln!("{}", assistant::AskError::EmptyQuery);
        return Ok(EXIT_ERROR);
    }
    let prefs = Preferences::load()?;

    let cwd = current_dir();
    let history = read_history();
    let generator = CommandGenerator::new(prefs.generator.clone(), prefs.generator_args.clone());
    let assistant = Assistant::new(&prefs, generator);
    let mut session = ShellSession::open(&prefs, pid);
    let request = Request {
        query: &query,
        cwd: &cwd,
        history: &history,
        aliases: aliases.as_deref(),
        quiet,
    };

    let result = assistant.ask(&mut session, &request);
    save_quietly(&session);
    match result {
        Ok(staged) => {
            match &staged {
                Staged::Runnable(text) | Staged::Commented(text) => println!("{text}"),
                Staged::Reported(command) => {
                    eprintln!("shai: destructive command not staged, review before running:");
                    eprintln!("    {command}");
                }
            }
            Ok(staged_exit_code(&staged))
        }
        Err(err) => {
            eprintln!("shai: {err}");
            Ok(err.exit_code())
        }
    }
}

fn run_widget(pid: u32, aliases: Option<String>, buffer: String) -> Result<i32> {
    let prefs = Preferences::load()?;
    let cwd = current_dir();
    let history = read_history();
    let generator = CommandGenerator::new(prefs.generator.clone(), prefs.generator_args.clone());
    let assistant = Assistant::new(&prefs, generator);
    let mut session = ShellSession::open(&prefs, pid);
    let request = Request {
        query: &buffer,
        cwd: &cwd,
        history: &history,
        aliases: aliases.as_deref(),
        quiet: true,
    };

    let outcome = assistant.widget(&mut session, &request);
    save_quietly(&session);
    if let Some(command) = &outcome.reported {
        eprintln!("shai: destructive command not staged: {command}");
    }
    println!("{}", outcome.buffer);
    Ok(outcome.exit_code)
}

fn run_init(shell: init::Shell) -> Result<i32> {
    let prefs = Preferences::load()?;
    let bin = env::current_exe()
        .ok()
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "shai".into());
    println!("{}", init::render(shell, &bin, &prefs)?);
    Ok(0)
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Hook { event } => {
            run_hook(event);
            Ok(0)
        }
        Commands::Ask {
            pid,
            quiet,
            aliases,
            words,
        } => run_ask(pid, quiet, aliases, words),
        Commands::Widget {
            pid,
            aliases,
            buffer,
        } => run_widget(pid, aliases, buffer),
        Commands::Init { shell } => run_init(shell),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("shai: {err:#}");
            process::exit(EXIT_ERROR);
        }
    }
}
