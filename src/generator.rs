//! The external program that turns a request into a shell command.
//!
//! The generator reads recent history on stdin, writes the command on
//! stdout, writes explanations and warnings on stderr (passed straight
//! through to the terminal) and reports its verdict through the exit status.

use crate::safety::Classification;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Everything handed to the generator for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub query: String,
    pub history: Vec<String>,
    pub session_file: Option<PathBuf>,
    pub dir_context: String,
    pub quiet: bool,
}

/// Raw result of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub command: String,
}

impl GenerationOutput {
    pub fn classification(&self) -> Classification {
        Classification::from_status(self.status)
    }
}

pub trait Generator {
    fn generate(&self, request: &GenerationRequest) -> io::Result<GenerationOutput>;
}

/// Runs the configured program as a child process.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command_args(&self, request: &GenerationRequest) -> Vec<String> {
        let mut args = self.args.clone();
        if request.quiet {
            args.push("-q".into());
        }
        if let Some(path) = &request.session_file {
            args.push("--session-file".into());
            args.push(path.display().to_string());
        }
        args.push("--dir-context".into());
        args.push(request.dir_context.clone());
        args.push("--".into());
        args.extend(request.query.split_whitespace().map(String::from));
        args
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest) -> io::Result<GenerationOutput> {
        let mut child = Command::new(&self.program)
            .args(self.command_args(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut history = request.history.join("\n");
            if !history.is_empty() {
                history.push('\n');
            }
            // A generator that ignores stdin may exit before we finish.
            match stdin.write_all(history.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
            }
        }

        let output = child.wait_with_output()?;
        tracing::debug!(
            program = %self.program,
            status = ?output.status.code(),
            "generator finished"
        );
        Ok(GenerationOutput {
            status: output.status.code(),
            command: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            query: "list  files over\t100mb".into(),
            history: vec!["ls".into(), "cd src".into()],
            session_file: Some(PathBuf::from("/tmp/s/1.log")),
            dir_context: "/home/user".into(),
            quiet: true,
        }
    }

    #[test]
    fn arguments_follow_generator_cli() {
        let generator = CommandGenerator::new("shai-gen", vec!["--model".into(), "small".into()]);
        assert_eq!(
            generator.command_args(&request()),
            vec![
                "--model",
                "small",
                "-q",
                "--session-file",
                "/tmp/s/1.log",
                "--dir-context",
                "/home/user",
                "--",
                "list",
                "files",
                "over",
                "100mb",
            ]
        );
    }

    #[test]
    fn optional_arguments_are_omitted() {
        let generator = CommandGenerator::new("shai-gen", Vec::new());
        let req = GenerationRequest {
            query: "pwd".into(),
            ..Default::default()
        };
        assert_eq!(
            generator.command_args(&req),
            vec!["--dir-context", "", "--", "pwd"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn runs_program_and_captures_stdout_and_status() {
        let generator = CommandGenerator::new(
            "/bin/sh",
            vec![
                "-c".into(),
                "read first; echo \"rm -rf $first\"; exit 2".into(),
                "gen".into(),
            ],
        );
        let out = generator.generate(&request()).unwrap();
        assert_eq!(out.status, Some(2));
        assert_eq!(out.command, "rm -rf ls");
        assert_eq!(out.classification(), Classification::Destructive);
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let generator = CommandGenerator::new("/nonexistent/shai-gen-binary", Vec::new());
        assert!(generator.generate(&request()).is_err());
    }
}
