#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// An isolated home for one test: config, session directory, feedback file
/// and a scripted generator all live under a temp dir.
pub struct TestEnv {
    pub dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("work")).unwrap();
        fs::write(dir.path().join("work").join("big.iso"), "").unwrap();
        let env = Self { dir };
        env.write_config("");
        env
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    pub fn session_dir(&self) -> PathBuf {
        self.path().join("sessions")
    }

    pub fn session_log(&self, pid: u32) -> PathBuf {
        self.session_dir().join(format!("{pid}.log"))
    }

    pub fn state_file(&self, pid: u32) -> PathBuf {
        self.session_dir().join(format!("{pid}.state.json"))
    }

    pub fn feedback_file(&self) -> PathBuf {
        self.path().join("feedback.jsonl")
    }

    /// Write the config file; `extra` is appended verbatim.
    pub fn write_config(&self, extra: &str) {
        let script = self.path().join("gen.sh");
        let config = format!(
            "generator = \"/bin/sh\"\ngenerator_args = [{script:?}]\n{extra}\n",
            script = script.display().to_string()
        );
        fs::write(self.config_path(), config).unwrap();
    }

    /// Script the generator to print `command` and exit with `status`. The
    /// arguments and stdin it received are saved next to it.
    pub fn generator_answers(&self, status: i32, command: &str) {
        let dir = self.path().display().to_string();
        fs::write(self.path().join("answer.txt"), format!("{command}\n")).unwrap();
        let script = format!(
            "printf '%s\\n' \"$@\" > '{dir}/args.txt'\n\
             cat > '{dir}/stdin.txt'\n\
             echo 'generator explanation' >&2\n\
             cat '{dir}/answer.txt'\n\
             exit {status}\n"
        );
        fs::write(self.path().join("gen.sh"), script).unwrap();
    }

    pub fn generator_args(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("args.txt"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn generator_stdin(&self) -> Option<String> {
        fs::read_to_string(self.path().join("stdin.txt")).ok()
    }

    pub fn feedback(&self) -> Vec<serde_json::Value> {
        fs::read_to_string(self.feedback_file())
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    pub fn run(&self, args: &[&str], stdin: &str) -> (i32, String, String) {
        self.run_with_env(args, stdin, &[])
    }

    pub fn run_with_env(
        &self,
        args: &[&str],
        stdin: &str,
        vars: &[(&str, &str)],
    ) -> (i32, String, String) {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_shai"));
        cmd.args(args)
            .current_dir(self.path().join("work"))
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("HOME", self.path())
            .env("SHAI_CONFIG", self.config_path())
            .env("SHAI_SESSION_DIR", self.session_dir())
            .env("SHAI_FEEDBACK_FILE", self.feedback_file())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in vars {
            cmd.env(key, value);
        }
        let mut child = cmd.spawn().expect("failed to spawn binary");

        // The binary may exit without reading stdin (e.g. on a usage error).
        if let Some(mut pipe) = child.stdin.take() {
            let _ = pipe.write_all(stdin.as_bytes());
        }

        let output = child.wait_with_output().unwrap();
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }

    /// Run one dispatch/complete pair for shell `pid`.
    pub fn run_command(&self, pid: u32, command: &str, status: i32) {
        let pid = pid.to_string();
        let status = status.to_string();
        let (code, _, stderr) = self.run(&["hook", "dispatch", "--pid", &pid, "--", command], "");
        assert_eq!(code, 0, "dispatch failed: {stderr}");
        let (code, _, stderr) =
            self.run(&["hook", "complete", "--pid", &pid, "--status", &status], "");
        assert_eq!(code, 0, "complete failed: {stderr}");
    }
}
