//! # External Command Execution
//!
//! Every interaction with `git`, `docker`, `ssh` and `rsync` goes through a
//! [`CommandLine`]: an ordered list of argument tokens plus environment and
//! working directory. It is rendered to an argument vector only when it is
//! handed to a [`CommandRunner`], so no shell is ever involved and the exact
//! invocation can be asserted on in tests.
//!
//! [`SystemRunner`] spawns real processes. Tests swap in a recording runner
//! that returns scripted outputs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{Error, Result};

/// A structured command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    cwd: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `flag value` as two tokens.
    pub fn opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Appends `flag` only when `enabled` is true.
    pub fn flag_if(self, enabled: bool, flag: &str) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{}={} ", key, value)?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How the child's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// stdout and stderr are collected and returned.
    Capture,
    /// stdio is attached to the terminal.
    Inherit,
}

/// The result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes command lines. Allows mocking in tests.
pub trait CommandRunner {
    /// Runs the command to completion. Only a failure to spawn is an error;
    /// the exit status is reported in the output.
    fn execute(&self, cmd: &CommandLine, mode: OutputMode) -> Result<CommandOutput>;

    /// Runs with captured output and fails on a non-zero exit.
    fn run_captured(&self, cmd: &CommandLine) -> Result<String> {
        let output = self.execute(cmd, OutputMode::Capture)?;
        check(cmd, output).map(|o| o.stdout)
    }

    /// Runs attached to the terminal and fails on a non-zero exit.
    fn run_streamed(&self, cmd: &CommandLine) -> Result<()> {
        let output = self.execute(cmd, OutputMode::Inherit)?;
        check(cmd, output).map(|_| ())
    }

    /// Runs attached to the terminal, tolerating a non-zero exit.
    fn run_best_effort(&self, cmd: &CommandLine) -> Result<Option<i32>> {
        let output = self.execute(cmd, OutputMode::Inherit)?;
        if !output.is_success() {
            debug!("Ignoring non-zero exit of best-effort command: {}", cmd);
        }
        Ok(output.code)
    }
}

/// Turns a non-zero exit into [`Error::ToolFailed`].
pub fn check(cmd: &CommandLine, output: CommandOutput) -> Result<CommandOutput> {
    if output.is_success() {
        Ok(output)
    } else {
        Err(Error::ToolFailed {
            tool: cmd.program().to_string(),
            command: cmd.to_string(),
            code: output.code,
            stderr: output.stderr,
        })
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(&self, cmd: &CommandLine, mode: OutputMode) -> Result<CommandOutput> {
        debug!("Running: {}", cmd);

        let mut command = Command::new(cmd.program());
        command.args(cmd.get_args());
        for (key, value) in cmd.get_envs() {
            command.env(key, value);
        }
        if let Some(dir) = cmd.get_current_dir() {
            command.current_dir(dir);
        }

        let spawn_error = |source| Error::ToolSpawn {
            tool: cmd.program().to_string(),
            source,
        };

        match mode {
            OutputMode::Capture => {
                let output = command.stdin(Stdio::null()).output().map_err(spawn_error)?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            OutputMode::Inherit => {
                let status = command.status().map_err(spawn_error)?;
                Ok(CommandOutput {
                    code: status.code(),
                    ..CommandOutput::default()
                })
            }
        }
    }
}
