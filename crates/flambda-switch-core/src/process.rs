//! External command execution.
//!
//! Every `git` and `opam` call goes through [`CommandRunner`], which takes an
//! [`Invocation`] and hands back a [`CommandOutput`] or a [`CommandError`].
//! [`SystemRunner`] spawns real processes; tests substitute a scripted runner.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;

use crate::Reporter;

/// Errors from running an external command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The executable does not exist.
    #[error("'{program}' not found. Is it installed and on PATH?")]
    NotFound {
        /// Program as given in the invocation.
        program: String,
    },

    /// The process could not be started for another reason.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("`{command}` failed with exit code {}", .code.map_or_else(|| "<signal>".to_string(), |c| c.to_string()))]
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured stdout (empty unless captured).
        stdout: String,
        /// Captured stderr (empty unless captured).
        stderr: String,
    },
}

/// A single external command: program, arguments, working directory and
/// whether its output should be captured instead of inherited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory; the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Capture output instead of inheriting the terminal.
    pub capture: bool,
}

impl Invocation {
    /// `program` with `args`, run in the current directory with inherited
    /// output.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            capture: false,
        }
    }

    /// Run inside `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Capture stdout/stderr rather than streaming them to the terminal.
    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a successful command. `stdout`/`stderr` are empty unless the
/// invocation asked for capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code.
    pub code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Executes [`Invocation`]s. Implementations block until the command exits.
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Failed`] on non-zero exit, or a spawn error if
    /// the program could not be started.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        (**self).run(invocation)
    }
}

/// Runs commands as child processes, blocking until each exits.
pub struct SystemRunner {
    reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for SystemRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRunner").finish_non_exhaustive()
    }
}

impl SystemRunner {
    /// Runner echoing commands and failures through `reporter`.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let line = invocation.to_string();
        self.reporter.command(&line);
        tracing::debug!(cwd = ?invocation.cwd, capture = invocation.capture, "spawning {line}");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let result = if invocation.capture {
            cmd.stdin(Stdio::inherit()).output().map(|o| {
                (
                    o.status,
                    String::from_utf8_lossy(&o.stdout).into_owned(),
                    String::from_utf8_lossy(&o.stderr).into_owned(),
                )
            })
        } else {
            cmd.status().map(|s| (s, String::new(), String::new()))
        };

        let (status, stdout, stderr) = match result {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CommandError::NotFound {
                    program: invocation.program.clone(),
                });
            }
            Err(source) => {
                return Err(CommandError::Spawn {
                    command: line,
                    source,
                });
            }
        };

        if !status.success() {
            let code = status.code();
            match code {
                Some(c) => self.reporter.error(&format!("Command failed with exit code {c}")),
                None => self.reporter.error("Command terminated by signal"),
            }
            if !stdout.trim().is_empty() {
                self.reporter.error(&format!("stdout: {}", stdout.trim_end()));
            }
            if !stderr.trim().is_empty() {
                self.reporter.error(&format!("stderr: {}", stderr.trim_end()));
            }
            return Err(CommandError::Failed {
                command: line,
                code,
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}
