// SPDX-License-Identifier: GPL-3.0-only

//! External command execution
//!
//! [`SystemRunner`] is the only place a process is spawned and the only place
//! captured output is split into rows and fields.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info, warn};

/// One line of output, split on horizontal tabs
pub type Row = Vec<String>;

/// Failure to run an external command
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to run {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} {} failed: {}", .arguments.join(" "), .stderr.trim_end())]
    Failed {
        command: String,
        arguments: Vec<String>,
        status: Option<i32>,
        /// Standard error of the command, unmodified
        stderr: String,
    },
}

impl ExecutionError {
    /// Diagnostic text reported by the external tool
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Io { source, .. } => source.to_string(),
            Self::Failed { stderr, .. } => stderr.clone(),
        }
    }

    /// Whether the tool reported that the named dataset does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Failed { stderr, .. } if stderr.contains("does not exist"))
    }
}

/// A single external program call
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    stdin: Option<Box<dyn Read + Send>>,
    stdout: Option<Box<dyn Write + Send>>,
}

impl CommandInvocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            stdout: None,
        }
    }

    /// Feed the command's standard input from `reader`
    pub fn with_stdin(mut self, reader: impl Read + Send + 'static) -> Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    /// Stream standard output into `sink` instead of capturing it
    pub fn with_stdout(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stdout = Some(Box::new(sink));
        self
    }

    pub fn has_stdout_sink(&self) -> bool {
        self.stdout.is_some()
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInvocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .finish()
    }
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Standard output was captured and split into rows
    Captured(Vec<Row>),
    /// Standard output went to the caller's sink
    Streamed,
}

impl CommandOutput {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Captured(rows) => rows,
            Self::Streamed => Vec::new(),
        }
    }
}

/// Runs external commands on behalf of the repository and lifecycle engine
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: CommandInvocation) -> Result<CommandOutput, ExecutionError>;
}

/// Split captured output into tab-separated rows
///
/// The empty line produced by a final newline is discarded.
pub fn split_rows(output: &str) -> Vec<Row> {
    let body = output.strip_suffix('\n').unwrap_or(output);
    if body.is_empty() {
        return Vec::new();
    }

    body.split('\n')
        .map(|line| line.split('\t').map(ToString::to_string).collect())
        .collect()
}

/// Runs commands as child processes of the daemon
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn resolve(program: &str) -> PathBuf {
        which::which(program).unwrap_or_else(|_| PathBuf::from(program))
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: CommandInvocation) -> Result<CommandOutput, ExecutionError> {
        let CommandInvocation {
            program,
            args,
            stdin,
            stdout,
        } = invocation;

        let path = Self::resolve(&program);
        info!(target: "zfsd_sys::command", "{} {}", path.display(), args.join(" "));

        let io_error = |source: io::Error| ExecutionError::Io {
            command: program.clone(),
            source,
        };

        let mut child = Command::new(&path)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_error)?;

        let stdin_feeder = match (stdin, child.stdin.take()) {
            (Some(mut reader), Some(mut pipe)) => Some(thread::spawn(move || {
                if let Err(e) = io::copy(&mut reader, &mut pipe) {
                    debug!("stdin closed early: {e}");
                }
            })),
            _ => None,
        };

        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                pipe.read_to_end(&mut buffer).map(|_| buffer)
            })
        });

        let captured = match drain_stdout(child.stdout.take(), stdout) {
            Ok(captured) => captured,
            Err(e) => {
                warn!("Lost stdout of {program}, stopping it: {e}");
                let _ = child.kill();
                let _ = child.wait();
                join_quietly(stdin_feeder);
                join_quietly(stderr_reader);
                return Err(io_error(e));
            }
        };

        let status = child.wait().map_err(io_error)?;

        join_quietly(stdin_feeder);
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .and_then(|result| result.ok())
            .unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).to_string();
            warn!("{program} exited with {status}: {}", stderr.trim_end());
            return Err(ExecutionError::Failed {
                command: program,
                arguments: args,
                status: status.code(),
                stderr,
            });
        }

        Ok(match captured {
            Some(buffer) => CommandOutput::Captured(split_rows(&String::from_utf8_lossy(&buffer))),
            None => CommandOutput::Streamed,
        })
    }
}

/// Copy stdout into `sink`, or capture it when there is none
fn drain_stdout(
    pipe: Option<ChildStdout>,
    sink: Option<Box<dyn Write + Send>>,
) -> io::Result<Option<Vec<u8>>> {
    let Some(mut pipe) = pipe else {
        return Ok(None);
    };
    match sink {
        Some(mut sink) => {
            io::copy(&mut pipe, &mut sink)?;
            sink.flush()?;
            Ok(None)
        }
        None => {
            let mut buffer = Vec::new();
            pipe.read_to_end(&mut buffer)?;
            Ok(Some(buffer))
        }
    }
}

fn join_quietly<T>(handle: Option<JoinHandle<T>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}
