//! Tool execution.
//!
//! Phases never spawn processes directly. They describe what to run as an
//! [`Invocation`] and hand it to an [`Executor`], which tests replace with a
//! recording mock.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::util::process::{find_executable, ProcessBuilder};

/// One tool invocation: program, ordered arguments, working directory and
/// environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(tool: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Invocation {
            tool: tool.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The command line as one string, for logs and reports.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.tool.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status and combined stdout/stderr of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub output: String,
}

impl ExecOutput {
    pub fn success(output: impl Into<String>) -> Self {
        ExecOutput {
            status: Some(0),
            output: output.into(),
        }
    }

    pub fn failure(status: i32, output: impl Into<String>) -> Self {
        ExecOutput {
            status: Some(status),
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs invocations. Shared across worker threads.
pub trait Executor: Send + Sync {
    /// Run one invocation to completion.
    ///
    /// `Err` means the tool could not be run at all; a tool that ran and
    /// failed is an `Ok` with a non-zero status.
    fn run(&self, invocation: &Invocation) -> Result<ExecOutput>;
}

/// Runs invocations as real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        ProcessExecutor
    }
}

impl Executor for ProcessExecutor {
    fn run(&self, invocation: &Invocation) -> Result<ExecOutput> {
        let program = find_executable(&invocation.tool).ok_or_else(|| {
            anyhow!(
                "`{}` not found\n\nInstall it and ensure it's in your PATH.",
                invocation.tool
            )
        })?;

        let cmd = invocation
            .env
            .iter()
            .fold(ProcessBuilder::new(&program), |cmd, (k, v)| cmd.env(k, v))
            .args(&invocation.args)
            .cwd(&invocation.cwd);

        tracing::debug!(command = %cmd.display_command(), cwd = %invocation.cwd.display(), "running");
        let (status, output) = cmd.exec_combined()?;
        Ok(ExecOutput { status, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("make", "/tmp/build")
            .arg("-j4")
            .args(["install"])
            .env("KILN_PREFIX", "/opt/zlib");
        assert_eq!(inv.command_line(), "make -j4 install");
        assert_eq!(inv.env["KILN_PREFIX"], "/opt/zlib");
        assert_eq!(inv.to_string(), "make -j4 install");
    }

    #[test]
    fn test_exec_output() {
        assert!(ExecOutput::success("").is_success());
        assert!(!ExecOutput::failure(2, "boom").is_success());
        let killed = ExecOutput {
            status: None,
            output: String::new(),
        };
        assert!(!killed.is_success());
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("kiln-definitely-not-a-tool", tmp.path());
        let err = ProcessExecutor::new().run(&inv).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_executor_runs_in_cwd() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "").unwrap();
        let inv = Invocation::new("ls", tmp.path());
        let out = ProcessExecutor::new().run(&inv).unwrap();
        assert!(out.is_success());
        assert!(out.output.contains("marker.txt"));
    }
}
