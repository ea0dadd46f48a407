//! Remote execution over the system `ssh` client.

use crate::backend::RemoteExec;
use crate::error::{Error, Result};
use std::process::Command;

/// Options passed to every ssh invocation.
///
/// Batch mode never prompts; host keys are not checked because patched
/// hosts are addressed by private IP and those get reused.
const DEFAULT_OPTIONS: &[&str] = &[
    "BatchMode=yes",
    "ConnectionAttempts=3",
    "ConnectTimeout=30",
    "LogLevel=ERROR",
    "StrictHostKeyChecking=no",
];

/// [`RemoteExec`] that shells out to `ssh`.
#[derive(Debug, Clone)]
pub struct SshExec {
    program: String,
    user: Option<String>,
    extra_options: Vec<String>,
}

impl SshExec {
    /// Use `ssh` from PATH with the default options.
    pub fn new() -> Self {
        Self {
            program: "ssh".to_string(),
            user: None,
            extra_options: Vec::new(),
        }
    }

    /// Log in as `user` (`-l user`).
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add extra `-o` options, e.g. `IdentityFile=~/.ssh/patch`.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Use a different ssh binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments for one invocation, excluding the program name.
    fn args(&self, address: &str, command: &str) -> Vec<String> {
        let mut args = Vec::new();
        for opt in DEFAULT_OPTIONS
            .iter()
            .copied()
            .chain(self.extra_options.iter().map(String::as_str))
        {
            args.push("-o".to_string());
            args.push(opt.to_string());
        }
        if let Some(user) = &self.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        args.push(address.to_string());
        args.push(command.to_string());
        args
    }
}

impl Default for SshExec {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExec for SshExec {
    fn run_command(&self, address: &str, command: &str) -> Result<String> {
        log::debug!("ssh {address}: {command}");

        let output = Command::new(&self.program)
            .args(self.args(address, command))
            .output()
            .map_err(|e| Error::RemoteCommand {
                address: address.to_string(),
                command: command.to_string(),
                message: format!("failed to execute {}: {e}", self.program),
            })?;

        let combined = combine_output(&output.stdout, &output.stderr);

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map(|c| format!("exit status {c}"))
                .unwrap_or_else(|| "terminated by signal".to_string());
            return Err(Error::RemoteCommand {
                address: address.to_string(),
                command: command.to_string(),
                message: if combined.is_empty() {
                    status
                } else {
                    format!("{status}: {combined}")
                },
            });
        }

        Ok(combined)
    }
}

/// Join stdout and stderr the way a terminal would show them, trimmed.
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim(), stderr.trim()) {
        (out, "") => out.to_string(),
        ("", err) => err.to_string(),
        (out, err) => format!("{out}\n{err}"),
    }
}
