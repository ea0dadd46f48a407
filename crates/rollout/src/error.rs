//! Error types for rollout operations.
//!
//! Every error that reaches a caller is fatal to the run. Recoverable
//! conditions (a drain that outlives its timeout, an unreadable state file)
//! are logged where they happen and never surface as an [`Error`].

use crate::types::InstanceState;
use std::path::PathBuf;
use thiserror::Error;

/// Categories of rollout errors for operator feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Host OS family could not be matched to an update procedure
    UnknownOs,
    /// Instance did not become healthy after rejoining a pool
    Unhealthy,
    /// Remote command could not be run or exited non-zero
    Remote,
    /// Pool control or fleet directory API failure
    Backend,
    /// State file could not be written
    StateFile,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownOs => "Unrecognized OS family",
            Self::Unhealthy => "Instance failed health checks",
            Self::Remote => "Remote command failed",
            Self::Backend => "Load balancer or fleet API failure",
            Self::StateFile => "State file not writable",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::UnknownOs => {
                "Patch the host manually; it was drained but not updated. Re-run to re-admit it"
            }
            Self::Unhealthy => {
                "Check the instance and the pool health check, then re-run to resume from the state file"
            }
            Self::Remote => "Verify ssh access to the host, then re-run to resume from the state file",
            Self::Backend => "Check AWS credentials and pool names, then re-run",
            Self::StateFile => "Fix permissions on the state file path or pass --state-file",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while rolling patches through a fleet.
#[derive(Debug, Error)]
pub enum Error {
    /// `lsb_release` output did not match a supported OS family
    #[error("unrecognized OS family on {address}: {output:?}")]
    UnrecognizedOs {
        /// Host the command ran on
        address: String,
        /// Raw identification output
        output: String,
    },

    /// Instance never reported InService after registration
    #[error(
        "instance {instance} failed to become healthy in pool {pool} within {waited_secs}s ({polls} polls)"
    )]
    RejoinTimeout {
        /// Pool the instance was registered in
        pool: String,
        /// Instance identifier
        instance: String,
        /// Total seconds spent polling
        waited_secs: u64,
        /// Number of health polls issued
        polls: u64,
    },

    /// Remote command failed (unreachable host or non-zero exit)
    #[error("remote command failed on {address}: `{command}`: {message}")]
    RemoteCommand {
        /// Host the command ran on
        address: String,
        /// The command line
        command: String,
        /// Captured output or spawn error
        message: String,
    },

    /// Collaborator API failure (pool control, fleet directory)
    #[error("{operation} failed: {message}")]
    Backend {
        /// Operation that failed, e.g. `deregister web-a`
        operation: String,
        /// Details from the backend
        message: String,
    },

    /// State file could not be written
    #[error("failed to write state file {path}: {source}")]
    StateFile {
        /// Path of the state file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Orchestrator attempted an illegal state transition
    #[error("invalid transition for {instance}: {from} -> {to}")]
    InvalidTransition {
        /// Instance identifier
        instance: String,
        /// Current state
        from: InstanceState,
        /// Requested state
        to: InstanceState,
    },

    /// A fatal error aborted processing of an instance
    #[error("aborted {instance} ({state}{}): {source}", .pool.as_ref().map(|p| format!(", pool {p}")).unwrap_or_default())]
    Aborted {
        /// Instance identifier
        instance: String,
        /// State the instance was in when the run aborted
        state: InstanceState,
        /// Pool being processed, if any
        pool: Option<String>,
        /// Root cause
        #[source]
        source: Box<Error>,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category, looking through [`Error::Aborted`].
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnrecognizedOs { .. } => ErrorCategory::UnknownOs,
            Error::RejoinTimeout { .. } => ErrorCategory::Unhealthy,
            Error::RemoteCommand { .. } => ErrorCategory::Remote,
            Error::Backend { .. } => ErrorCategory::Backend,
            Error::StateFile { .. } => ErrorCategory::StateFile,
            Error::Aborted { source, .. } => source.category(),
            Error::InvalidTransition { .. } | Error::Json(_) => ErrorCategory::Other,
        }
    }

    /// Advice shown to the operator before the process exits.
    pub fn advice(&self) -> &'static str {
        self.category().advice()
    }

    /// Shorthand for a backend failure.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result type for rollout operations.
pub type Result<T> = std::result::Result<T, Error>;
