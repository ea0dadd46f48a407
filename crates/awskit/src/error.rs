//! Error types for aws CLI operations.
//!
//! The CLI reports service errors on stderr as
//! `An error occurred (Code) when calling the Operation operation: message`.
//! Errors are categorized from that text so callers can tell "instance not
//! registered" (often expected) apart from real failures.

use thiserror::Error;

/// Categories of aws CLI errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Load balancer or instance does not exist
    NotFound,
    /// Instance is not registered with the load balancer
    NotRegistered,
    /// Missing or expired credentials
    Credentials,
    /// API rate limit
    Throttled,
    /// Endpoint unreachable
    Network,
    /// aws CLI not installed
    AwsNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Verify the load balancer and instance ids",
            Self::NotRegistered => "No action needed - instance is not in the pool",
            Self::Credentials => "Refresh AWS credentials or pass a different --profile",
            Self::Throttled => "Wait a moment and re-run",
            Self::Network => "Check connectivity to the AWS endpoint and the configured region",
            Self::AwsNotFound => "Install the AWS CLI (https://aws.amazon.com/cli/)",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur running the aws CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// Resource does not exist
    #[error("not found: {message}")]
    NotFound {
        /// Service error message
        message: String,
    },

    /// Instance is not registered with the load balancer
    #[error("instance not registered: {message}")]
    NotRegistered {
        /// Service error message
        message: String,
    },

    /// Missing or expired credentials
    #[error("credentials error: {message}")]
    Credentials {
        /// CLI error message
        message: String,
    },

    /// Request throttled
    #[error("throttled: {message}")]
    Throttled {
        /// Service error message
        message: String,
    },

    /// Endpoint unreachable
    #[error("network error: {message}")]
    Network {
        /// CLI error message
        message: String,
    },

    /// aws CLI not found in PATH
    #[error("aws CLI not found. Install it from https://aws.amazon.com/cli/")]
    AwsNotFound,

    /// Command execution failed
    #[error("{message}: {stderr}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::NotRegistered { .. } => ErrorCategory::NotRegistered,
            Error::Credentials { .. } => ErrorCategory::Credentials,
            Error::Throttled { .. } => ErrorCategory::Throttled,
            Error::Network { .. } => ErrorCategory::Network,
            Error::AwsNotFound => ErrorCategory::AwsNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether the instance simply isn't in the pool.
    pub fn is_not_registered(&self) -> bool {
        self.category() == ErrorCategory::NotRegistered
    }

    /// Create an error from aws CLI stderr.
    pub fn from_aws_output(stderr: &str, command: &str) -> Self {
        let message = stderr.trim().to_string();

        if message.contains("(InvalidInstance)") || message.contains("(InvalidEndPoint)") {
            return Error::NotRegistered { message };
        }

        if message.contains("(LoadBalancerNotFound)")
            || message.contains("(AccessPointNotFound)")
            || message.contains("(InvalidInstanceID.NotFound)")
            || message.contains("(InvalidInstanceID.Malformed)")
        {
            return Error::NotFound { message };
        }

        if message.contains("Unable to locate credentials")
            || message.contains("(ExpiredToken)")
            || message.contains("(UnrecognizedClientException)")
            || message.contains("(AuthFailure)")
            || message.contains("(InvalidClientTokenId)")
        {
            return Error::Credentials { message };
        }

        if message.contains("(Throttling)") || message.contains("Rate exceeded") {
            return Error::Throttled { message };
        }

        if message.contains("Could not connect to the endpoint URL")
            || message.contains("Connect timeout")
            || message.contains("Read timeout")
        {
            return Error::Network { message };
        }

        Error::CommandFailed {
            message: format!("aws {command} failed"),
            stderr: message,
        }
    }

    /// Convert into the orchestrator's error type.
    pub fn into_backend(self, operation: impl Into<String>) -> rollout::Error {
        rollout::Error::backend(operation, self.to_string())
    }
}

/// Result type for aws CLI operations.
pub type Result<T> = std::result::Result<T, Error>;
