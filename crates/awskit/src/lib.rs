//! # awskit
//!
//! EC2 fleet discovery and classic ELB pool control through the `aws` CLI.
//!
//! [`Client`] implements the `rollout` collaborator traits:
//! - [`rollout::FleetDirectory`] via `aws ec2 describe-instances`
//! - [`rollout::PoolControl`] via `aws elb ...`
//!
//! Credentials, region and retries are whatever the CLI is configured with;
//! `--region` and `--profile` can be overridden per client.
//!
//! ## Example
//!
//! ```no_run
//! use awskit::Client;
//! use rollout::PoolControl;
//!
//! let client = Client::new().expect("aws CLI not available").with_region("us-west-2");
//! for pool in client.describe_pools_containing("i-0abc123").unwrap() {
//!     println!("{pool}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ec2;
pub mod elb;
pub mod error;

pub use error::{Error, ErrorCategory, Result};

use std::process::Command;

/// Handle to the aws CLI.
#[derive(Debug, Clone)]
pub struct Client {
    aws_path: String,
    region: Option<String>,
    profile: Option<String>,
}

impl Client {
    /// Create a client using `aws` from PATH.
    ///
    /// Returns an error if the aws CLI is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            aws_path: find_aws()?,
            region: None,
            profile: None,
        })
    }

    /// Use an explicit aws binary.
    pub fn with_path(aws_path: impl Into<String>) -> Self {
        Self {
            aws_path: aws_path.into(),
            region: None,
            profile: None,
        }
    }

    /// Pass `--region` on every call.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Pass `--profile` on every call.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Full argument list for one call.
    fn args<'s>(&'s self, args: &[&'s str]) -> Vec<&'s str> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--output", "json"]);
        if let Some(region) = &self.region {
            full.extend(["--region", region.as_str()]);
        }
        if let Some(profile) = &self.profile {
            full.extend(["--profile", profile.as_str()]);
        }
        full
    }

    /// Run an aws command and return stdout.
    pub(crate) fn run_aws(&self, args: &[&str]) -> Result<String> {
        let full = self.args(args);
        log::debug!("aws {}", full.join(" "));

        let output = Command::new(&self.aws_path)
            .args(&full)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::AwsNotFound
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let command = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
            return Err(Error::from_aws_output(&stderr, &command));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        log::trace!("response was: {stdout}");
        Ok(stdout)
    }
}

/// Find the aws executable path.
fn find_aws() -> Result<String> {
    let output = Command::new("which")
        .arg("aws")
        .output()
        .map_err(|_| Error::AwsNotFound)?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Ok(path);
        }
    }

    Err(Error::AwsNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_plain() {
        let client = Client::with_path("aws");
        assert_eq!(
            client.args(&["elb", "describe-load-balancers"]),
            vec!["elb", "describe-load-balancers", "--output", "json"]
        );
    }

    #[test]
    fn test_args_region_and_profile() {
        let client = Client::with_path("aws")
            .with_region("eu-west-1")
            .with_profile("ops");
        let args = client.args(&["ec2", "describe-instances"]);
        assert!(args.windows(2).any(|w| w == ["--region", "eu-west-1"]));
        assert!(args.windows(2).any(|w| w == ["--profile", "ops"]));
    }

    #[test]
    fn test_missing_binary() {
        let client = Client::with_path("/nonexistent/aws");
        let err = client.run_aws(&["elb", "describe-load-balancers"]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::AwsNotFound);
    }
}
