use anyhow::{Context, Result};
use rollout::RolloutConfig;
use rollout::backend::ssh::SshExec;
use rollout::store::DEFAULT_STATE_FILE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings read from `--config`.
///
/// Timing keys sit at the top level next to the AWS and ssh settings:
///
/// ```toml
/// max_rejoin_wait_seconds = 600
/// region = "us-west-2"
/// ssh_user = "ubuntu"
/// ssh_options = ["IdentityFile=~/.ssh/patching"]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(flatten)]
    pub rollout: RolloutConfig,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub ssh_user: Option<String>,
    pub ssh_options: Vec<String>,
    pub state_file: Option<String>,
}

impl FileConfig {
    /// Load a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand(&path.to_string_lossy());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.rollout.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// State file path: `-f` wins over the config file, then the default.
    pub fn state_file(&self, cli: Option<&Path>) -> PathBuf {
        match (cli, &self.state_file) {
            (Some(path), _) => expand(&path.to_string_lossy()),
            (None, Some(path)) => expand(path),
            (None, None) => PathBuf::from(DEFAULT_STATE_FILE),
        }
    }

    /// Build the AWS client.
    pub fn aws_client(&self) -> Result<awskit::Client> {
        let mut client = awskit::Client::new()?;
        if let Some(region) = &self.region {
            client = client.with_region(region);
        }
        if let Some(profile) = &self.profile {
            client = client.with_profile(profile);
        }
        Ok(client)
    }

    /// Build the ssh transport.
    pub fn ssh(&self) -> SshExec {
        let ssh = SshExec::new().with_options(self.ssh_options.iter().map(|o| expand_option(o)));
        match &self.ssh_user {
            Some(user) => ssh.with_user(user),
            None => ssh,
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Expand `~` in the value of a `Key=Value` ssh option.
fn expand_option(option: &str) -> String {
    match option.split_once('=') {
        Some((key, value)) => format!("{key}={}", shellexpand::tilde(value)),
        None => option.to_string(),
    }
}
