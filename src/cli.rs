use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "updatetool")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Drain, patch, reboot and rejoin every auto-update instance in an environment",
    long_about = None
)]
pub struct Cli {
    /// Environment tag value selecting the instances to patch
    pub environment: String,

    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Recovery state file [default: updatetool.state]
    #[arg(short = 'f', long, env = "UPDATETOOL_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// TOML file with timing, AWS and ssh settings
    #[arg(short, long, env = "UPDATETOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Resolve pool membership and print the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,
}
