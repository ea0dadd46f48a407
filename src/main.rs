mod cli;
mod config;
mod progress;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use config::FileConfig;
use progress::TerminalProgress;
use rollout::{InstancePlan, Orchestrator, StateStore, SystemClock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Info by default so each discovered instance and pool step is logged
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp_secs()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            if let Some(advice) = advice(&err) {
                ui::advice(advice);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let state_file = file.state_file(cli.state_file.as_deref());
    log::debug!("Using state file {}", state_file.display());

    let aws = file.aws_client()?;
    let ssh = file.ssh();
    let clock = SystemClock;
    let orchestrator = Orchestrator::new(
        &aws,
        &ssh,
        &clock,
        StateStore::new(state_file),
        file.rollout.clone(),
    );

    let instances = orchestrator
        .discover(&aws, &cli.environment)
        .with_context(|| format!("Could not list instances in {}", cli.environment))?;

    let orphans = orchestrator.orphaned_records(&instances);
    for (id, pools) in &orphans {
        ui::warn(&format!(
            "{id} has a leftover record for {pools} but is not eligible in {}; re-admit it manually",
            cli.environment
        ));
    }

    if instances.is_empty() {
        ui::info(&format!("No instances tagged for update in {}", cli.environment));
        return Ok(());
    }

    if cli.dry_run {
        let plans = orchestrator.plan(&instances)?;
        print_plan(&plans, &file.rollout);
        return Ok(());
    }

    let mut progress = TerminalProgress::new(instances.len(), cli.quiet);
    let summary = orchestrator.run(&instances, &mut progress)?;

    if !cli.quiet {
        ui::header("Summary");
        ui::kv("instances", &summary.instances_completed.to_string());
        ui::kv("pools drained", &summary.pools_drained.to_string());
        ui::kv("pools rejoined", &summary.pools_rejoined.to_string());
        if summary.drain_timeouts > 0 {
            ui::warn(&format!(
                "{} did not finish draining in time",
                ui::count(summary.drain_timeouts, "pool")
            ));
        }
        ui::success("All done!");
    }
    Ok(())
}

fn print_plan(plans: &[InstancePlan], config: &rollout::RolloutConfig) {
    ui::header("Dry run");
    for (i, plan) in plans.iter().enumerate() {
        ui::step(i + 1, plans.len(), &plan.instance.to_string());
        if plan.membership.is_empty() {
            ui::dim("not in any load balancer; patch only");
        } else {
            ui::kv("pools", &plan.membership.to_string());
        }
        if !plan.recovered.is_empty() {
            ui::warn(&format!("recovering {} from an interrupted run", plan.recovered));
        }
    }
    println!();
    ui::kv(
        "rejoin wait",
        &format!(
            "up to {} per pool",
            ui::format_duration(config.max_rejoin_wait_seconds)
        ),
    );
    ui::kv("reboot", &format!("shutdown -r +{}", config.reboot_delay_minutes));
    ui::dim("No pools, hosts or state were changed.");
}

/// Operator advice for the innermost known error.
fn advice(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<rollout::Error>()
            .map(rollout::Error::advice)
            .or_else(|| {
                cause
                    .downcast_ref::<awskit::Error>()
                    .map(|e| e.category().advice())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advice_from_rollout_error() {
        let err = anyhow::Error::new(rollout::Error::backend("register web-a", "Throttling"))
            .context("run failed");
        assert_eq!(advice(&err), Some(rollout::ErrorCategory::Backend.advice()));
    }

    #[test]
    fn test_advice_from_aws_error() {
        let err = anyhow::Error::new(awskit::Error::AwsNotFound);
        assert_eq!(
            advice(&err),
            Some(awskit::ErrorCategory::AwsNotFound.advice())
        );
    }

    #[test]
    fn test_no_advice_for_other_errors() {
        let err = anyhow::anyhow!("something else");
        assert!(advice(&err).is_none());
    }
}
