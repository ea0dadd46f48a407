//! OS update and reboot of a single host.

use crate::backend::RemoteExec;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::{OsFamily, PatchReport};
use std::time::Duration;

/// Command that prints the distributor id.
pub const IDENTIFY_OS_COMMAND: &str = "lsb_release -si";

/// Runs the update sequence for a host's OS family and schedules a reboot.
pub struct PatchExecutor<'a> {
    remote: &'a dyn RemoteExec,
    clock: &'a dyn Clock,
    reboot_delay_minutes: u64,
    post_reboot_wait: Duration,
}

impl<'a> PatchExecutor<'a> {
    /// Create an executor.
    ///
    /// `post_reboot_wait` is slept after the sequence so the host starts
    /// shutting down before anything re-registers it.
    pub fn new(
        remote: &'a dyn RemoteExec,
        clock: &'a dyn Clock,
        reboot_delay_minutes: u64,
        post_reboot_wait: Duration,
    ) -> Self {
        Self {
            remote,
            clock,
            reboot_delay_minutes,
            post_reboot_wait,
        }
    }

    /// Detect the OS family of `address`, run its update sequence, then
    /// wait for the scheduled reboot to begin.
    ///
    /// An unrecognized OS family is fatal: nothing is run on the host.
    pub fn patch_and_reboot(&self, address: &str) -> Result<PatchReport> {
        log::info!("Installing updates on host [{address}]...");

        let release_id = self.remote.run_command(address, IDENTIFY_OS_COMMAND)?;
        let Some(os_family) = OsFamily::from_release_id(&release_id) else {
            log::error!("Failed to determine OS flavor.  ***NOT UPDATING HOST***");
            log::info!(
                "Output was:\n---[start output]---\n{release_id}\n---[end output]---"
            );
            return Err(Error::UnrecognizedOs {
                address: address.to_string(),
                output: release_id,
            });
        };
        log::info!("{os_family} system detected on [{address}]");

        let commands = os_family.update_commands(self.reboot_delay_minutes);
        for cmd in &commands {
            let output = self.remote.run_command(address, cmd)?;
            log::info!("---[start remote output]---\n{output}\n---[end remote output]---");
        }

        log::info!("Waiting for host [{address}] reboot to initiate...");
        self.clock.sleep(self.post_reboot_wait);

        Ok(PatchReport {
            os_family,
            commands_run: commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MockRemote};

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn test_ubuntu_sequence() {
        let remote = MockRemote::new("Ubuntu");
        let clock = ManualClock::new();

        let report = PatchExecutor::new(&remote, &clock, 0, WAIT)
            .patch_and_reboot("10.0.0.1")
            .unwrap();

        assert_eq!(report.os_family, OsFamily::Ubuntu);
        let commands: Vec<String> = remote.commands().into_iter().map(|(_, c)| c).collect();
        assert_eq!(commands[0], IDENTIFY_OS_COMMAND);
        assert_eq!(commands[1], "sudo apt-get -y -q update");
        assert!(commands[2].ends_with("upgrade"));
        assert!(commands[3].ends_with("dist-upgrade"));
        assert_eq!(commands[4], "sudo /sbin/shutdown -r +0");
        assert_eq!(commands.len(), 5);
        assert_eq!(clock.sleeps(), vec![WAIT]);
    }

    #[test]
    fn test_centos_sequence() {
        let remote = MockRemote::new("CentOS");
        let clock = ManualClock::new();

        let report = PatchExecutor::new(&remote, &clock, 3, WAIT)
            .patch_and_reboot("10.0.0.2")
            .unwrap();

        assert_eq!(report.os_family, OsFamily::CentOs);
        assert_eq!(
            report.commands_run,
            vec!["sudo yum -y -q update", "sudo /usr/sbin/shutdown -r +3"]
        );
    }

    #[test]
    fn test_amazon_sequence() {
        let remote = MockRemote::new("AmazonAMI\n");
        let clock = ManualClock::new();

        let report = PatchExecutor::new(&remote, &clock, 0, WAIT)
            .patch_and_reboot("10.0.0.3")
            .unwrap();

        assert_eq!(report.os_family, OsFamily::AmazonAmi);
        assert_eq!(report.commands_run.last().unwrap(), "sudo /sbin/shutdown -r +0");
    }

    #[test]
    fn test_unrecognized_os_is_fatal_and_runs_nothing() {
        let remote = MockRemote::new("Gentoo");
        let clock = ManualClock::new();

        let err = PatchExecutor::new(&remote, &clock, 0, WAIT)
            .patch_and_reboot("10.0.0.4")
            .unwrap_err();

        assert!(matches!(err, Error::UnrecognizedOs { ref output, .. } if output == "Gentoo"));
        assert_eq!(remote.commands().len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_failing_command_stops_sequence() {
        let remote = MockRemote::new("Ubuntu").failing_on("dist-upgrade");
        let clock = ManualClock::new();

        let err = PatchExecutor::new(&remote, &clock, 0, WAIT)
            .patch_and_reboot("10.0.0.5")
            .unwrap_err();

        assert!(matches!(err, Error::RemoteCommand { .. }));
        // Reboot was never scheduled
        assert!(!remote.commands().iter().any(|(_, c)| c.contains("shutdown")));
        assert!(clock.sleeps().is_empty());
    }
}
