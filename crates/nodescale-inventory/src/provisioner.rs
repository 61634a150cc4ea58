//! Provisioner backends.
//!
//! Both calls return immediately. `CommandProvisioner` runs its command on
//! a background task and only logs the result; whether a node actually
//! joined is observed through the inventory.

use std::sync::Arc;

use tokio::process::Command;
use tracing::{error, info, warn};

use nodescale_core::{ProvisionerConfig, Provisioner, ProvisionerKind};

use crate::error::{InventoryError, InventoryResult};

/// Build the provisioner selected in the configuration.
pub fn build_provisioner(config: &ProvisionerConfig) -> InventoryResult<Arc<dyn Provisioner>> {
    match config.kind {
        ProvisionerKind::DryRun => Ok(Arc::new(DryRunProvisioner)),
        ProvisionerKind::Command => {
            let up = config.scale_up_command.clone().ok_or_else(|| {
                InventoryError::Provisioner("scale_up_command is not set".to_string())
            })?;
            let down = config.scale_down_command.clone().ok_or_else(|| {
                InventoryError::Provisioner("scale_down_command is not set".to_string())
            })?;
            Ok(Arc::new(CommandProvisioner::new(up, down)))
        }
    }
}

/// Logs scaling requests without acting on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProvisioner;

impl Provisioner for DryRunProvisioner {
    fn kind(&self) -> ProvisionerKind {
        ProvisionerKind::DryRun
    }

    fn scale_up(&self) {
        info!("dry run: would add one node");
    }

    fn scale_down(&self) {
        info!("dry run: would remove one node");
    }
}

/// Runs an operator-supplied shell command per scaling request.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    scale_up_command: String,
    scale_down_command: String,
}

impl CommandProvisioner {
    pub fn new(scale_up_command: impl Into<String>, scale_down_command: impl Into<String>) -> Self {
        Self {
            scale_up_command: scale_up_command.into(),
            scale_down_command: scale_down_command.into(),
        }
    }

    fn spawn(&self, action: &'static str, command: &str) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(action, error = %e, "no runtime to run provisioner command on");
                return;
            }
        };

        let command = command.to_string();
        handle.spawn(async move {
            if let Err(e) = run_command(action, &command).await {
                warn!(action, command = %command, error = %e, "provisioner command failed");
            }
        });
    }
}

impl Provisioner for CommandProvisioner {
    fn kind(&self) -> ProvisionerKind {
        ProvisionerKind::Command
    }

    fn scale_up(&self) {
        self.spawn("scale_up", &self.scale_up_command);
    }

    fn scale_down(&self) {
        self.spawn("scale_down", &self.scale_down_command);
    }
}

/// Warns when a running command is dropped before it finished, which
/// happens when the runtime shuts down mid-provisioning.
struct InFlight<'a> {
    action: &'static str,
    command: &'a str,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                action = self.action,
                command = %self.command,
                "provisioner command abandoned at shutdown, child killed"
            );
        }
    }
}

/// Run `sh -c <command>` to completion and log its exit status.
///
/// The child is killed if this future is dropped first.
async fn run_command(action: &'static str, command: &str) -> std::io::Result<()> {
    info!(action, command, "running provisioner command");

    let mut in_flight = InFlight {
        action,
        command,
        finished: false,
    };
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output()
        .await;
    in_flight.finished = true;
    let output = output?;

    if output.status.success() {
        info!(action, "provisioner command finished");
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            action,
            code = output.status.code().unwrap_or(-1),
            stderr = %stderr.trim(),
            "provisioner command exited with failure"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn build_selects_backend() {
        let dry = build_provisioner(&ProvisionerConfig::default()).unwrap();
        assert_eq!(dry.kind(), ProvisionerKind::DryRun);

        let config = ProvisionerConfig {
            kind: ProvisionerKind::Command,
            scale_up_command: Some("true".to_string()),
            scale_down_command: Some("true".to_string()),
        };
        assert_eq!(build_provisioner(&config).unwrap().kind(), ProvisionerKind::Command);
    }

    #[test]
    fn command_backend_requires_both_commands() {
        let config = ProvisionerConfig {
            kind: ProvisionerKind::Command,
            scale_up_command: Some("true".to_string()),
            scale_down_command: None,
        };
        let err = build_provisioner(&config).err().unwrap();
        assert!(err.to_string().contains("scale_down_command"));
    }

    #[test]
    fn spawn_outside_runtime_does_not_panic() {
        CommandProvisioner::new("true", "true").scale_up();
    }

    #[tokio::test]
    async fn scale_up_runs_command_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("up");
        let provisioner =
            CommandProvisioner::new(format!("touch {}", marker.display()), "false");

        provisioner.scale_up();

        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
    }

    #[test]
    fn runtime_shutdown_kills_running_command() {
        let dir = tempfile::tempdir().unwrap();
        let started = dir.path().join("started");
        let done = dir.path().join("done");
        let provisioner = CommandProvisioner::new(
            format!(
                "touch {} && sleep 1 && touch {}",
                started.display(),
                done.display()
            ),
            "true",
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        {
            let _guard = runtime.enter();
            provisioner.scale_up();
        }

        for _ in 0..200 {
            if started.exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(started.exists());

        drop(runtime);
        std::thread::sleep(Duration::from_millis(1500));
        assert!(!done.exists());
    }

    #[tokio::test]
    async fn failing_command_is_reported_not_propagated() {
        assert!(run_command("scale_down", "exit 3").await.is_ok());
    }
}
