use super::ShutdownFacility;
use crate::command;
use crate::config::ShutdownConfig;
use crate::error::{AutoshutdownError, Result};
use async_trait::async_trait;
use tracing::{debug, info};

const MINUTES_PLACEHOLDER: &str = "{minutes}";

/// Arms and cancels the shutdown through the host's shutdown command.
pub struct CommandShutdownFacility {
    config: ShutdownConfig,
}

impl CommandShutdownFacility {
    pub fn new(config: ShutdownConfig) -> Self {
        Self { config }
    }

    fn arm_args(&self, countdown_minutes: u32) -> Vec<String> {
        let minutes = countdown_minutes.to_string();
        self.config
            .arm_args
            .iter()
            .map(|arg| arg.replace(MINUTES_PLACEHOLDER, &minutes))
            .collect()
    }
}

#[async_trait]
impl ShutdownFacility for CommandShutdownFacility {
    async fn arm(&self, countdown_minutes: u32) -> Result<()> {
        let args = self.arm_args(countdown_minutes);
        let output = command::run(&self.config.arm_program, &args)
            .await
            .map_err(|e| AutoshutdownError::shutdown_action("arm", e))?;
        debug!("Arm command output: {}", output.stdout.trim());
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        let output = command::run(&self.config.cancel_program, &self.config.cancel_args)
            .await
            .map_err(|e| AutoshutdownError::shutdown_action("cancel", e))?;
        debug!("Cancel command output: {}", output.stdout.trim());
        Ok(())
    }
}

/// Logs the commands it would run and always succeeds. Used by `--dry-run`.
pub struct DryRunShutdownFacility {
    inner: CommandShutdownFacility,
}

impl DryRunShutdownFacility {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            inner: CommandShutdownFacility::new(config),
        }
    }
}

#[async_trait]
impl ShutdownFacility for DryRunShutdownFacility {
    async fn arm(&self, countdown_minutes: u32) -> Result<()> {
        info!(
            "[dry run] Would run `{}`",
            command::display_command(
                &self.inner.config.arm_program,
                &self.inner.arm_args(countdown_minutes)
            )
        );
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        info!(
            "[dry run] Would run `{}`",
            command::display_command(
                &self.inner.config.cancel_program,
                &self.inner.config.cancel_args
            )
        );
        Ok(())
    }
}
