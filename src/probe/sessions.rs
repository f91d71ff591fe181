//! Probes that count sessions in the output of an external command.

use super::{ActivityProbe, ProbeResult};
use crate::command;
use crate::config::CommandProbeConfig;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Run the configured command and count the session lines it prints.
async fn count_sessions(config: &CommandProbeConfig) -> Result<usize> {
    let output = command::run(&config.program, &config.args).await?;
    Ok(output.entries(config.header_lines).len())
}

/// Interactive logins as reported by `who`.
pub struct LoginSessionProbe {
    config: CommandProbeConfig,
}

impl LoginSessionProbe {
    pub fn new(config: CommandProbeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ActivityProbe for LoginSessionProbe {
    fn name(&self) -> &str {
        "login_sessions"
    }

    async fn check(&self) -> ProbeResult {
        debug!(
            "Checking logged in users via `{}`",
            command::display_command(&self.config.program, &self.config.args)
        );

        count_sessions(&self.config)
            .await
            .map(|users| match users {
                0 => ProbeResult::Inactive,
                n => ProbeResult::active(format!("{} user(s) logged in", n)),
            })
            .into()
    }
}

/// Open file-sharing connections as reported by `smbstatus --shares`.
///
/// The status table is preceded by a blank line, a column header and a
/// separator, hence the default of three header lines.
pub struct FileSharingProbe {
    config: CommandProbeConfig,
}

impl FileSharingProbe {
    pub fn new(config: CommandProbeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ActivityProbe for FileSharingProbe {
    fn name(&self) -> &str {
        "file_sharing"
    }

    async fn check(&self) -> ProbeResult {
        debug!(
            "Checking file sharing connections via `{}`",
            command::display_command(&self.config.program, &self.config.args)
        );

        count_sessions(&self.config)
            .await
            .map(|connections| match connections {
                0 => ProbeResult::Inactive,
                n => ProbeResult::active(format!("{} active connection(s)", n)),
            })
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_probe(script: &str, header_lines: usize) -> CommandProbeConfig {
        CommandProbeConfig {
            enabled: true,
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            header_lines,
        }
    }

    const SMBSTATUS_IDLE: &str = "printf '\\nService      pid     Machine       Connected at\\n---------------------------------------------\\n\\n'";
    const SMBSTATUS_BUSY: &str = "printf '\\nService      pid     Machine       Connected at\\n---------------------------------------------\\nmedia        4242    10.0.0.12     Sun Oct 18 10:00:00 2026\\nbackup       4243    10.0.0.13     Sun Oct 18 10:05:00 2026\\n\\n'";

    #[tokio::test]
    async fn test_login_sessions_active() {
        let probe = LoginSessionProbe::new(shell_probe(
            "printf 'alice    pts/0  2026-10-18 09:00\\n'",
            0,
        ));

        assert_eq!(
            probe.check().await,
            ProbeResult::active("1 user(s) logged in")
        );
    }

    #[tokio::test]
    async fn test_login_sessions_inactive_on_empty_output() {
        let probe = LoginSessionProbe::new(shell_probe("true", 0));
        assert_eq!(probe.check().await, ProbeResult::Inactive);
    }

    #[tokio::test]
    async fn test_login_sessions_command_failure_is_unknown() {
        let probe = LoginSessionProbe::new(shell_probe("echo alice; exit 1", 0));

        let result = probe.check().await;

        assert!(result.is_unknown());
        assert!(!result.is_active());
    }

    #[tokio::test]
    async fn test_file_sharing_skips_table_header() {
        let probe = FileSharingProbe::new(shell_probe(SMBSTATUS_IDLE, 3));
        assert_eq!(probe.check().await, ProbeResult::Inactive);

        let probe = FileSharingProbe::new(shell_probe(SMBSTATUS_BUSY, 3));
        assert_eq!(
            probe.check().await,
            ProbeResult::active("2 active connection(s)")
        );
    }

    #[tokio::test]
    async fn test_file_sharing_missing_binary_is_unknown() {
        let probe = FileSharingProbe::new(CommandProbeConfig {
            enabled: true,
            program: "/nonexistent/smbstatus".to_string(),
            args: vec!["--shares".to_string()],
            header_lines: 3,
        });

        assert!(probe.check().await.is_unknown());
    }
}
