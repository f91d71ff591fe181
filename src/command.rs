//! Execution of the external commands the daemon depends on: session listings
//! for the command-based probes and the arm/cancel shutdown actions.

use crate::error::{AutoshutdownError, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a command that exited successfully.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
}

impl CommandOutput {
    /// Non-blank stdout lines after dropping `header_lines` leading lines.
    pub fn entries(&self, header_lines: usize) -> Vec<&str> {
        self.stdout
            .lines()
            .skip(header_lines)
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

/// Human readable form of a command line, used in logs and errors.
pub fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run `program` with `args` and return its stdout.
///
/// A spawn failure or a non-zero exit status is an `ExternalCommand` error.
/// The child is killed if the returned future is dropped, so callers can bound
/// it with `tokio::time::timeout`.
pub async fn run(program: &str, args: &[String]) -> Result<CommandOutput> {
    let command_line = display_command(program, args);
    debug!("Running `{}`", command_line);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AutoshutdownError::command(&command_line, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("exited with {}", output.status),
            detail => format!("exited with {}: {}", output.status, detail),
        };
        return Err(AutoshutdownError::command(&command_line, message));
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_entries_skip_header_and_blank_lines() {
        let output = CommandOutput {
            stdout: "\nService  pid  Machine\n-----------------\nmedia  1234  10.0.0.2\n\n"
                .to_string(),
        };

        assert_eq!(output.entries(3), vec!["media  1234  10.0.0.2"]);
        assert_eq!(output.entries(0).len(), 3);
    }

    #[test]
    fn test_display_command() {
        assert_eq!(display_command("who", &[]), "who");
        assert_eq!(
            display_command("smbstatus", &["--shares".to_string()]),
            "smbstatus --shares"
        );
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = run("sh", &sh("printf 'alice pts/0\\nbob pts/1\\n'"))
            .await
            .unwrap();

        assert_eq!(output.entries(0), vec!["alice pts/0", "bob pts/1"]);
    }

    #[tokio::test]
    async fn test_run_non_zero_exit_is_error() {
        let err = run("sh", &sh("echo broken >&2; exit 3")).await.unwrap_err();

        match err {
            AutoshutdownError::ExternalCommand { message, .. } => {
                assert!(message.contains("broken"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_run_missing_program_is_error() {
        let result = run("/nonexistent/autoshutdown-test-binary", &[]).await;
        assert!(matches!(
            result,
            Err(AutoshutdownError::ExternalCommand { .. })
        ));
    }
}
