use std::io::ErrorKind;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use super::HostKind;
use crate::error::QueryError;

/// Run a host automation command with a hard timeout.
///
/// The child is killed when the future is dropped, so a timed out call never
/// leaves a stray `tmux`/`osascript` process behind.
pub(super) async fn run_with_timeout(
    host: HostKind,
    program: &str,
    args: &[String],
    timeout: Duration,
    operation: &'static str,
) -> Result<Output, QueryError> {
    tracing::debug!("{} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Err(QueryError::HostNotRunning {
            host,
            detail: format!("{} not found in PATH", program),
        }),
        Ok(Err(e)) => Err(QueryError::AutomationFailure {
            host,
            detail: format!("failed to execute {} {}: {}", program, operation, e),
        }),
        Err(_) => {
            tracing::warn!("{} {} timed out after {:?}", program, operation, timeout);
            Err(QueryError::Timeout {
                host,
                operation,
                limit: timeout,
            })
        }
    }
}

/// Trimmed stderr of a finished command
pub(super) fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_means_host_not_running() {
        let err = run_with_timeout(
            HostKind::Tmux,
            "sessionquery-no-such-binary",
            &[],
            Duration::from_secs(1),
            "list-panes",
        )
        .await
        .expect_err("binary does not exist");

        assert!(matches!(err, QueryError::HostNotRunning { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        let err = run_with_timeout(
            HostKind::Tmux,
            "sleep",
            &["5".to_string()],
            Duration::from_millis(100),
            "list-panes",
        )
        .await
        .expect_err("sleep outlives the timeout");

        assert!(matches!(
            err,
            QueryError::Timeout {
                operation: "list-panes",
                limit,
                ..
            } if limit == Duration::from_millis(100)
        ));
        assert!(err.to_string().ends_with("within 100ms"));
    }
}
