//! Child-process runner built on `tokio::process`.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CommandOutput, Invocation};
use crate::traits::{CommandRunner, RunError};

/// Runs invocations as real child processes.
///
/// Stdin is written in full and then closed, stdout and stderr are read
/// while waiting for exit, and the whole exchange is bounded by the
/// invocation's timeout. On expiry the child is killed and reaped before
/// `RunError::Timeout` is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for TokioCommandRunner {
    fn run(
        &self,
        invocation: Invocation,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput, RunError>> + Send + '_>> {
        Box::pin(run_invocation(invocation))
    }
}

async fn run_invocation(invocation: Invocation) -> Result<CommandOutput, RunError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &invocation.env {
        command.env(key, value.expose_secret());
    }

    let mut child = command.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RunError::NotFound(invocation.program.clone()),
        _ => RunError::Spawn(e),
    })?;
    debug!(pid = ?child.id(), command = %invocation.display_command(), "Spawned child");

    let stdin = child.stdin.take();
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

    let input = invocation.stdin.as_deref();
    let feed = async move {
        let (Some(mut pipe), Some(input)) = (stdin, input) else {
            return Ok(());
        };
        // The child may exit before reading its input.
        match pipe.write_all(input).await {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(e),
            Ok(()) => pipe.shutdown().await,
        }
    };

    let exchange = async {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (_, status, _, _) = tokio::try_join!(
            feed,
            child.wait(),
            stdout.read_to_end(&mut out),
            stderr.read_to_end(&mut err),
        )?;
        Ok::<_, io::Error>((status, out, err))
    };

    let outcome = tokio::time::timeout(invocation.timeout, exchange).await;

    match outcome {
        Ok(Ok((status, stdout, stderr))) => Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        }),
        Ok(Err(e)) => Err(RunError::Io(e)),
        Err(_) => {
            warn!(
                command = %invocation.display_command(),
                timeout = ?invocation.timeout,
                "Child timed out, killing"
            );
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill timed out child");
            }
            if let Err(e) = child.wait().await {
                warn!(error = %e, "Failed to reap killed child");
            }
            Err(RunError::Timeout(invocation.timeout))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use zeroize::Zeroizing;

    fn sh(script: &str, timeout: Duration) -> Invocation {
        Invocation::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let output = TokioCommandRunner::new()
            .run(sh("printf hello; printf oops >&2; exit 3", Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, b"hello");
        assert_eq!(output.stderr_text(), "oops");
    }

    #[tokio::test]
    async fn writes_stdin_and_closes_it() {
        let invocation = sh("cat", Duration::from_secs(5))
            .with_stdin(Zeroizing::new(b"hunter2\n".to_vec()));
        let output = TokioCommandRunner::new().run(invocation).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, b"hunter2\n");
    }

    #[tokio::test]
    async fn passes_environment() {
        let invocation = sh("printf %s \"$BW_SESSION\"", Duration::from_secs(5))
            .with_env("BW_SESSION", secrecy::SecretString::from("key-42"));
        let output = TokioCommandRunner::new().run(invocation).await.unwrap();
        assert_eq!(output.stdout, b"key-42");
    }

    #[tokio::test]
    async fn kills_child_on_timeout() {
        let start = Instant::now();
        let result = TokioCommandRunner::new()
            .run(sh("sleep 10", Duration::from_millis(100)))
            .await;
        assert!(matches!(result, Err(RunError::Timeout(d)) if d == Duration::from_millis(100)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let invocation = Invocation::new(
            "/nonexistent/definitely-not-bw",
            Vec::new(),
            Duration::from_secs(1),
        );
        let result = TokioCommandRunner::new().run(invocation).await;
        assert!(matches!(result, Err(RunError::NotFound(_))));
    }
}
