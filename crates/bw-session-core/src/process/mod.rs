//! Invocations of the `bw` executable.
//!
//! This module provides the value types exchanged with a
//! [`CommandRunner`](crate::traits::CommandRunner) and two implementations:
//!
//! - [`TokioCommandRunner`]: spawns real child processes (production)
//! - [`MockCommandRunner`]: scripted replies for testing

mod mock;
mod tokio_runner;

pub use mock::{MockCommandRunner, RecordedCall};
pub use tokio_runner::TokioCommandRunner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use zeroize::Zeroizing;

/// Flag that carries the session key on the command line.
pub const SESSION_FLAG: &str = "--session";

/// Environment variable `bw` reads the session key from.
pub const SESSION_ENV: &str = "BW_SESSION";

/// One run of the external executable.
pub struct Invocation {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    pub env: Vec<(String, SecretString)>,
    /// Bytes written to the child's stdin, wiped on drop.
    pub stdin: Option<Zeroizing<Vec<u8>>>,
    /// Deadline for the whole run.
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            stdin: None,
            timeout,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: SecretString) -> Self {
        self.env.push((key.into(), value));
        self
    }

    pub fn with_stdin(mut self, input: Zeroizing<Vec<u8>>) -> Self {
        self.stdin = Some(input);
        self
    }

    /// The command line with the session key masked.
    pub fn display_command(&self) -> String {
        display_command(&self.program, &self.args)
    }
}

// Manual Debug implementation to avoid exposing stdin or env values
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("Invocation")
            .field("command", &self.display_command())
            .field("env", &env_keys)
            .field("stdin", &self.stdin.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// What a finished child process produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stderr decoded permissively.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Render a command line for logs and errors, masking the value that
/// follows `--session`.
pub fn display_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    let mut mask_next = false;
    for arg in args {
        rendered.push(' ');
        if mask_next {
            rendered.push_str("[REDACTED]");
            mask_next = false;
        } else {
            rendered.push_str(arg);
            mask_next = arg == SESSION_FLAG;
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn display_command_masks_session_key() {
        let rendered = display_command(
            Path::new("bw"),
            &args(&["get", "item", "xbox.com", "--session", "abc123"]),
        );
        assert_eq!(rendered, "bw get item xbox.com --session [REDACTED]");
    }

    #[test]
    fn display_command_without_session() {
        let rendered = display_command(Path::new("/usr/bin/bw"), &args(&["login", "me", "--raw"]));
        assert_eq!(rendered, "/usr/bin/bw login me --raw");
    }

    #[test]
    fn invocation_debug_redacts_secrets() {
        let invocation = Invocation::new("bw", args(&["logout", "--session", "key-1"]), Duration::from_secs(1))
            .with_env(SESSION_ENV, SecretString::from("key-1"))
            .with_stdin(Zeroizing::new(b"hunter2\n".to_vec()));
        let debug_output = format!("{:?}", invocation);
        assert!(debug_output.contains("BW_SESSION"));
        assert!(!debug_output.contains("key-1"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn command_output_success() {
        assert!(CommandOutput::new(0, "", "").success());
        assert!(!CommandOutput::new(1, "", "").success());
        assert!(!CommandOutput::default().success());
    }
}
