//! Seams between the session and the outside world.
//!
//! [`PasswordPrompt`] asks a human for the master password and
//! [`CommandRunner`] executes `bw`. Tests substitute mocks for both, so
//! session logic runs without a terminal or a child process.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use secrecy::SecretString;

use crate::process::{CommandOutput, Invocation};
use crate::types::PromptConfig;

/// Why no password was obtained.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PromptError {
    /// User cancelled the prompt (or entered nothing).
    #[error("prompt cancelled by user")]
    Cancelled,

    /// Reading from the terminal failed.
    #[error("prompt failed: {0}")]
    Io(String),
}

/// Error type for command runner operations.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The program does not exist.
    #[error("executable not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The program exists but could not be started.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing stdin or reading output failed.
    #[error("process I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The process was killed after exceeding its timeout.
    #[error("process timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of the master password.
///
/// The returned secret is the raw value typed by the user, without a
/// line terminator.
///
/// # Example
///
/// ```ignore
/// struct FixedPrompt(SecretString);
///
/// impl PasswordPrompt for FixedPrompt {
///     fn prompt(&self, _config: PromptConfig) -> Pin<Box<...>> {
///         let secret = self.0.clone();
///         Box::pin(async move { Ok(secret) })
///     }
/// }
/// ```
pub trait PasswordPrompt: Send + Sync {
    /// Ask the user for the master password.
    ///
    /// # Errors
    ///
    /// Returns `PromptError::Cancelled` if the user cancels.
    fn prompt(
        &self,
        config: PromptConfig,
    ) -> Pin<Box<dyn Future<Output = Result<SecretString, PromptError>> + Send + '_>>;
}

/// Trait for running the external executable.
///
/// Implementations must honor `Invocation::timeout`: when it expires the
/// child is killed and `RunError::Timeout` is returned.
pub trait CommandRunner: Send + Sync {
    /// Run one invocation to completion.
    fn run(
        &self,
        invocation: Invocation,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput, RunError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_error_display() {
        assert_eq!(
            PromptError::Cancelled.to_string(),
            "prompt cancelled by user"
        );
        assert_eq!(
            PromptError::Io("no tty".to_string()).to_string(),
            "prompt failed: no tty"
        );
    }

    #[test]
    fn run_error_display() {
        assert_eq!(
            RunError::NotFound(PathBuf::from("/usr/bin/bw")).to_string(),
            "executable not found: /usr/bin/bw"
        );
        assert_eq!(
            RunError::Timeout(Duration::from_millis(1500)).to_string(),
            "process timed out after 1.5s"
        );
    }
}
