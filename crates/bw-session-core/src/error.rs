//! Error type for session operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::traits::PromptError;

/// Result alias used throughout bw-session-core.
pub type Result<T, E = BitwardenError> = std::result::Result<T, E>;

/// Errors returned by [`Session`](crate::Session).
///
/// Passwords never reach any variant: they travel on stdin only. Command
/// lines are rendered with the session key masked.
#[derive(Debug, Error)]
pub enum BitwardenError {
    /// A required setting (such as the username) is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The `bw` executable could not be located or spawned.
    #[error("Bitwarden CLI `{}` could not be found", .0.display())]
    ExecutableNotFound(PathBuf),

    /// The CLI asked for an API key, so a password login cannot proceed.
    #[error(
        "CLI must be authenticated with API key: \
         https://bitwarden.com/help/article/cli-auth-challenges/"
    )]
    AuthMode,

    /// The master password was rejected.
    #[error("password for \"{username}\" is incorrect, try again")]
    IncorrectPassword { username: String },

    /// An operation that needs a session key ran without one.
    #[error("cannot execute {operation} because the session is not logged in")]
    NotLoggedIn { operation: &'static str },

    /// The CLI exited unsuccessfully.
    #[error("command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    /// The CLI did not finish in time and was killed.
    #[error("command `{command}` timed out after {}s", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },

    /// Output that must be JSON was not.
    #[error("failed to decode output of `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// Output was valid but had the wrong shape.
    #[error("unexpected output from `{command}`: expected {expected}")]
    UnexpectedOutput {
        command: String,
        expected: &'static str,
    },

    /// The interactive password prompt failed.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// I/O failure talking to the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BitwardenError {
    /// Whether a retry with a different password might succeed.
    pub fn is_incorrect_password(&self) -> bool {
        matches!(self, BitwardenError::IncorrectPassword { .. })
    }
}
