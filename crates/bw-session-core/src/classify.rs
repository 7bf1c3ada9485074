//! Classification of `bw` results.
//!
//! The CLI reports most failures only as human-readable stderr, so the
//! session inspects that text for a few well-known phrases. Checks run in
//! a fixed order: the first match wins.

use crate::error::BitwardenError;
use crate::process::CommandOutput;
use crate::types::SessionToken;

/// Printed when the account requires API-key authentication.
pub const API_KEY_MARKER: &str = "API key client_secret";

/// Printed when the master password is rejected.
pub const INCORRECT_PASSWORD_MARKER: &str = "Username or password is incorrect";

/// Printed by `bw logout` when there is nothing to log out of.
pub const NOT_LOGGED_IN_MARKER: &str = "not logged in";

/// Classify the result of `bw login <username> --raw`.
///
/// On success the session key is stdout with trailing line endings removed.
pub fn classify_login(
    output: &CommandOutput,
    username: &str,
    command: &str,
) -> Result<SessionToken, BitwardenError> {
    let stderr = output.stderr_text();

    if stderr.contains(API_KEY_MARKER) {
        return Err(BitwardenError::AuthMode);
    }
    if stderr.contains(INCORRECT_PASSWORD_MARKER) {
        return Err(BitwardenError::IncorrectPassword {
            username: username.to_string(),
        });
    }

    let key = String::from_utf8_lossy(&output.stdout);
    let key = key.trim_end_matches(['\r', '\n']);
    if key.is_empty() || !output.success() {
        return Err(BitwardenError::Command {
            command: command.to_string(),
            stderr,
        });
    }

    Ok(SessionToken::new(key))
}

/// Outcome of `bw logout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The CLI logged the session out.
    LoggedOut,
    /// The CLI had no session to end.
    AlreadyLoggedOut,
}

/// Classify the result of `bw logout`.
///
/// "not logged in" counts as success so logging out twice is harmless.
pub fn classify_logout(
    output: &CommandOutput,
    command: &str,
) -> Result<LogoutOutcome, BitwardenError> {
    let stderr = output.stderr_text();

    if stderr.contains(NOT_LOGGED_IN_MARKER) {
        return Ok(LogoutOutcome::AlreadyLoggedOut);
    }
    if !output.success() {
        return Err(BitwardenError::Command {
            command: command.to_string(),
            stderr,
        });
    }
    Ok(LogoutOutcome::LoggedOut)
}

/// Check the exit status of any other command and hand back stdout.
pub fn require_success(output: CommandOutput, command: &str) -> Result<Vec<u8>, BitwardenError> {
    if !output.success() {
        return Err(BitwardenError::Command {
            command: command.to_string(),
            stderr: output.stderr_text(),
        });
    }
    Ok(output.stdout)
}
