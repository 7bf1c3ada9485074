//! Core library for bw-session.
//!
//! This crate wraps the Bitwarden command-line client (`bw`) behind a
//! session object. A [`Session`] logs in with a master password, keeps the
//! resulting session key, runs retrieval commands with that key, and logs
//! out again. The master password only ever travels on the child's stdin.
//!
//! External effects sit behind traits so tests need neither a terminal nor
//! a `bw` binary.
//!
//! # Modules
//!
//! - [`session`]: The session lifecycle (`login`, `logout`, `scoped`) and retrieval calls
//! - [`types`]: Object kinds, `SessionToken`, `Reply`, `ListOptions`
//! - [`traits`]: Pluggable component traits (`PasswordPrompt`, `CommandRunner`)
//! - [`process`]: Child-process runner and its scripted mock
//! - [`prompt`]: Terminal password prompt and its mock
//! - [`classify`]: Mapping of `bw` output to errors
//! - [`config`]: `~/.config/bw-session/config.toml`
//!
//! # Example
//!
//! ```
//! use bw_session_core::process::MockCommandRunner;
//! use bw_session_core::prompt::MockPasswordPrompt;
//! use bw_session_core::{ObjectKind, Session};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> bw_session_core::Result<()> {
//! let runner = MockCommandRunner::new().success("session_key").success("aijee9Ee");
//! let mut session = Session::builder()
//!     .username("user@example.com")
//!     .executable("bw")
//!     .runner(runner)
//!     .prompt(MockPasswordPrompt::with_password("master"))
//!     .build()?;
//!
//! let password = session
//!     .scoped(|s| Box::pin(async move { s.get(ObjectKind::Password, "xbox.com").await }))
//!     .await?;
//! assert_eq!(password.as_text(), Some("aijee9Ee"));
//! assert!(!session.is_logged_in());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod process;
pub mod prompt;
pub mod session;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root for convenience
pub use config::{Config, ConfigError};
pub use error::{BitwardenError, Result};
pub use session::{ScopeFuture, Session, SessionBuilder};
pub use traits::{CommandRunner, PasswordPrompt, PromptError, RunError};
pub use types::{
    FlagValue, ListKind, ListOptions, ObjectKind, PromptConfig, Reply, SessionToken, TemplateKind,
    UnknownKind,
};
