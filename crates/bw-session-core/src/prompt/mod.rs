//! Password prompt implementations.
//!
//! This module provides implementations of the [`PasswordPrompt`] trait:
//!
//! - [`CliPasswordPrompt`]: masked terminal input (production)
//! - [`MockPasswordPrompt`]: Configurable mock for testing
//!
//! [`PasswordPrompt`]: crate::traits::PasswordPrompt

mod cli;
mod mock;

pub use cli::CliPasswordPrompt;
pub use mock::MockPasswordPrompt;
