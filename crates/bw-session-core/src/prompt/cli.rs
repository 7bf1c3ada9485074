//! Terminal password prompt.

use std::future::Future;
use std::pin::Pin;

use secrecy::SecretString;
use tracing::debug;

use crate::traits::{PasswordPrompt, PromptError};
use crate::types::PromptConfig;

/// Masked terminal prompt for the master password.
///
/// The text goes to the controlling terminal through `rpassword`, so stdout
/// stays free for command output. An empty answer counts as a cancel.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliPasswordPrompt;

impl CliPasswordPrompt {
    pub fn new() -> Self {
        Self
    }
}

/// The line shown before input: description above, prompt marker inline.
fn render_prompt(config: &PromptConfig) -> String {
    if config.description.is_empty() {
        format!("{} ", config.prompt_text)
    } else {
        format!("{}\n{} ", config.description, config.prompt_text)
    }
}

impl PasswordPrompt for CliPasswordPrompt {
    fn prompt(
        &self,
        config: PromptConfig,
    ) -> Pin<Box<dyn Future<Output = Result<SecretString, PromptError>> + Send + '_>> {
        let text = render_prompt(&config);
        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || rpassword::prompt_password(text))
                .await
                .map_err(|e| PromptError::Io(format!("prompt task failed: {e}")))?
                .map_err(|e| PromptError::Io(format!("failed to read password: {e}")))?;

            if answer.is_empty() {
                return Err(PromptError::Cancelled);
            }
            debug!("Master password read from terminal");
            Ok(SecretString::from(answer))
        })
    }
}
