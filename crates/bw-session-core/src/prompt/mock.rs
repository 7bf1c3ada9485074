//! Scripted password prompt for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::SecretString;

use crate::traits::{PasswordPrompt, PromptError};
use crate::types::PromptConfig;

type Answer = Result<SecretString, PromptError>;

#[derive(Default)]
struct Script {
    answers: VecDeque<Answer>,
    seen: Vec<PromptConfig>,
}

/// A password prompt that replays queued answers.
///
/// Answers are handed out in order and the last one repeats once the
/// queue runs dry. Every `PromptConfig` shown is recorded. Clones share
/// state.
///
/// # Example
///
/// ```
/// use bw_session_core::prompt::MockPasswordPrompt;
///
/// // Wrong password first, then the right one
/// let prompt = MockPasswordPrompt::with_password("wrong").then_password("right");
/// assert_eq!(prompt.call_count(), 0);
///
/// let cancelling = MockPasswordPrompt::cancelled();
/// # let _ = cancelling;
/// ```
#[derive(Clone)]
pub struct MockPasswordPrompt {
    script: Arc<Mutex<Script>>,
}

impl MockPasswordPrompt {
    fn answering(answer: Answer) -> Self {
        let prompt = Self {
            script: Arc::default(),
        };
        prompt.lock().answers.push_back(answer);
        prompt
    }

    pub fn with_password(password: impl Into<String>) -> Self {
        Self::answering(Ok(SecretString::from(password.into())))
    }

    /// Every prompt is dismissed.
    pub fn cancelled() -> Self {
        Self::with_error(PromptError::Cancelled)
    }

    pub fn with_error(error: PromptError) -> Self {
        Self::answering(Err(error))
    }

    /// Queue another answer after the ones already scripted.
    pub fn then_password(self, password: impl Into<String>) -> Self {
        self.lock()
            .answers
            .push_back(Ok(SecretString::from(password.into())));
        self
    }

    pub fn call_count(&self) -> usize {
        self.lock().seen.len()
    }

    /// The prompt text shown on each call, oldest first.
    pub fn prompts_seen(&self) -> Vec<PromptConfig> {
        self.lock().seen.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockPasswordPrompt {
    fn default() -> Self {
        Self::with_password("abc123")
    }
}

impl PasswordPrompt for MockPasswordPrompt {
    fn prompt(
        &self,
        config: PromptConfig,
    ) -> Pin<Box<dyn Future<Output = Result<SecretString, PromptError>> + Send + '_>> {
        let answer = {
            let mut script = self.lock();
            script.seen.push(config);
            if script.answers.len() > 1 {
                script.answers.pop_front()
            } else {
                script.answers.front().cloned()
            }
        };

        Box::pin(async move { answer.unwrap_or(Err(PromptError::Cancelled)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn answers_with_password() {
        let mock = MockPasswordPrompt::with_password("test-pass");
        let secret = mock.prompt(PromptConfig::default()).await.unwrap();
        assert_eq!(secret.expose_secret(), "test-pass");
    }

    #[tokio::test]
    async fn answers_with_cancel() {
        let mock = MockPasswordPrompt::cancelled();
        let result = mock.prompt(PromptConfig::default()).await;
        assert!(matches!(result, Err(PromptError::Cancelled)));
    }

    #[tokio::test]
    async fn replays_queue_then_repeats_last() {
        let mock = MockPasswordPrompt::with_password("first").then_password("second");

        let mut answers = Vec::new();
        for _ in 0..3 {
            let secret = mock.prompt(PromptConfig::default()).await.unwrap();
            answers.push(secret.expose_secret().to_string());
        }
        assert_eq!(answers, vec!["first", "second", "second"]);
    }

    #[tokio::test]
    async fn records_prompts_across_clones() {
        let mock = MockPasswordPrompt::default();
        let handle = mock.clone();
        let config = PromptConfig {
            description: "Vault".to_string(),
            prompt_text: "$".to_string(),
        };

        mock.prompt(config.clone()).await.unwrap();

        assert_eq!(handle.call_count(), 1);
        assert_eq!(handle.prompts_seen(), vec![config]);
    }
}
