//! Mock command runner for testing.
//!
//! This module provides a scripted implementation of [`CommandRunner`]
//! that can be used in tests without a `bw` executable.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::ExposeSecret;

use super::{CommandOutput, Invocation};
use crate::traits::{CommandRunner, RunError};

/// One invocation seen by a [`MockCommandRunner`].
///
/// Secrets are recorded in the clear so tests can assert on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
}

impl RecordedCall {
    /// The first argument (`login`, `get`, `list`, ...).
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// The value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    Timeout,
    NotFound,
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<Scripted>,
    fallback: Option<CommandOutput>,
    calls: Vec<RecordedCall>,
}

/// A mock command runner for testing.
///
/// Replies are consumed in order; once the script is exhausted the fallback
/// reply (success with empty output unless changed) is returned. Clones
/// share state, so a test can keep a handle after giving the runner to a
/// session.
///
/// # Example
///
/// ```
/// use bw_session_core::process::MockCommandRunner;
///
/// let runner = MockCommandRunner::new()
///     .success("session_key")
///     .failure(1, "Some Other Unexpected Error.");
/// let handle = runner.clone();
/// assert_eq!(handle.call_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockCommandRunner {
    state: Arc<Mutex<MockState>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary reply.
    pub fn reply(self, output: CommandOutput) -> Self {
        self.lock().replies.push_back(Scripted::Output(output));
        self
    }

    /// Queue a successful run printing `stdout`.
    pub fn success(self, stdout: impl Into<Vec<u8>>) -> Self {
        self.reply(CommandOutput::new(0, stdout, Vec::new()))
    }

    /// Queue a failed run with the given exit code and stderr.
    pub fn failure(self, exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        self.reply(CommandOutput::new(exit_code, Vec::new(), stderr))
    }

    /// Queue a run that exceeds its timeout.
    pub fn timeout(self) -> Self {
        self.lock().replies.push_back(Scripted::Timeout);
        self
    }

    /// Queue a spawn failure for a missing executable.
    pub fn not_found(self) -> Self {
        self.lock().replies.push_back(Scripted::NotFound);
        self
    }

    /// Reply returned once the script is exhausted.
    pub fn fallback(self, output: CommandOutput) -> Self {
        self.lock().fallback = Some(output);
        self
    }

    /// Every invocation seen so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// The most recent invocation.
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.lock().calls.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(
        &self,
        invocation: Invocation,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput, RunError>> + Send + '_>> {
        let scripted = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                env: invocation
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.expose_secret().to_string()))
                    .collect(),
                stdin: invocation.stdin.as_ref().map(|input| input.to_vec()),
            });
            state.replies.pop_front().unwrap_or_else(|| {
                Scripted::Output(
                    state
                        .fallback
                        .clone()
                        .unwrap_or_else(|| CommandOutput::new(0, Vec::new(), Vec::new())),
                )
            })
        };

        let timeout = invocation.timeout;
        let program = invocation.program.clone();
        Box::pin(async move {
            match scripted {
                Scripted::Output(output) => Ok(output),
                Scripted::Timeout => Err(RunError::Timeout(timeout)),
                Scripted::NotFound => Err(RunError::NotFound(program)),
            }
        })
    }
}
