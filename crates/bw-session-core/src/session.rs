//! Bitwarden CLI session.
//!
//! A [`Session`] owns at most one session key. `login` obtains it,
//! `logout` releases it, and every retrieval call passes it to `bw` both as
//! `--session <key>` and through the `BW_SESSION` environment variable.
//!
//! # Example
//!
//! ```no_run
//! use bw_session_core::{ListKind, ListOptions, Session};
//!
//! # async fn run() -> bw_session_core::Result<()> {
//! let mut session = Session::new("user@example.com")?;
//!
//! let items = session
//!     .scoped(|s| {
//!         Box::pin(async move { s.list(ListKind::Items, &ListOptions::new().search("amazon")).await })
//!     })
//!     .await?;
//! println!("{} matching items", items.len());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::classify::{self, LogoutOutcome};
use crate::config::{Config, DEFAULT_TIMEOUT_SECS};
use crate::error::{BitwardenError, Result};
use crate::process::{
    display_command, CommandOutput, Invocation, TokioCommandRunner, SESSION_ENV, SESSION_FLAG,
};
use crate::prompt::CliPasswordPrompt;
use crate::traits::{CommandRunner, PasswordPrompt, RunError};
use crate::types::{ListKind, ListOptions, ObjectKind, PromptConfig, Reply, SessionToken, TemplateKind};

/// Name of the executable looked up on `PATH` when none is configured.
pub const DEFAULT_EXECUTABLE: &str = "bw";

/// Future returned by the body of [`Session::scoped`].
pub type ScopeFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 's>>;

/// Builder for [`Session`].
///
/// The runner and prompt default to real child processes and a terminal
/// prompt; tests swap in mocks.
pub struct SessionBuilder<R = TokioCommandRunner, P = CliPasswordPrompt> {
    username: Option<String>,
    password: Option<SecretString>,
    executable: Option<PathBuf>,
    timeout: Duration,
    prompt_config: PromptConfig,
    runner: R,
    prompt: P,
}

impl SessionBuilder {
    /// Builder with defaults: `bw` from `PATH`, a 40 second timeout and a
    /// terminal prompt.
    pub fn new() -> Self {
        Self {
            username: None,
            password: None,
            executable: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            prompt_config: PromptConfig::default(),
            runner: TokioCommandRunner::new(),
            prompt: CliPasswordPrompt::new(),
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner, P: PasswordPrompt> SessionBuilder<R, P> {
    /// Apply a loaded configuration file. Values set afterwards win.
    pub fn config(mut self, config: &Config) -> Self {
        if let Some(username) = &config.session.username {
            self.username = Some(username.clone());
        }
        if let Some(executable) = &config.session.executable {
            self.executable = Some(executable.clone());
        }
        self.timeout = config.timeout();
        self.prompt_config = config.prompt_config();
        self
    }

    /// Account email used when `login` is not given one.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Master password used when `login` is not given one. Without it the
    /// prompt is asked.
    pub fn password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Use this executable as-is instead of searching `PATH`.
    pub fn executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Time allowed for each `bw` invocation. Must be non-zero.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Text shown by the password prompt.
    pub fn prompt_config(mut self, prompt_config: PromptConfig) -> Self {
        self.prompt_config = prompt_config;
        self
    }

    /// Replace the command runner.
    pub fn runner<R2: CommandRunner>(self, runner: R2) -> SessionBuilder<R2, P> {
        SessionBuilder {
            username: self.username,
            password: self.password,
            executable: self.executable,
            timeout: self.timeout,
            prompt_config: self.prompt_config,
            runner,
            prompt: self.prompt,
        }
    }

    /// Replace the password prompt.
    pub fn prompt<P2: PasswordPrompt>(self, prompt: P2) -> SessionBuilder<R, P2> {
        SessionBuilder {
            username: self.username,
            password: self.password,
            executable: self.executable,
            timeout: self.timeout,
            prompt_config: self.prompt_config,
            runner: self.runner,
            prompt,
        }
    }

    /// Build the session.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the timeout is zero
    /// - `ExecutableNotFound` if no executable was set and `bw` is not on
    ///   `PATH`
    pub fn build(self) -> Result<Session<R, P>> {
        if self.timeout.is_zero() {
            return Err(BitwardenError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let executable = match self.executable {
            Some(path) => path,
            None => which::which(DEFAULT_EXECUTABLE)
                .map_err(|_| BitwardenError::ExecutableNotFound(PathBuf::from(DEFAULT_EXECUTABLE)))?,
        };
        debug!(executable = %executable.display(), "Using Bitwarden CLI");

        Ok(Session {
            username: self.username,
            password: self.password,
            executable,
            timeout: self.timeout,
            prompt_config: self.prompt_config,
            token: None,
            runner: self.runner,
            prompt: self.prompt,
        })
    }
}

/// A single Bitwarden CLI session.
///
/// A `Session` is meant to be driven by one task at a time; separate
/// sessions are independent.
pub struct Session<R = TokioCommandRunner, P = CliPasswordPrompt> {
    username: Option<String>,
    password: Option<SecretString>,
    executable: PathBuf,
    timeout: Duration,
    prompt_config: PromptConfig,
    token: Option<SessionToken>,
    runner: R,
    prompt: P,
}

impl Session {
    /// Session for `username` using `bw` from `PATH`.
    pub fn new(username: impl Into<String>) -> Result<Self> {
        SessionBuilder::new().username(username).build()
    }

    /// Start configuring a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}

impl<R: CommandRunner, P: PasswordPrompt> Session<R, P> {
    /// The configured account email.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Path of the `bw` executable in use.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Time allowed for each `bw` invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The current session key, if logged in.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Whether a session key is held.
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Log in and remember the session key.
    ///
    /// `username` falls back to the configured one. The password is taken
    /// from `password`, then the configured password, then the prompt.
    /// Any failure, including a cancelled prompt, drops a previously held
    /// session key.
    ///
    /// # Errors
    ///
    /// - `Configuration` if no username is available (nothing is spawned)
    /// - `Prompt` if the password prompt is cancelled or fails
    /// - `AuthMode` if the CLI demands an API key
    /// - `IncorrectPassword` if the password is rejected
    /// - `Command` for any other failure
    pub async fn login(
        &mut self,
        username: Option<&str>,
        password: Option<SecretString>,
    ) -> Result<SessionToken> {
        match self.acquire(username, password).await {
            Ok(token) => {
                self.token = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                if self.token.take().is_some() {
                    debug!("Dropped previous session key after failed login");
                }
                Err(e)
            }
        }
    }

    /// Resolve credentials and run `bw login`, without touching the stored key.
    async fn acquire(
        &self,
        username: Option<&str>,
        password: Option<SecretString>,
    ) -> Result<SessionToken> {
        let username = username
            .or(self.username.as_deref())
            .ok_or_else(|| {
                BitwardenError::Configuration("no username defined for login operation".to_string())
            })?
            .to_string();

        let password = match password.or_else(|| self.password.clone()) {
            Some(secret) => secret,
            None => self.prompt.prompt(self.prompt_config.clone()).await?,
        };
        let stdin = line_terminated(&password);
        drop(password);

        let args = vec!["login".to_string(), username.clone(), "--raw".to_string()];
        let invocation = Invocation::new(&self.executable, args, self.timeout).with_stdin(stdin);
        let command = invocation.display_command();

        info!(username = %username, "Logging in to Bitwarden");
        let token = self.run(invocation, &command).await.and_then(|mut output| {
            let token = classify::classify_login(&output, &username, &command);
            output.stdout.zeroize();
            token
        })?;
        info!(username = %username, "Logged in");
        Ok(token)
    }

    /// End the session and forget the session key.
    ///
    /// A CLI that reports it is not logged in is treated as success.
    pub async fn logout(&mut self) -> Result<()> {
        let token = self.require_token("logout")?.clone();

        let args = vec![
            "logout".to_string(),
            SESSION_FLAG.to_string(),
            token.expose().to_string(),
        ];
        let invocation = Invocation::new(&self.executable, args, self.timeout);
        let command = invocation.display_command();

        let output = self.run(invocation, &command).await?;
        match classify::classify_logout(&output, &command)? {
            LogoutOutcome::LoggedOut => info!("Logged out"),
            LogoutOutcome::AlreadyLoggedOut => {
                warn!("CLI reported no active session, clearing session key")
            }
        }
        self.token = None;
        Ok(())
    }

    /// Log in, run `body`, and log out again whether `body` fails or panics.
    ///
    /// If login fails, `body` is not run. An error from `body` takes
    /// precedence over an error from the final logout. A panic in `body` is
    /// resumed once the logout has been attempted.
    pub async fn scoped<T, F>(&mut self, body: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s Self) -> ScopeFuture<'s, T>,
    {
        self.login(None, None).await?;

        let this = &*self;
        let outcome = AssertUnwindSafe(async move { body(this).await })
            .catch_unwind()
            .await;
        let released = self.logout().await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => {
                if let Err(e) = &released {
                    warn!(error = %e, "Logout after panicking scope failed");
                }
                std::panic::resume_unwind(panic)
            }
        };

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(logout_err)) => {
                warn!(error = %logout_err, "Logout after failed scope also failed");
                Err(e)
            }
        }
    }

    /// `bw get <kind> <id>`.
    ///
    /// JSON objects and arrays are returned as [`Reply::Json`], anything
    /// else as the raw text.
    pub async fn get(&self, kind: ObjectKind, id: &str) -> Result<Reply> {
        self.require_token("get")?;
        let stdout = self
            .call(vec!["get".to_string(), kind.to_string(), id.to_string()])
            .await?;
        Ok(Reply::decode(&stdout))
    }

    /// `bw get item <id>` as a JSON object.
    pub async fn get_item(&self, id: &str) -> Result<Map<String, Value>> {
        self.require_token("get_item")?;
        let reply = self.get(ObjectKind::Item, id).await?;
        self.expect_object(reply, ObjectKind::Item, id)
    }

    /// `bw get template <kind>` as a JSON object.
    pub async fn get_template(&self, kind: TemplateKind) -> Result<Map<String, Value>> {
        self.require_token("get_template")?;
        let reply = self.get(ObjectKind::Template, kind.as_str()).await?;
        self.expect_object(reply, ObjectKind::Template, kind.as_str())
    }

    /// `bw list <kind>` with the given search, trash and extra flags.
    pub async fn list(&self, kind: ListKind, options: &ListOptions) -> Result<Vec<Value>> {
        self.require_token("list")?;

        let mut args = vec!["list".to_string(), kind.to_string()];
        args.extend(options.to_args());
        let command = display_command(&self.executable, &args);

        let stdout = self.call(args).await?;
        match serde_json::from_slice::<Value>(&stdout) {
            Ok(Value::Array(values)) => Ok(values),
            Ok(_) => Err(BitwardenError::UnexpectedOutput {
                command,
                expected: "a JSON array",
            }),
            Err(source) => Err(BitwardenError::Decode { command, source }),
        }
    }

    /// Run an authenticated command and return its stdout.
    async fn call(&self, mut args: Vec<String>) -> Result<Vec<u8>> {
        let token = self.require_token("call")?;
        args.push(SESSION_FLAG.to_string());
        args.push(token.expose().to_string());

        let invocation = Invocation::new(&self.executable, args, self.timeout)
            .with_env(SESSION_ENV, token.to_secret());
        let command = invocation.display_command();

        let output = self.run(invocation, &command).await?;
        classify::require_success(output, &command)
    }

    async fn run(&self, invocation: Invocation, command: &str) -> Result<CommandOutput> {
        debug!(command = %command, "Invoking Bitwarden CLI");
        let timeout = invocation.timeout;

        self.runner.run(invocation).await.map_err(|e| match e {
            RunError::NotFound(path) => BitwardenError::ExecutableNotFound(path),
            RunError::Timeout(_) => BitwardenError::Timeout {
                command: command.to_string(),
                timeout,
            },
            RunError::Spawn(e) | RunError::Io(e) => BitwardenError::Io(e),
        })
    }

    fn require_token(&self, operation: &'static str) -> Result<&SessionToken> {
        self.token
            .as_ref()
            .ok_or(BitwardenError::NotLoggedIn { operation })
    }

    fn expect_object(&self, reply: Reply, kind: ObjectKind, id: &str) -> Result<Map<String, Value>> {
        reply.into_object().ok_or_else(|| BitwardenError::UnexpectedOutput {
            command: display_command(
                &self.executable,
                &["get".to_string(), kind.to_string(), id.to_string()],
            ),
            expected: "a JSON object",
        })
    }
}

/// Copy the secret into a wiped-on-drop buffer ending in exactly one newline.
fn line_terminated(password: &SecretString) -> Zeroizing<Vec<u8>> {
    let secret = password.expose_secret().as_bytes();
    let mut buffer = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
    buffer.extend_from_slice(secret);
    if !buffer.ends_with(b"\n") {
        buffer.push(b'\n');
    }
    buffer
}


#[cfg(all(test, unix))]
mod fake_cli_tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in for `bw` that logs its arguments and answers like the CLI.
    const FAKE_BW: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$1" in
  login)
    read -r password
    if [ "$password" = "correct horse" ]; then
      printf 'fake_session_key\n'
    else
      echo "Username or password is incorrect. Try again." >&2
      exit 1
    fi
    ;;
  logout)
    exit 0
    ;;
  get)
    if [ "$BW_SESSION" != "fake_session_key" ]; then
      echo "You are not logged in." >&2
      exit 1
    fi
    case "$2" in
      password) printf 'aijee9Ee' ;;
      template) printf '{"name":"Item name","notes":"Some notes about this item."}' ;;
      *) echo "Not found." >&2; exit 1 ;;
    esac
    ;;
  list)
    printf '[{"name":"amazon.com"},{"name":"xbox.com"}]'
    ;;
  *)
    exit 2
    ;;
esac
"#;

    fn install_fake_bw(dir: &Path) -> PathBuf {
        let path = dir.join("bw");
        std::fs::write(&path, FAKE_BW).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn full_lifecycle_against_fake_cli() {
        let dir = tempfile::tempdir().unwrap();
        let exe = install_fake_bw(dir.path());

        let mut session = Session::builder()
            .username("user@email.com")
            .password(SecretString::from("correct horse"))
            .executable(&exe)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        let token = session.login(None, None).await.unwrap();
        assert_eq!(token.expose(), "fake_session_key");

        let password = session.get(ObjectKind::Password, "xbox.com").await.unwrap();
        assert_eq!(password.as_text(), Some("aijee9Ee"));

        let template = session.get_template(TemplateKind::Item).await.unwrap();
        assert_eq!(template["name"], "Item name");

        let items = session
            .list(ListKind::Items, &ListOptions::new().search("a"))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        session.logout().await.unwrap();
        assert!(!session.is_logged_in());

        let log = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        let first_words: Vec<_> = log
            .lines()
            .map(|l| l.split_whitespace().next().unwrap_or_default())
            .collect();
        assert_eq!(first_words, vec!["login", "get", "get", "list", "logout"]);
        assert!(!log.contains("correct horse"));
    }

    #[tokio::test]
    async fn wrong_password_against_fake_cli() {
        let dir = tempfile::tempdir().unwrap();
        let exe = install_fake_bw(dir.path());

        let mut session = Session::builder()
            .username("user@email.com")
            .executable(&exe)
            .build()
            .unwrap();

        let err = session
            .login(None, Some(SecretString::from("wrong")))
            .await
            .unwrap_err();
        assert!(err.is_incorrect_password());
    }

    #[tokio::test]
    async fn missing_executable_is_reported_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::builder()
            .username("user@email.com")
            .executable(dir.path().join("no-such-bw"))
            .build()
            .unwrap();

        let err = session
            .login(None, Some(SecretString::from("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, BitwardenError::ExecutableNotFound(_)));
    }
}
