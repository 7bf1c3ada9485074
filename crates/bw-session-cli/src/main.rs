//! bw-session - Run Bitwarden CLI lookups inside a short-lived session.
//!
//! Every command logs in, performs one lookup, and logs out again, so no
//! session key outlives the process.
//!
//! # Usage
//!
//! ```bash
//! # Print a password
//! bw-session -u user@example.com get password xbox.com
//!
//! # Show a full item as JSON
//! bw-session item xbox.com
//!
//! # Search the vault, reading the master password from $BW_PASSWORD
//! bw-session --password-env BW_PASSWORD list items --search amazon
//!
//! # Show the template used to create new logins
//! bw-session template item.login
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bw_session_core::{
    Config, ListKind, ListOptions, ObjectKind, Reply, Session, TemplateKind,
};

/// Scoped lookups against the Bitwarden CLI.
#[derive(Parser, Debug)]
#[command(name = "bw-session")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file [default: ~/.config/bw-session/config.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Account email (overrides the config file)
    #[arg(short, long, value_name = "EMAIL")]
    username: Option<String>,

    /// Path to the `bw` executable [default: found on PATH]
    #[arg(long, value_name = "PATH")]
    executable: Option<PathBuf>,

    /// Seconds allowed for each `bw` invocation
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Read the master password from this environment variable instead of prompting
    #[arg(long, value_name = "VAR")]
    password_env: Option<String>,

    /// Increase log verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only show errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch one object (`bw get <kind> <id>`)
    Get {
        /// Object kind (item, password, username, totp, template, ...)
        kind: ObjectKind,
        /// Object id or search term
        id: String,
    },

    /// Fetch an item as JSON
    Item {
        /// Item id or search term
        id: String,
    },

    /// Fetch a creation template as JSON
    Template {
        /// Template kind (item, item.login, folder, ...)
        kind: TemplateKind,
    },

    /// List objects as a JSON array
    #[command(alias = "ls")]
    List {
        /// Object kind (items, folders, collections, ...)
        kind: ListKind,

        /// Only objects matching this term
        #[arg(long, short = 's')]
        search: Option<String>,

        /// List objects in the trash
        #[arg(long)]
        trash: bool,

        /// Only objects in this folder
        #[arg(long, value_name = "ID")]
        folderid: Option<String>,

        /// Only objects in this collection
        #[arg(long, value_name = "ID")]
        collectionid: Option<String>,

        /// Only objects owned by this organization
        #[arg(long, value_name = "ID")]
        organizationid: Option<String>,

        /// Only items with a URI matching this URL
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Get { .. } => "get",
            Commands::Item { .. } => "item",
            Commands::Template { .. } => "template",
            Commands::List { .. } => "list",
        }
    }
}

fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn setup_logging(level: &str) {
    // RUST_LOG takes precedence over the CLI flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for results
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration from specified path");
            Config::load_from(path).context("Failed to load configuration")
        }
        None => {
            let config = Config::load().context("Failed to load configuration")?;
            match Config::default_path() {
                Some(path) if path.exists() => {
                    debug!(path = %path.display(), "Loaded configuration")
                }
                _ => debug!("No config file found, using defaults"),
            }
            Ok(config)
        }
    }
}

fn password_from_env(var: &str) -> Result<SecretString> {
    let value = std::env::var(var)
        .with_context(|| format!("environment variable {var} is not set or not valid UTF-8"))?;
    Ok(SecretString::from(value))
}

fn build_session(cli: &Cli, config: &Config) -> Result<Session> {
    let mut builder = Session::builder().config(config);
    if let Some(username) = &cli.username {
        builder = builder.username(username.clone());
    }
    if let Some(executable) = &cli.executable {
        builder = builder.executable(executable.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(var) = &cli.password_env {
        builder = builder.password(password_from_env(var)?);
    }
    builder.build().context("Failed to set up Bitwarden session")
}

fn list_options(
    search: Option<String>,
    trash: bool,
    flags: [(&str, Option<String>); 4],
) -> ListOptions {
    let mut options = ListOptions::new().trash(trash);
    if let Some(term) = search {
        options = options.search(term);
    }
    for (key, value) in flags {
        if let Some(value) = value {
            options = options.flag(key, value);
        }
    }
    options
}

/// Run one subcommand against a logged-in session.
async fn execute(session: &Session, command: Commands) -> bw_session_core::Result<Reply> {
    match command {
        Commands::Get { kind, id } => session.get(kind, &id).await,
        Commands::Item { id } => session
            .get_item(&id)
            .await
            .map(|item| Reply::Json(Value::Object(item))),
        Commands::Template { kind } => session
            .get_template(kind)
            .await
            .map(|template| Reply::Json(Value::Object(template))),
        Commands::List {
            kind,
            search,
            trash,
            folderid,
            collectionid,
            organizationid,
            url,
        } => {
            let options = list_options(
                search,
                trash,
                [
                    ("folderid", folderid),
                    ("collectionid", collectionid),
                    ("organizationid", organizationid),
                    ("url", url),
                ],
            );
            session
                .list(kind, &options)
                .await
                .map(|values| Reply::Json(Value::Array(values)))
        }
    }
}

/// Text for stdout: pretty JSON, or plain text with a trailing newline.
fn render(reply: &Reply) -> Result<String> {
    let mut out = match reply {
        Reply::Json(value) => serde_json::to_string_pretty(value).context("Failed to format JSON")?,
        Reply::Text(text) => text.clone(),
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let mut session = build_session(&cli, &config)?;

    let name = cli.command.name();
    let command = cli.command;
    info!(command = name, "Running scoped Bitwarden command");

    let reply = session
        .scoped(move |s| Box::pin(async move { execute(s, command).await }))
        .await
        .with_context(|| format!("bw-session {name} failed"))?;

    print!("{}", render(&reply)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(log_level(cli.verbose, cli.quiet));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["bw-session", "get", "password", "xbox.com"]).unwrap();
        match cli.command {
            Commands::Get { kind, id } => {
                assert_eq!(kind, ObjectKind::Password);
                assert_eq!(id, "xbox.com");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["bw-session", "get", "vault", "x"]).is_err());
        assert!(Cli::try_parse_from(["bw-session", "list", "secrets"]).is_err());
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "bw-session",
            "-u",
            "user@email.com",
            "--executable",
            "/opt/bw",
            "--timeout",
            "5",
            "--password-env",
            "BW_PASSWORD",
            "-vv",
            "template",
            "item.login",
        ])
        .unwrap();

        assert_eq!(cli.username.as_deref(), Some("user@email.com"));
        assert_eq!(cli.executable, Some(PathBuf::from("/opt/bw")));
        assert_eq!(cli.timeout, Some(5));
        assert_eq!(cli.password_env.as_deref(), Some("BW_PASSWORD"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Template {
                kind: TemplateKind::ItemLogin
            }
        ));
    }

    #[test]
    fn parse_list_with_filters() {
        let cli = Cli::try_parse_from([
            "bw-session",
            "list",
            "items",
            "--search",
            "amazon",
            "--folderid",
            "f-1",
            "--trash",
        ])
        .unwrap();

        let Commands::List {
            kind,
            search,
            trash,
            folderid,
            collectionid,
            ..
        } = cli.command
        else {
            panic!("expected list command");
        };
        assert_eq!(kind, ListKind::Items);
        assert_eq!(search.as_deref(), Some("amazon"));
        assert!(trash);
        assert_eq!(folderid.as_deref(), Some("f-1"));
        assert!(collectionid.is_none());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["bw-session", "--timeout", "0", "item", "x"]).is_err());
        let cli = Cli::try_parse_from(["bw-session", "--timeout", "1", "item", "x"]).unwrap();
        assert_eq!(cli.timeout, Some(1));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["bw-session", "-q", "-v", "item", "x"]).is_err());
    }

    #[test]
    fn log_level_from_flags() {
        assert_eq!(log_level(0, false), "warn");
        assert_eq!(log_level(1, false), "debug");
        assert_eq!(log_level(3, false), "trace");
        assert_eq!(log_level(0, true), "error");
    }

    #[test]
    fn list_options_skip_missing_flags() {
        let options = list_options(
            Some("amazon".to_string()),
            false,
            [
                ("folderid", None),
                ("collectionid", Some("c-1".to_string())),
                ("organizationid", None),
                ("url", None),
            ],
        );
        assert_eq!(
            options.to_args(),
            vec!["--collectionid", "c-1", "--search", "amazon"]
        );
    }

    #[test]
    fn render_pretty_json() {
        let reply = Reply::Json(serde_json::json!({"name": "xbox.com"}));
        assert_eq!(render(&reply).unwrap(), "{\n  \"name\": \"xbox.com\"\n}\n");
    }

    #[test]
    fn render_text_as_is() {
        assert_eq!(render(&Reply::Text("aijee9Ee".into())).unwrap(), "aijee9Ee\n");
        assert_eq!(render(&Reply::Text("line\n".into())).unwrap(), "line\n");
    }

    #[test]
    fn missing_password_env_is_an_error() {
        let err = password_from_env("BW_SESSION_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("BW_SESSION_TEST_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/bw-session/config.toml");
        assert!(load_config(Some(&path)).is_err());
    }
}
