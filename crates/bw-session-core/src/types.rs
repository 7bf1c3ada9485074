//! Core types for bw-session.
//!
//! This module contains the vocabulary shared by the session and the
//! command runner: the object kinds understood by `bw get` and `bw list`,
//! the session token, the parsed reply of a `get` call, and the options
//! accepted by `list`.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} '{name}'")]
pub struct UnknownKind {
    what: &'static str,
    name: String,
}

/// Generates a string-backed kind enum with `as_str`, `Display`, `FromStr`
/// and a list of every variant.
macro_rules! string_kind {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every recognized value, in CLI documentation order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// The name passed to the `bw` executable.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownKind {
                        what: $what,
                        name: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_kind! {
    /// Object kinds accepted by `bw get`.
    ///
    /// Structured kinds (`item`, `folder`, `template`, ...) come back as JSON,
    /// scalar kinds (`password`, `username`, `totp`, ...) as plain text.
    ObjectKind, "object kind" {
        Item => "item",
        Username => "username",
        Password => "password",
        Uri => "uri",
        Totp => "totp",
        /// Number of times a password appears in known breaches.
        Exposed => "exposed",
        Attachment => "attachment",
        Folder => "folder",
        Collection => "collection",
        Organization => "organization",
        OrgCollection => "org_collection",
        Template => "template",
        Fingerprint => "fingerprint",
    }
}

string_kind! {
    /// Template kinds accepted by `bw get template`.
    TemplateKind, "template kind" {
        Item => "item",
        ItemField => "item.field",
        ItemLogin => "item.login",
        ItemLoginUri => "item.login.uri",
        ItemCard => "item.card",
        ItemIdentity => "item.identity",
        ItemSecureNote => "item.securenote",
        Folder => "folder",
        Collection => "collection",
        ItemCollections => "item-collections",
        OrgCollection => "org-collection",
    }
}

string_kind! {
    /// Object kinds accepted by `bw list`.
    ListKind, "list kind" {
        Items => "items",
        Folders => "folders",
        Collections => "collections",
        Organization => "organization",
        OrgCollections => "org-collections",
        OrgMembers => "org-members",
    }
}

/// An authenticated session key issued by `bw login --raw`.
///
/// The key is held in a [`SecretString`] and never printed by `Debug`.
#[derive(Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Wrap a raw session key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// Expose the raw session key.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub(crate) fn to_secret(&self) -> SecretString {
        self.0.clone()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// The decoded stdout of a `bw get` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A JSON object or array (items, folders, templates, ...).
    Json(Value),
    /// Anything else, returned exactly as printed.
    Text(String),
}

impl Reply {
    /// Decode raw stdout.
    ///
    /// Only JSON objects and arrays are treated as structured; a bare JSON
    /// scalar such as `12345` stays text so a numeric password is not turned
    /// into a number.
    pub fn decode(stdout: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stdout).into_owned();
        match serde_json::from_str::<Value>(&text) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Reply::Json(value),
            _ => Reply::Text(text),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Reply::Json(value) => Some(value),
            Reply::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Json(_) => None,
        }
    }

    /// Take the reply as a JSON object, if it is one.
    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            Reply::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Configuration for a password prompt.
///
/// This is passed to the `PasswordPrompt` trait implementation to configure
/// what the user sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Longer text explaining what is being asked for.
    pub description: String,

    /// Short prompt shown next to the input.
    pub prompt_text: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            description: "Enter your Bitwarden Password".to_string(),
            prompt_text: ">".to_string(),
        }
    }
}

/// Value of an extra `bw list` flag.
///
/// Falsy values (empty text, `false`, `0`) are dropped when the command is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Text(String),
    Int(i64),
    /// `true` renders as a bare switch.
    Switch(bool),
}

impl FlagValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            FlagValue::Text(text) => !text.is_empty(),
            FlagValue::Int(n) => *n != 0,
            FlagValue::Switch(on) => *on,
        }
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Text(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::Text(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Switch(value)
    }
}

/// Options for [`Session::list`](crate::Session::list).
///
/// # Example
///
/// ```
/// use bw_session_core::ListOptions;
///
/// let options = ListOptions::new()
///     .search("amazon")
///     .flag("folderid", "0f3c")
///     .trash(false);
///
/// assert_eq!(
///     options.to_args(),
///     vec!["--folderid", "0f3c", "--search", "amazon"]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    search: Option<String>,
    trash: bool,
    flags: Vec<(String, FlagValue)>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by search term. An empty term is ignored.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// List items in the trash instead of the vault.
    pub fn trash(mut self, trash: bool) -> Self {
        self.trash = trash;
        self
    }

    /// Add an extra `--<key> <value>` flag (e.g. `folderid`, `url`).
    pub fn flag(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.flags.push((key.into(), value.into()));
        self
    }

    /// Render the flags in the order they are passed to `bw list`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (key, value) in &self.flags {
            if !value.is_truthy() {
                continue;
            }
            args.push(format!("--{}", key));
            match value {
                FlagValue::Text(text) => args.push(text.clone()),
                FlagValue::Int(n) => args.push(n.to_string()),
                FlagValue::Switch(_) => {}
            }
        }

        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            args.push("--search".to_string());
            args.push(term.to_string());
        }

        if self.trash {
            args.push("--trash".to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_kind_names() {
        assert_eq!(ObjectKind::Item.as_str(), "item");
        assert_eq!(ObjectKind::OrgCollection.to_string(), "org_collection");
        assert_eq!("totp".parse::<ObjectKind>().unwrap(), ObjectKind::Totp);
        assert_eq!(ObjectKind::ALL.len(), 13);
    }

    #[test]
    fn template_kind_names() {
        assert_eq!(TemplateKind::ItemLoginUri.as_str(), "item.login.uri");
        assert_eq!(
            "item-collections".parse::<TemplateKind>().unwrap(),
            TemplateKind::ItemCollections
        );
        assert_eq!(TemplateKind::ALL.len(), 11);
    }

    #[test]
    fn list_kind_names() {
        assert_eq!(ListKind::OrgMembers.to_string(), "org-members");
        assert_eq!("items".parse::<ListKind>().unwrap(), ListKind::Items);
        assert_eq!(ListKind::ALL.len(), 6);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "vault".parse::<ListKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown list kind 'vault'");
        assert!("attachement".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn kind_serde_uses_cli_names() {
        let json = serde_json::to_string(&TemplateKind::ItemSecureNote).unwrap();
        assert_eq!(json, r#""item.securenote""#);
        let parsed: ListKind = serde_json::from_str(r#""org-collections""#).unwrap();
        assert_eq!(parsed, ListKind::OrgCollections);
    }

    #[test]
    fn session_token_debug_is_redacted() {
        let token = SessionToken::new("super-secret-key");
        let debug_output = format!("{:?}", token);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-key"));
        assert_eq!(token.expose(), "super-secret-key");
    }

    #[test]
    fn reply_decodes_json_object() {
        let reply = Reply::decode(br#"{"object":"item","name":"xbox.com"}"#);
        let map = reply.into_object().unwrap();
        assert_eq!(map["name"], "xbox.com");
    }

    #[test]
    fn reply_keeps_plain_text() {
        assert_eq!(
            Reply::decode(b"aijee9Ee"),
            Reply::Text("aijee9Ee".to_string())
        );
    }

    #[test]
    fn reply_keeps_json_scalars_as_text() {
        assert_eq!(Reply::decode(b"12345"), Reply::Text("12345".to_string()));
        assert_eq!(Reply::decode(b"true").as_text(), Some("true"));
    }

    #[test]
    fn reply_tolerates_invalid_utf8() {
        let reply = Reply::decode(&[0x66, 0x6f, 0xff, 0x6f]);
        assert_eq!(reply.as_text(), Some("fo\u{fffd}o"));
    }

    #[test]
    fn list_options_search() {
        let args = ListOptions::new().search("amazon").to_args();
        assert_eq!(args, vec!["--search", "amazon"]);
    }

    #[test]
    fn list_options_without_search_omits_flag() {
        assert!(ListOptions::new().to_args().is_empty());
        assert!(ListOptions::new().search("").to_args().is_empty());
    }

    #[test]
    fn list_options_trash_is_a_switch() {
        assert_eq!(ListOptions::new().trash(true).to_args(), vec!["--trash"]);
    }

    #[test]
    fn list_options_drop_falsy_flags() {
        let args = ListOptions::new()
            .flag("folderid", "")
            .flag("collectionid", false)
            .flag("limit", 0i64)
            .to_args();
        assert!(args.is_empty());
    }

    #[test]
    fn list_options_render_truthy_flags() {
        let args = ListOptions::new()
            .flag("url", "https://example.com")
            .flag("limit", 5i64)
            .flag("favorite", true)
            .to_args();
        assert_eq!(
            args,
            vec!["--url", "https://example.com", "--limit", "5", "--favorite"]
        );
    }
}
