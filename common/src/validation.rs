//! Validation of user supplied identifiers.
//!
//! An application name is used verbatim as database name, database user, secret path,
//! cluster namespace and registry repository. DDL identifiers cannot be bound as parameters,
//! so [`ApplicationName`] is the only type the provisioning code accepts, and the only way to
//! obtain one is through [`ApplicationName::parse`]. Changes to the rules in this module are
//! security relevant.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Substrings that may not appear (case-insensitively) in an application name.
pub const FORBIDDEN_NAME_KEYWORDS: [&str; 12] = [
    "--", "#", ";", "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "EXEC", "UNION", "OR", "AND",
];

/// MySQL account names are limited to 32 characters.
pub const MAX_APPLICATION_NAME_LENGTH: usize = 32;

static APPLICATION_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9\-]+$").expect("static regex is valid"));

static HOSTNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}$")
        .expect("static regex is valid")
});

static BRANCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/\-]+$").expect("static regex is valid"));

static GIT_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://[A-Za-z0-9.\-]+(?::[0-9]+)?/[A-Za-z0-9._\-/]+$")
        .expect("static regex is valid")
});

static ENVIRONMENT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex is valid"));

/// Reasons a user supplied value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid application name format")]
    ApplicationNameFormat,
    #[error("application name must be between 1 and {MAX_APPLICATION_NAME_LENGTH} characters")]
    ApplicationNameLength,
    #[error("application name contains forbidden characters or SQL keywords")]
    ApplicationNameKeyword,
    #[error("invalid hostname: {0}")]
    Hostname(String),
    #[error("invalid port number: {0}")]
    Port(i64),
    #[error("invalid branch name")]
    Branch,
    #[error("invalid git url")]
    GitUrl,
    #[error("invalid environment variable name: {0}")]
    EnvironmentKey(String),
}

/// Returns `true` if `name` is acceptable as an application name.
#[must_use]
pub fn is_valid_application_name(name: &str) -> bool {
    ApplicationName::parse(name).is_ok()
}

/// A validated application name.
///
/// Only lower-case alphanumerics and hyphens, no leading or trailing hyphen, at most
/// [`MAX_APPLICATION_NAME_LENGTH`] characters, and none of [`FORBIDDEN_NAME_KEYWORDS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationName(String);

impl ApplicationName {
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > MAX_APPLICATION_NAME_LENGTH {
            return Err(ValidationError::ApplicationNameLength);
        }
        if !APPLICATION_NAME_PATTERN.is_match(name) || name.starts_with('-') || name.ends_with('-')
        {
            return Err(ValidationError::ApplicationNameFormat);
        }
        let upper = name.to_ascii_uppercase();
        if FORBIDDEN_NAME_KEYWORDS
            .iter()
            .any(|keyword| upper.contains(keyword))
        {
            return Err(ValidationError::ApplicationNameKeyword);
        }
        Ok(Self(name.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ApplicationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApplicationName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ApplicationName> for String {
    fn from(value: ApplicationName) -> Self {
        value.0
    }
}

/// Returns `true` if `hostname` is a syntactically valid DNS name of 4 to 255 characters.
#[must_use]
pub fn is_valid_hostname(hostname: &str) -> bool {
    (4..=255).contains(&hostname.len()) && HOSTNAME_PATTERN.is_match(hostname)
}

/// Validates a hostname and returns its lower-cased form.
pub fn normalize_hostname(hostname: &str) -> Result<String, ValidationError> {
    let trimmed = hostname.trim();
    if is_valid_hostname(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(ValidationError::Hostname(hostname.to_owned()))
    }
}

/// Validates a TCP port number.
pub fn parse_port(port: i64) -> Result<u16, ValidationError> {
    u16::try_from(port)
        .ok()
        .filter(|&p| p != 0)
        .ok_or(ValidationError::Port(port))
}

pub fn validate_branch(branch: &str) -> Result<(), ValidationError> {
    let ok = BRANCH_PATTERN.is_match(branch)
        && !branch.starts_with(['-', '/'])
        && !branch.ends_with('/')
        && !branch.contains("..");
    if ok { Ok(()) } else { Err(ValidationError::Branch) }
}

pub fn validate_git_url(url: &str) -> Result<(), ValidationError> {
    if GIT_URL_PATTERN.is_match(url) && !url.contains("..") {
        Ok(())
    } else {
        Err(ValidationError::GitUrl)
    }
}

pub fn validate_environment_key(key: &str) -> Result<(), ValidationError> {
    if ENVIRONMENT_KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(ValidationError::EnvironmentKey(key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["web-app-1", "blog", "a", "x1-y2-z3"] {
            assert!(is_valid_application_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_characters_outside_allowed_class() {
        for name in [
            "Web", "web_app", "web app", "web.app", "web/app", "ünicode", "web'app", "web`app", "",
        ] {
            assert!(!is_valid_application_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn rejects_blocklisted_keywords_case_insensitively() {
        assert_eq!(
            ApplicationName::parse("drop-table"),
            Err(ValidationError::ApplicationNameKeyword)
        );
        // Every keyword that can survive the character class must be caught.
        for name in [
            "select1", "my-insert", "update", "delete-me", "xdropx", "exec", "union-app", "store",
            "band", "a--b",
        ] {
            assert!(!is_valid_application_name(name), "{name} should be invalid");
        }
    }

    #[test]
    fn rejects_hyphen_at_edges_and_overlong_names() {
        assert_eq!(
            ApplicationName::parse("-app"),
            Err(ValidationError::ApplicationNameFormat)
        );
        assert_eq!(
            ApplicationName::parse("app-"),
            Err(ValidationError::ApplicationNameFormat)
        );
        let long = "a".repeat(MAX_APPLICATION_NAME_LENGTH + 1);
        assert_eq!(
            ApplicationName::parse(&long),
            Err(ValidationError::ApplicationNameLength)
        );
    }

    #[test]
    fn application_name_deserialization_validates() {
        let ok: ApplicationName = serde_json::from_str("\"web-app-1\"").unwrap();
        assert_eq!(ok.as_str(), "web-app-1");
        assert!(serde_json::from_str::<ApplicationName>("\"drop-table\"").is_err());
    }

    #[test]
    fn hostname_rules() {
        assert!(is_valid_hostname("app.example.com"));
        assert!(is_valid_hostname("a.io"));
        assert!(!is_valid_hostname("a.b"));
        assert!(!is_valid_hostname("localhost"));
        assert!(!is_valid_hostname("-bad.example.com"));
        assert!(!is_valid_hostname("bad-.example.com"));
        assert!(!is_valid_hostname("under_score.example.com"));
        let long_label = format!("{}.com", "a".repeat(64));
        assert!(!is_valid_hostname(&long_label));
    }

    #[test]
    fn hostname_is_normalized_to_lowercase() {
        assert_eq!(
            normalize_hostname(" Shop.Example.COM ").unwrap(),
            "shop.example.com"
        );
        assert!(normalize_hostname("nope").is_err());
    }

    #[test]
    fn port_bounds() {
        assert_eq!(parse_port(8080), Ok(8080));
        assert_eq!(parse_port(1), Ok(1));
        assert_eq!(parse_port(65535), Ok(65535));
        assert_eq!(parse_port(0), Err(ValidationError::Port(0)));
        assert_eq!(parse_port(65536), Err(ValidationError::Port(65536)));
        assert_eq!(parse_port(-1), Err(ValidationError::Port(-1)));
    }

    #[test]
    fn branch_and_git_url() {
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("feature/new-ui").is_ok());
        assert!(validate_branch("").is_err());
        assert!(validate_branch("-rf").is_err());
        assert!(validate_branch("a..b").is_err());
        assert!(validate_git_url("https://github.com/owner/repo").is_ok());
        assert!(validate_git_url("https://git.example.com:8443/team/repo.git").is_ok());
        assert!(validate_git_url("http://github.com/owner/repo").is_err());
        assert!(validate_git_url("https://github.com/owner/repo; rm -rf /").is_err());
    }

    #[test]
    fn environment_keys() {
        assert!(validate_environment_key("DATABASE_URL").is_ok());
        assert!(validate_environment_key("_private").is_ok());
        assert!(validate_environment_key("1ABC").is_err());
        assert!(validate_environment_key("WITH-HYPHEN").is_err());
    }
}
