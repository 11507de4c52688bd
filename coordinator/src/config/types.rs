//! Configuration data types and structures for the coordinator.
//!
//! This module contains all the data structures used for configuration,
//! including server, persistence, notification and collaborator settings.

use core::time::Duration;
use std::path::{Component, Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

/// HTTP server binding configuration section.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ServerConfig {
    /// TCP port for the control plane API.
    pub port: u16,
    /// Bind address for the HTTP listener.
    pub bind: String,
    /// Time after which a client stops waiting for a response.
    ///
    /// Lifecycle operations keep running past it and can be followed in their journal.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How requests are attributed to users.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Identity is established by an authenticating reverse proxy in front of the coordinator.
///
/// The proxy must strip these headers from client requests and set them itself.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AuthConfig {
    /// Header carrying the authenticated username.
    #[serde(default = "default_user_header")]
    pub user_header: String,
    /// Header carrying the email address of the authenticated user.
    #[serde(default = "default_email_header")]
    pub email_header: String,
    /// Usernames that are registered with the admin flag on first sight.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
            email_header: default_email_header(),
            admins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub(crate) const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_header() -> String {
    "x-forwarded-user".to_string()
}

fn default_email_header() -> String {
    "x-forwarded-email".to_string()
}

/// Configuration of the control plane `SQLite` database.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct DbConfig {
    /// Path to the `SQLite` database file. Relative paths are resolved relative to the config file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "./hostplane.db".to_string()
}

/// Platform wide settings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct PlatformConfig {
    /// Domain under which every application gets its primary hostname `{name}.{domain}`.
    pub domain: String,
}

/// Timings of the live notification channel.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NotificationsConfig {
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    /// A keep-alive ping that cannot be written within this time tears the connection down.
    #[serde(default = "default_write_deadline_secs")]
    pub write_deadline_secs: u64,
    /// A connection that sends nothing (not even a pong) for this long is closed.
    #[serde(default = "default_read_deadline_secs")]
    pub read_deadline_secs: u64,
    /// Maximum number of undelivered messages kept in memory per offline user.
    #[serde(default = "default_pending_limit")]
    pub pending_limit: usize,
}

impl NotificationsConfig {
    pub(crate) const fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub(crate) const fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }

    pub(crate) const fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: default_keepalive_interval_secs(),
            write_deadline_secs: default_write_deadline_secs(),
            read_deadline_secs: default_read_deadline_secs(),
            pending_limit: default_pending_limit(),
        }
    }
}

const fn default_keepalive_interval_secs() -> u64 {
    30
}

const fn default_write_deadline_secs() -> u64 {
    10
}

const fn default_read_deadline_secs() -> u64 {
    60
}

const fn default_pending_limit() -> usize {
    100
}

/// Privileged access to the MySQL server hosting tenant databases.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ProvisionerConfig {
    /// Connection URL of an account allowed to create databases and users.
    pub admin_url: SecretString,
    /// Host name handed out to tenants in their credentials.
    pub advertised_host: String,
    #[serde(default = "default_mysql_port")]
    pub advertised_port: u16,
}

const fn default_mysql_port() -> u16 {
    3306
}

/// Vault compatible KV (version 1) secret store.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SecretStoreConfig {
    /// Base address, e.g. `https://vault.example.com:8200`.
    pub address: String,
    pub token: SecretString,
    #[serde(default = "default_secret_mount")]
    pub mount: String,
}

fn default_secret_mount() -> String {
    "secret".to_string()
}

/// GitHub repository receiving `repository_dispatch` events.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct DispatchConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    pub owner: String,
    pub repository: String,
    pub token: SecretString,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Access to the Kubernetes cluster running tenant workloads.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub(crate) struct ClusterConfig {
    /// Optional kubeconfig path. In-cluster or inferred configuration is used when absent.
    #[serde(default)]
    pub kubeconfig: Option<String>,
}

/// Harbor container registry.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct RegistryConfig {
    /// API base, e.g. `https://harbor.example.com/api/v2.0`.
    pub api_url: String,
    pub project: String,
    pub username: String,
    pub password: SecretString,
}

/// SMTP relay used for credential emails.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Sender mailbox, e.g. `Hosting <noreply@example.com>`.
    pub from: String,
    /// Use STARTTLS. Plain connections are only meant for local relays.
    #[serde(default = "do_starttls")]
    pub starttls: bool,
}

const fn default_smtp_port() -> u16 {
    587
}

const fn do_starttls() -> bool {
    true
}

/// Web push (VAPID) settings. Push delivery is disabled when the section is absent.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct PushConfig {
    /// Base64url encoded public key, handed to browsers for subscribing.
    pub public_key: String,
    /// PEM encoded EC private key matching `public_key`.
    pub private_key: SecretString,
    #[serde(default = "default_push_ttl")]
    pub ttl_secs: u32,
    /// Contact URI included in the VAPID claims.
    #[serde(default)]
    pub subject: Option<String>,
}

const fn default_push_ttl() -> u32 {
    86_400
}

/// Resolves a path to an absolute one.
///
/// If the path is absolute, returns it as-is. If relative, joins it with the
/// config file's parent directory and normalizes the result to remove redundant
/// components like `./`.
pub fn resolve_config_relative_paths(config_path: &Path, relative_path: &str) -> PathBuf {
    let path = Path::new(relative_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else if relative_path == ":memory:" {
        // Special case: SQLite in-memory database path
        path.to_path_buf()
    } else {
        config_path
            .parent()
            .map_or_else(|| path.to_path_buf(), |d| d.join(path))
    };

    // We can't use canonicalize() because the file might not exist yet
    normalize_path(&resolved)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        use Component as C;
        match component {
            C::Normal(c) => {
                result.push(c);
            }
            C::ParentDir => {
                result.pop();
            }
            C::CurDir => {}
            C::RootDir | C::Prefix(_) => {
                result.push(component);
            }
        }
    }
    result
}

/// Root config structure for the coordinator.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ControllerConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub db: DbConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    pub provisioner: ProvisionerConfig,
    pub secret_store: SecretStoreConfig,
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    pub registry: RegistryConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub push: Option<PushConfig>,
}
