//! Clients for the external systems touched by application lifecycle transitions.
//!
//! Each system sits behind a small trait so the lifecycle code can be exercised with mocks.
//! Implementations return `eyre` errors; callers decide how to classify a failure.

mod cluster;
mod dispatch;
mod mail;
mod push;
mod registry;
mod secret_store;

use alloc::collections::BTreeMap;
use core::time::Duration;

use async_trait::async_trait;
use eyre::WrapErr as _;
use hostplane_common::{DispatchEvent, DispatchPayload};

use crate::app::db::Subscription;

pub(crate) use cluster::KubeNamespaces;
pub(crate) use dispatch::GithubDispatcher;
pub(crate) use mail::SmtpMailer;
pub(crate) use push::WebPushSender;
pub(crate) use registry::HarborRegistry;
pub(crate) use secret_store::VaultSecretStore;

/// Environment variables of an application, as stored in the secret store.
pub(crate) type SecretMap = BTreeMap<String, String>;

/// Key/value store holding each application's runtime configuration under its name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait SecretStore: Send + Sync {
    async fn put(&self, path: &str, values: &SecretMap) -> eyre::Result<()>;
    /// Returns `None` if nothing is stored at `path`.
    async fn get(&self, path: &str) -> eyre::Result<Option<SecretMap>>;
    async fn delete(&self, path: &str) -> eyre::Result<()>;
}

/// CI/CD system that reconciles cluster state when told about lifecycle events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait Dispatcher: Send + Sync {
    async fn dispatch(&self, event: DispatchEvent, payload: &DispatchPayload) -> eyre::Result<()>;
}

/// Namespaces of the cluster running tenant workloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait ClusterNamespaces: Send + Sync {
    async fn exists(&self, name: &str) -> eyre::Result<bool>;
    async fn delete(&self, name: &str) -> eyre::Result<()>;
}

/// Container image repositories of the tenant project.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait ImageRegistry: Send + Sync {
    async fn exists(&self, name: &str) -> eyre::Result<bool>;
    async fn delete(&self, name: &str) -> eyre::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> eyre::Result<()>;
}

/// Result of a push attempt that reached the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Delivered,
    /// The push service no longer knows the subscription; it should be forgotten.
    Gone,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait PushSender: Send + Sync {
    async fn send(&self, subscription: &Subscription, message: &str)
    -> eyre::Result<PushOutcome>;
}

/// Builds the HTTP client shared by the REST based integrations.
///
/// # Errors
///
/// Returns an error if the client cannot be constructed.
pub(crate) fn http_client() -> eyre::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .wrap_err("Failed to build HTTP client")
}

/// Reads the body of an unexpected response for inclusion in an error message.
async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    format!("status {status}: {text}")
}
