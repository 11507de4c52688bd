//! Events sent to the CI/CD system that renders and applies deployment manifests.

use alloc::collections::BTreeMap;
use core::fmt;

use serde::Serialize;

/// Payload key for the application name.
pub const KEY_APP_NAME: &str = "appName";
/// Payload key for the git URL.
pub const KEY_GIT: &str = "git";
/// Payload key for the git branch.
pub const KEY_BRANCH: &str = "branch";
/// Payload key for the container port.
pub const KEY_PORT: &str = "port";
/// Payload key for the primary hostname.
pub const KEY_PRIMARY_HOSTNAME: &str = "primaryHostname";
/// Payload key for an extra hostname.
pub const KEY_HOSTNAME: &str = "hostname";

/// Lifecycle events understood by the dispatch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchEvent {
    /// Render and apply the manifests of a freshly approved application.
    WriteValues,
    /// Tear down the deployment pipeline of an application.
    RemovePipeline,
    AddExtraHostname,
    DeleteExtraHostname,
    UpdatePrimaryHostname,
}

impl DispatchEvent {
    /// Wire name of the event, used as `event_type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WriteValues => "write-values",
            Self::RemovePipeline => "remove-pipeline",
            Self::AddExtraHostname => "add-extra-hostname",
            Self::DeleteExtraHostname => "delete-extra-hostname",
            Self::UpdatePrimaryHostname => "update-primary-hostname",
        }
    }
}

impl fmt::Display for DispatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String map sent as `client_payload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DispatchPayload(BTreeMap<&'static str, String>);

impl DispatchPayload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing a previous value for the same key.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_serde_representation() {
        for event in [
            DispatchEvent::WriteValues,
            DispatchEvent::RemovePipeline,
            DispatchEvent::AddExtraHostname,
            DispatchEvent::DeleteExtraHostname,
            DispatchEvent::UpdatePrimaryHostname,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()), "{event:?}");
        }
    }

    #[test]
    fn payload_serializes_as_flat_string_map() {
        let payload = DispatchPayload::new()
            .with(KEY_APP_NAME, "web-app-1")
            .with(KEY_PORT, 8080.to_string());
        assert_eq!(payload.get(KEY_PORT), Some("8080"));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"appName": "web-app-1", "port": "8080"})
        );
    }
}
