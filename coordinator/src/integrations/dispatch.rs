//! GitHub `repository_dispatch` events.

use async_trait::async_trait;
use eyre::{WrapErr as _, bail};
use hostplane_common::{DispatchEvent, DispatchPayload};
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;

use super::{Dispatcher, describe_failure};
use crate::config::DispatchConfig;

pub(crate) struct GithubDispatcher {
    http: Client,
    url: String,
    token: SecretString,
}

#[derive(Serialize)]
struct DispatchRequest<'a> {
    event_type: &'static str,
    client_payload: &'a DispatchPayload,
}

impl GithubDispatcher {
    pub(crate) fn new(http: Client, config: &DispatchConfig) -> Self {
        Self {
            http,
            url: format!(
                "{}/repos/{}/{}/dispatches",
                config.api_url.trim_end_matches('/'),
                config.owner,
                config.repository
            ),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl Dispatcher for GithubDispatcher {
    #[tracing::instrument(skip(self, payload), fields(event = %event), err(Debug))]
    async fn dispatch(&self, event: DispatchEvent, payload: &DispatchPayload) -> eyre::Result<()> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&DispatchRequest {
                event_type: event.as_str(),
                client_payload: payload,
            })
            .send()
            .await
            .wrap_err("Dispatch request failed")?;
        if response.status() != StatusCode::NO_CONTENT {
            bail!("Dispatch of {event} failed with {}", describe_failure(response).await);
        }
        tracing::info!("Dispatched {event}");
        Ok(())
    }
}
