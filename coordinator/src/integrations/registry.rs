//! Harbor v2 repositories of the tenant project.

use async_trait::async_trait;
use eyre::{WrapErr as _, bail};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};

use super::{ImageRegistry, describe_failure};
use crate::config::RegistryConfig;

pub(crate) struct HarborRegistry {
    http: Client,
    api_url: String,
    project: String,
    username: String,
    password: SecretString,
}

impl HarborRegistry {
    pub(crate) fn new(http: Client, config: &RegistryConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            project: config.project.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/projects/{}/repositories/{name}", self.api_url, self.project)
    }
}

#[async_trait]
impl ImageRegistry for HarborRegistry {
    #[tracing::instrument(skip(self), err(Debug))]
    async fn exists(&self, name: &str) -> eyre::Result<bool> {
        let response = self
            .http
            .get(self.url(name))
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .wrap_err("Registry lookup request failed")?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => bail!("Registry lookup failed with {}", describe_failure(response).await),
        }
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn delete(&self, name: &str) -> eyre::Result<()> {
        let response = self
            .http
            .delete(self.url(name))
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .wrap_err("Registry delete request failed")?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => bail!("Registry delete failed with {}", describe_failure(response).await),
        }
    }
}
