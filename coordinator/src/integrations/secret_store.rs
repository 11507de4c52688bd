//! Vault compatible KV version 1 secret store.

use alloc::collections::BTreeMap;

use async_trait::async_trait;
use eyre::{WrapErr as _, bail};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;

use super::{SecretMap, SecretStore, describe_failure};
use crate::config::SecretStoreConfig;

const TOKEN_HEADER: &str = "X-Vault-Token";

pub(crate) struct VaultSecretStore {
    http: Client,
    address: String,
    mount: String,
    token: SecretString,
}

#[derive(Deserialize)]
struct ReadResponse {
    data: BTreeMap<String, serde_json::Value>,
}

impl VaultSecretStore {
    pub(crate) fn new(http: Client, config: &SecretStoreConfig) -> Self {
        Self {
            http,
            address: config.address.trim_end_matches('/').to_owned(),
            mount: config.mount.trim_matches('/').to_owned(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}/{}", self.address, self.mount, path)
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    #[tracing::instrument(skip(self, values), err(Debug))]
    async fn put(&self, path: &str, values: &SecretMap) -> eyre::Result<()> {
        let response = self
            .http
            .post(self.url(path))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .json(values)
            .send()
            .await
            .wrap_err("Secret store write request failed")?;
        if !response.status().is_success() {
            bail!("Secret store write failed with {}", describe_failure(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn get(&self, path: &str) -> eyre::Result<Option<SecretMap>> {
        let response = self
            .http
            .get(self.url(path))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .send()
            .await
            .wrap_err("Secret store read request failed")?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ReadResponse = response
                    .json()
                    .await
                    .wrap_err("Secret store returned an unexpected body")?;
                Ok(Some(
                    body.data
                        .into_iter()
                        .map(|(key, value)| match value {
                            serde_json::Value::String(s) => (key, s),
                            other => (key, other.to_string()),
                        })
                        .collect(),
                ))
            }
            _ => bail!("Secret store read failed with {}", describe_failure(response).await),
        }
    }

    /// Deleting a path that holds nothing is not an error.
    #[tracing::instrument(skip(self), err(Debug))]
    async fn delete(&self, path: &str) -> eyre::Result<()> {
        let response = self
            .http
            .delete(self.url(path))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .send()
            .await
            .wrap_err("Secret store delete request failed")?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => bail!("Secret store delete failed with {}", describe_failure(response).await),
        }
    }
}
