//! Kubernetes namespaces.

use std::path::PathBuf;

use async_trait::async_trait;
use eyre::WrapErr as _;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Api, Client, Config,
    api::DeleteParams,
    config::{KubeConfigOptions, Kubeconfig},
};
use tokio::sync::OnceCell;

use super::ClusterNamespaces;

/// The client is created on first use, so the coordinator starts without cluster access.
pub(crate) struct KubeNamespaces {
    kubeconfig: Option<PathBuf>,
    client: OnceCell<Client>,
}

impl KubeNamespaces {
    pub(crate) const fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self {
            kubeconfig,
            client: OnceCell::const_new(),
        }
    }

    async fn api(&self) -> eyre::Result<Api<Namespace>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let config = match self.kubeconfig {
                    Some(ref path) => {
                        let kubeconfig = Kubeconfig::read_from(path).wrap_err(format!(
                            "Failed to read kubeconfig at: {}",
                            path.display()
                        ))?;
                        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                            .await?
                    }
                    None => Config::infer().await?,
                };
                Client::try_from(config).wrap_err("Failed to create Kubernetes client")
            })
            .await?;
        Ok(Api::all(client.clone()))
    }
}

#[async_trait]
impl ClusterNamespaces for KubeNamespaces {
    #[tracing::instrument(skip(self), err(Debug))]
    async fn exists(&self, name: &str) -> eyre::Result<bool> {
        let api = self.api().await?;
        match api.get(name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e).wrap_err(format!("Failed to look up namespace {name}")),
        }
    }

    #[tracing::instrument(skip(self), err(Debug))]
    async fn delete(&self, name: &str) -> eyre::Result<()> {
        let api = self.api().await?;
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                tracing::info!(namespace = %name, "Namespace deletion requested");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e).wrap_err(format!("Failed to delete namespace {name}")),
        }
    }
}
