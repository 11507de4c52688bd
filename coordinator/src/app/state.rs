use alloc::sync::Arc;
use std::path::{Path, PathBuf};

use eyre::WrapErr as _;
use tracing::info;

use crate::{
    app::db::{self, DbPool},
    config::{ControllerConfig, load, resolve_config_relative_paths},
    integrations::{
        GithubDispatcher, HarborRegistry, KubeNamespaces, PushSender, SmtpMailer,
        VaultSecretStore, WebPushSender, http_client,
    },
    lifecycle::{Collaborators, Orchestrator},
    notifications::{ConnectionRegistry, NotificationService},
    provisioner::MySqlProvisioner,
};

/// Application state shared across request handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Path to the configuration file, for diagnostics.
    pub config_path: PathBuf,

    pub config: Arc<ControllerConfig>,

    /// Control plane database.
    pub db_pool: DbPool,

    pub lifecycle: Arc<Orchestrator>,

    pub notifications: NotificationService,
}

/// Open the control plane database, relative to the config file when appropriate.
#[tracing::instrument(skip_all)]
async fn initialize_database(config: &ControllerConfig, config_path: &Path) -> eyre::Result<DbPool> {
    let db_path = resolve_config_relative_paths(config_path, &config.db.path);
    let pool = db::init(&db_path).await.wrap_err(format!(
        "Failed to initialize database at: {}",
        db_path.display()
    ))?;
    info!(
        "Database initialized at: {} (note: WAL mode creates .db-wal and .db-shm files alongside)",
        db_path.display()
    );
    Ok(pool)
}

/// Builds the clients of every external system from the configuration.
///
/// None of them connects yet.
fn build_collaborators(config: &ControllerConfig) -> eyre::Result<Collaborators> {
    let http = http_client()?;
    Ok(Collaborators {
        secrets: Arc::new(VaultSecretStore::new(http.clone(), &config.secret_store)),
        dispatcher: Arc::new(GithubDispatcher::new(http.clone(), &config.dispatch)),
        cluster: Arc::new(KubeNamespaces::new(
            config.cluster.kubeconfig.as_deref().map(PathBuf::from),
        )),
        registry: Arc::new(HarborRegistry::new(http, &config.registry)),
        provisioner: Arc::new(MySqlProvisioner::new(&config.provisioner)?),
        mailer: Arc::new(SmtpMailer::new(&config.smtp)?),
    })
}

/// Emit startup warnings based on configuration.
fn emit_startup_warnings(app_state: &AppState) {
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt as _;
        if let Ok(metadata) = fs::metadata(&app_state.config_path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    "Config file permissions are too permissive (current: {mode:#o}). It holds credentials of every backing system; run 'chmod 600 {}' to restrict access to owner only.",
                    app_state.config_path.display()
                );
            }
        }
    }

    if app_state.config.push.is_none() {
        info!("No [push] section configured, offline users only receive pooled notifications");
    }

    if app_state.config.server.auth.admins.is_empty() {
        tracing::warn!(
            "No admins configured in [server.auth]; applications cannot be approved until one is added."
        );
    }
}

/// Initialize application state.
#[tracing::instrument(skip_all)]
pub(super) async fn initialize_state(config_path: &Path) -> eyre::Result<AppState> {
    let config = Arc::new(load(config_path).await?);

    let db_pool = initialize_database(&config, config_path).await?;

    let push = config
        .push
        .as_ref()
        .map(|push| -> eyre::Result<Arc<dyn PushSender>> {
            Ok(Arc::new(WebPushSender::new(http_client()?, push)))
        })
        .transpose()?;
    let notifications = NotificationService::new(
        db_pool.clone(),
        ConnectionRegistry::new(config.notifications),
        push,
    );

    let lifecycle = Arc::new(Orchestrator::new(
        db_pool.clone(),
        notifications.clone(),
        build_collaborators(&config)?,
        config.platform.domain.as_str(),
    ));

    let app_state = AppState {
        config_path: config_path.to_path_buf(),
        config,
        db_pool,
        lifecycle,
        notifications,
    };

    emit_startup_warnings(&app_state);

    Ok(app_state)
}
