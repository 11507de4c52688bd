//! Extra hostnames of approved applications.
//!
//! Hostnames are unique across the platform, primary and extra alike. Removed extra hostnames
//! keep their row so re-adding one restores it.

use hostplane_common::{
    DispatchEvent, DispatchPayload, KEY_APP_NAME, KEY_HOSTNAME, normalize_hostname,
};
use sqlx::SqliteConnection;
use tracing::info;

use super::{
    LifecycleError, Orchestrator, Stage,
    journal::{Journal, Operation},
};
use crate::app::db::{self, Application, ApplicationStatus, ExtraHostname};

/// Returns `true` if `hostname` is routed anywhere, as a primary or active extra hostname.
pub(super) async fn hostname_in_use(
    conn: &mut SqliteConnection,
    hostname: &str,
) -> sqlx::Result<bool> {
    Ok(db::applications::find_by_primary_hostname(&mut *conn, hostname)
        .await?
        .is_some()
        || db::hostnames::is_active_anywhere(&mut *conn, hostname).await?)
}

pub(super) fn require_approved(application: &Application) -> Result<(), LifecycleError> {
    if application.status == ApplicationStatus::Approved {
        Ok(())
    } else {
        Err(LifecycleError::Conflict("application is not approved"))
    }
}

fn hostname_payload(application: &Application, hostname: &str) -> DispatchPayload {
    DispatchPayload::new()
        .with(KEY_APP_NAME, application.name.as_str())
        .with(KEY_HOSTNAME, hostname)
}

impl Orchestrator {
    /// Routes `hostname` to an approved application of `user_id`.
    ///
    /// A previously removed hostname is restored, keeping its identity, even if it used to
    /// belong to another application. If the dispatch fails the hostname stays added and
    /// [`LifecycleError::Upstream`] is returned.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] if the hostname is the primary hostname or already routed
    /// anywhere on the platform.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn add_extra_hostname(
        &self,
        user_id: i64,
        application_id: i64,
        hostname: &str,
    ) -> Result<ExtraHostname, LifecycleError> {
        let hostname = normalize_hostname(hostname)?;
        let _claim = self.claim(application_id)?;
        let application = self.load_owned(user_id, application_id).await?;
        require_approved(&application)?;
        if hostname == application.primary_hostname {
            return Err(LifecycleError::Conflict(
                "the primary hostname cannot be an extra hostname",
            ));
        }

        let mut tx = self.pool.begin().await?;
        if db::applications::find_by_primary_hostname(&mut *tx, &hostname)
            .await?
            .is_some()
        {
            return Err(LifecycleError::Conflict("hostname is already in use"));
        }
        let extra = match db::hostnames::find_any(&mut *tx, &hostname).await? {
            Some(existing) if existing.is_active() && existing.application_id == application.id => {
                return Err(LifecycleError::Conflict("hostname already exists"));
            }
            Some(existing) if existing.is_active() => {
                return Err(LifecycleError::Conflict("hostname is already in use"));
            }
            Some(removed) => db::hostnames::restore(&mut *tx, removed.id, application.id).await?,
            None => db::hostnames::insert(&mut *tx, application.id, &hostname).await?,
        };
        tx.commit().await?;
        info!("Added extra hostname {hostname} to {}", application.name);

        Journal::new(&self.pool, &application, Operation::AddExtraHostname)
            .step(
                Stage::DispatchAddExtraHostname,
                self.collaborators.dispatcher.dispatch(
                    DispatchEvent::AddExtraHostname,
                    &hostname_payload(&application, &hostname),
                ),
            )
            .await?;
        Ok(extra)
    }

    /// Removes an extra hostname from an approved application of `user_id`.
    ///
    /// Like adding, a failed dispatch leaves the hostname removed.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] if the application has no such active extra hostname.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn delete_extra_hostname(
        &self,
        user_id: i64,
        application_id: i64,
        hostname: &str,
    ) -> Result<(), LifecycleError> {
        let hostname = normalize_hostname(hostname)?;
        let _claim = self.claim(application_id)?;
        let application = self.load_owned(user_id, application_id).await?;
        require_approved(&application)?;
        if hostname == application.primary_hostname {
            return Err(LifecycleError::Conflict(
                "the primary hostname cannot be removed",
            ));
        }

        if !db::hostnames::soft_delete(&self.pool, application.id, &hostname).await? {
            return Err(LifecycleError::NotFound("hostname"));
        }
        info!("Removed extra hostname {hostname} from {}", application.name);

        Journal::new(&self.pool, &application, Operation::DeleteExtraHostname)
            .step(
                Stage::DispatchDeleteExtraHostname,
                self.collaborators.dispatcher.dispatch(
                    DispatchEvent::DeleteExtraHostname,
                    &hostname_payload(&application, &hostname),
                ),
            )
            .await
    }
}
