use hostplane_common::{
    ApplicationName, DispatchEvent, DispatchPayload, KEY_APP_NAME, KEY_BRANCH, KEY_GIT, KEY_PORT,
    KEY_PRIMARY_HOSTNAME, normalize_hostname, parse_port, validate_branch, validate_git_url,
};
use secrecy::ExposeSecret as _;
use serde::Deserialize;
use tracing::info;

use super::{
    LifecycleError, Orchestrator, Stage,
    hostnames::{hostname_in_use, require_approved},
    journal::{Journal, Operation},
};
use crate::{
    app::db::{self, Application, ApplicationStatus, NewApplication, User},
    integrations::{ClusterNamespaces, ImageRegistry, SecretMap, SecretStore},
    notifications::NotificationService,
    provisioner::DatabaseCredentials,
};

/// An application as submitted by its future owner.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApplicationSubmission {
    pub name: String,
    pub git_url: String,
    pub branch: String,
    pub port: i64,
    #[serde(default)]
    pub description: String,
}

/// Outcome of a successful approval.
#[derive(Debug, Clone)]
pub(crate) struct Approval {
    pub application: Application,
    pub credentials: DatabaseCredentials,
}

pub(crate) const APPROVAL_EMAIL_SUBJECT: &str = "Application Approved";

fn approval_email_body(application: &Application, credentials: &DatabaseCredentials) -> String {
    format!(
        "Your application {name} has been approved.\n\
         \n\
         Database connection details:\n\
         Type: mysql\n\
         Host: {host}\n\
         Port: {port}\n\
         Database: {database}\n\
         User: {username}\n\
         Password: {password}\n",
        name = application.name,
        host = credentials.host,
        port = credentials.port,
        database = credentials.database,
        username = credentials.username,
        password = credentials.password.expose_secret(),
    )
}

/// Creates the secret-store entry of an application unless one exists.
async fn init_secret(secrets: &dyn SecretStore, application: &Application) -> eyre::Result<()> {
    let path = application.name.as_str();
    if secrets.get(path).await?.is_none() {
        let values = SecretMap::from([("PORT".to_owned(), application.port.to_string())]);
        secrets.put(path, &values).await?;
    }
    Ok(())
}

async fn delete_namespace(cluster: &dyn ClusterNamespaces, name: &str) -> eyre::Result<()> {
    if cluster.exists(name).await? {
        cluster.delete(name).await?;
    }
    Ok(())
}

async fn delete_repository(registry: &dyn ImageRegistry, name: &str) -> eyre::Result<()> {
    if registry.exists(name).await? {
        registry.delete(name).await?;
    }
    Ok(())
}

impl Orchestrator {
    /// Registers a new application of `owner_id` in `Pending` and tells the admins.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Validation`] for a malformed field, [`LifecycleError::Conflict`] if the
    /// name or the derived primary hostname is taken.
    #[tracing::instrument(skip(self, submission), fields(name = %submission.name), err(Debug))]
    pub(crate) async fn submit(
        &self,
        owner_id: i64,
        submission: &ApplicationSubmission,
    ) -> Result<Application, LifecycleError> {
        let name = ApplicationName::parse(&submission.name)?;
        let port = parse_port(submission.port)?;
        validate_git_url(&submission.git_url)?;
        validate_branch(&submission.branch)?;
        let primary_hostname = normalize_hostname(&format!("{name}.{}", self.domain))?;

        let mut tx = self.pool.begin().await?;
        if db::applications::name_exists(&mut *tx, &name).await? {
            return Err(LifecycleError::Conflict("application name is already taken"));
        }
        if hostname_in_use(&mut tx, &primary_hostname).await? {
            return Err(LifecycleError::Conflict("hostname is already in use"));
        }
        let application = db::applications::insert(
            &mut *tx,
            &NewApplication {
                name: &name,
                git_url: &submission.git_url,
                branch: &submission.branch,
                port,
                description: &submission.description,
                owner_id,
                primary_hostname: &primary_hostname,
            },
        )
        .await?;
        let recorded = NotificationService::record_for_admins(
            &mut tx,
            &format!("New application submitted: {name}"),
        )
        .await?;
        tx.commit().await?;

        info!("Application {name} submitted");
        self.notifications.deliver_all(&recorded).await;
        Ok(application)
    }

    /// Provisions a pending application and marks it approved.
    ///
    /// The owner receives the database credentials by email and an in-app notification.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] unless the application is pending,
    /// [`LifecycleError::Upstream`] naming the first stage that failed.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn approve(&self, application_id: i64) -> Result<Approval, LifecycleError> {
        let _claim = self.claim(application_id)?;
        let application = self.load(application_id).await?;
        if application.status != ApplicationStatus::Pending {
            return Err(LifecycleError::Conflict("application is not pending"));
        }

        let journal = Journal::new(&self.pool, &application, Operation::Approve);
        let collaborators = &self.collaborators;
        let owner = journal
            .step(Stage::LoadOwner, self.owner(&application))
            .await?;
        journal
            .step(
                Stage::InitSecret,
                init_secret(collaborators.secrets.as_ref(), &application),
            )
            .await?;
        let payload = DispatchPayload::new()
            .with(KEY_APP_NAME, application.name.as_str())
            .with(KEY_GIT, application.git_url.as_str())
            .with(KEY_BRANCH, application.branch.as_str())
            .with(KEY_PORT, application.port.to_string())
            .with(KEY_PRIMARY_HOSTNAME, application.primary_hostname.as_str());
        journal
            .step(
                Stage::DispatchWriteValues,
                collaborators
                    .dispatcher
                    .dispatch(DispatchEvent::WriteValues, &payload),
            )
            .await?;
        let credentials = journal
            .step(
                Stage::ProvisionDatabase,
                collaborators.provisioner.provision(&application.name),
            )
            .await?;
        journal
            .step(
                Stage::SendApprovalEmail,
                collaborators.mailer.send(
                    &owner.email,
                    APPROVAL_EMAIL_SUBJECT,
                    &approval_email_body(&application, &credentials),
                ),
            )
            .await?;

        let mut tx = self.pool.begin().await?;
        if !db::applications::transition_status(
            &mut *tx,
            application.id,
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
        )
        .await?
        {
            return Err(LifecycleError::Conflict("application is not pending"));
        }
        let notification = NotificationService::record(
            &mut tx,
            application.owner_id,
            &format!("Your application {} has been approved", application.name),
        )
        .await?;
        tx.commit().await?;

        info!("Application {} approved", application.name);
        self.notifications.deliver(&notification).await;
        Ok(Approval {
            application: Application {
                status: ApplicationStatus::Approved,
                ..application
            },
            credentials,
        })
    }

    /// Tears down everything approval provisioned and returns the application to `Pending`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] unless the application is approved,
    /// [`LifecycleError::Upstream`] naming the first stage that failed.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn cancel_approval(
        &self,
        application_id: i64,
    ) -> Result<Application, LifecycleError> {
        let _claim = self.claim(application_id)?;
        let application = self.load(application_id).await?;
        require_approved(&application)?;

        self.deprovision(&application, Operation::CancelApproval)
            .await?;

        let mut tx = self.pool.begin().await?;
        if !db::applications::transition_status(
            &mut *tx,
            application.id,
            ApplicationStatus::Approved,
            ApplicationStatus::Pending,
        )
        .await?
        {
            return Err(LifecycleError::Conflict("application is not approved"));
        }
        let notification = NotificationService::record(
            &mut tx,
            application.owner_id,
            &format!(
                "Approval of your application {} has been revoked",
                application.name
            ),
        )
        .await?;
        tx.commit().await?;

        info!("Approval of application {} cancelled", application.name);
        self.notifications.deliver(&notification).await;
        Ok(Application {
            status: ApplicationStatus::Pending,
            ..application
        })
    }

    /// Deletes an application of `user_id`, deprovisioning it first if approved.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::PermissionDenied`] if `user_id` does not own the application.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn delete_application(
        &self,
        user_id: i64,
        application_id: i64,
    ) -> Result<(), LifecycleError> {
        let _claim = self.claim(application_id)?;
        let application = self.load_owned(user_id, application_id).await?;
        self.remove(application).await
    }

    /// Like [`Self::delete_application`] without the ownership check.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn delete_application_as_admin(
        &self,
        application_id: i64,
    ) -> Result<(), LifecycleError> {
        let _claim = self.claim(application_id)?;
        let application = self.load(application_id).await?;
        self.remove(application).await
    }

    /// Moves an approved application to a new primary hostname.
    ///
    /// The change is only committed once the dispatch succeeded.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Conflict`] if the hostname is routed anywhere on the platform.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn update_primary_hostname(
        &self,
        application_id: i64,
        hostname: &str,
    ) -> Result<Application, LifecycleError> {
        let hostname = normalize_hostname(hostname)?;
        let _claim = self.claim(application_id)?;
        let application = self.load(application_id).await?;
        require_approved(&application)?;
        if application.primary_hostname == hostname {
            return Ok(application);
        }

        let mut tx = self.pool.begin().await?;
        if hostname_in_use(&mut tx, &hostname).await? {
            return Err(LifecycleError::Conflict("hostname is already in use"));
        }
        db::applications::set_primary_hostname(&mut *tx, application.id, &hostname).await?;
        let payload = DispatchPayload::new()
            .with(KEY_APP_NAME, application.name.as_str())
            .with(KEY_PRIMARY_HOSTNAME, hostname.as_str());
        let dispatched = self
            .collaborators
            .dispatcher
            .dispatch(DispatchEvent::UpdatePrimaryHostname, &payload)
            .await;
        if dispatched.is_ok() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Journal::new(&self.pool, &application, Operation::UpdatePrimaryHostname)
            .conclude(Stage::DispatchUpdatePrimaryHostname, dispatched)
            .await?;

        info!(
            "Primary hostname of {} changed from {} to {hostname}",
            application.name, application.primary_hostname
        );
        Ok(Application {
            primary_hostname: hostname,
            ..application
        })
    }

    async fn owner(&self, application: &Application) -> eyre::Result<User> {
        db::users::find_by_id(&self.pool, application.owner_id)
            .await?
            .ok_or_else(|| eyre::eyre!("Owner {} does not exist", application.owner_id))
    }

    /// Removes every external resource of an approved application, in reverse order of creation.
    async fn deprovision(
        &self,
        application: &Application,
        operation: Operation,
    ) -> Result<(), LifecycleError> {
        let journal = Journal::new(&self.pool, application, operation);
        let collaborators = &self.collaborators;
        let name = application.name.as_str();
        journal
            .step(
                Stage::DeleteNamespace,
                delete_namespace(collaborators.cluster.as_ref(), name),
            )
            .await?;
        journal
            .step(
                Stage::DeleteRepository,
                delete_repository(collaborators.registry.as_ref(), name),
            )
            .await?;
        journal
            .step(Stage::DeleteSecret, collaborators.secrets.delete(name))
            .await?;
        journal
            .step(
                Stage::DropDatabase,
                collaborators.provisioner.deprovision(&application.name),
            )
            .await?;
        journal
            .step(
                Stage::DispatchRemovePipeline,
                collaborators.dispatcher.dispatch(
                    DispatchEvent::RemovePipeline,
                    &DispatchPayload::new().with(KEY_APP_NAME, name),
                ),
            )
            .await
    }

    async fn remove(&self, application: Application) -> Result<(), LifecycleError> {
        if application.status == ApplicationStatus::Approved {
            self.deprovision(&application, Operation::Delete).await?;
        }

        let mut tx = self.pool.begin().await?;
        if !db::applications::delete(&mut *tx, application.id).await? {
            return Err(LifecycleError::NotFound("application"));
        }
        let recorded = NotificationService::record_for_admins(
            &mut tx,
            &format!("Application deleted: {}", application.name),
        )
        .await?;
        tx.commit().await?;

        info!("Application {} deleted", application.name);
        self.notifications.deliver_all(&recorded).await;
        Ok(())
    }
}
