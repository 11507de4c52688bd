//! Application lifecycle: the `Pending` <-> `Approved` state machine and everything hanging off it.
//!
//! A transition calls the external collaborators one after another, outside of any database
//! transaction. Each call is a [`Stage`] recorded in the lifecycle journal. A failing stage aborts
//! the transition with [`LifecycleError::Upstream`]; stages that already ran are not undone but
//! are idempotent, so repeating the operation converges. Local rows are only written once every
//! external stage succeeded, in a single transaction with a conditional status update.

mod claim;
mod environments;
mod error;
mod hostnames;
mod journal;
mod transitions;

use alloc::sync::Arc;

use serde::Serialize;

pub(crate) use environments::EnvironmentEntry;
pub(crate) use error::{LifecycleError, Stage};
pub(crate) use transitions::ApplicationSubmission;

use self::claim::{ClaimGuard, Claims};
use crate::{
    app::db::{self, Application, DbPool, ExtraHostname, JournalEntry, User},
    integrations::{ClusterNamespaces, Dispatcher, ImageRegistry, Mailer, SecretStore},
    notifications::NotificationService,
    provisioner::DatabaseProvisioner,
};

/// The external systems a lifecycle transition touches.
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub secrets: Arc<dyn SecretStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub cluster: Arc<dyn ClusterNamespaces>,
    pub registry: Arc<dyn ImageRegistry>,
    pub provisioner: Arc<dyn DatabaseProvisioner>,
    pub mailer: Arc<dyn Mailer>,
}

pub(crate) struct Orchestrator {
    pool: DbPool,
    notifications: NotificationService,
    collaborators: Collaborators,
    domain: String,
    claims: Claims,
}

/// A user together with every application they own.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub applications: Vec<Application>,
}

/// An application together with its active extra hostnames.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ApplicationDetails {
    #[serde(flatten)]
    pub application: Application,
    pub extra_hostnames: Vec<ExtraHostname>,
}

impl Orchestrator {
    pub(crate) fn new(
        pool: DbPool,
        notifications: NotificationService,
        collaborators: Collaborators,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            notifications,
            collaborators,
            domain: domain.into(),
            claims: Claims::default(),
        }
    }

    async fn load(&self, application_id: i64) -> Result<Application, LifecycleError> {
        db::applications::find(&self.pool, application_id)
            .await?
            .ok_or(LifecycleError::NotFound("application"))
    }

    /// Loads an application on behalf of `user_id`, who has to own it.
    async fn load_owned(
        &self,
        user_id: i64,
        application_id: i64,
    ) -> Result<Application, LifecycleError> {
        let application = self.load(application_id).await?;
        if application.owner_id != user_id {
            return Err(LifecycleError::PermissionDenied);
        }
        Ok(application)
    }

    fn claim(&self, application_id: i64) -> Result<ClaimGuard<'_>, LifecycleError> {
        self.claims
            .try_claim(application_id)
            .ok_or(LifecycleError::Conflict(
                "another operation on this application is in progress",
            ))
    }

    async fn details(&self, application: Application) -> Result<ApplicationDetails, LifecycleError> {
        let extra_hostnames = db::hostnames::list_active(&self.pool, application.id).await?;
        Ok(ApplicationDetails {
            application,
            extra_hostnames,
        })
    }

    pub(crate) async fn list_own(&self, user_id: i64) -> Result<Vec<Application>, LifecycleError> {
        Ok(db::applications::list_by_owner(&self.pool, user_id).await?)
    }

    /// # Errors
    ///
    /// [`LifecycleError::PermissionDenied`] if `user_id` does not own the application.
    pub(crate) async fn get_own(
        &self,
        user_id: i64,
        application_id: i64,
    ) -> Result<ApplicationDetails, LifecycleError> {
        let application = self.load_owned(user_id, application_id).await?;
        self.details(application).await
    }

    pub(crate) async fn list_all(&self) -> Result<Vec<Application>, LifecycleError> {
        Ok(db::applications::list(&self.pool).await?)
    }

    pub(crate) async fn get(&self, application_id: i64) -> Result<ApplicationDetails, LifecycleError> {
        let application = self.load(application_id).await?;
        self.details(application).await
    }

    /// Recorded stages of every transition of the application, oldest first.
    pub(crate) async fn journal(
        &self,
        application_id: i64,
    ) -> Result<Vec<JournalEntry>, LifecycleError> {
        Ok(db::journal::list_for_application(&self.pool, application_id).await?)
    }

    pub(crate) async fn list_users(&self) -> Result<Vec<User>, LifecycleError> {
        Ok(db::users::list(&self.pool).await?)
    }

    async fn load_user(&self, user_id: i64) -> Result<User, LifecycleError> {
        db::users::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(LifecycleError::NotFound("user"))
    }

    pub(crate) async fn get_user(&self, user_id: i64) -> Result<UserDetails, LifecycleError> {
        let user = self.load_user(user_id).await?;
        let applications = db::applications::list_by_owner(&self.pool, user.id).await?;
        Ok(UserDetails { user, applications })
    }

    /// Applications owned by `user_id`, for admins.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::NotFound`] for an unknown user.
    pub(crate) async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Application>, LifecycleError> {
        let user = self.load_user(user_id).await?;
        Ok(db::applications::list_by_owner(&self.pool, user.id).await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        app::db::{ApplicationStatus, test_support::TestDb},
        config::NotificationsConfig,
        integrations::{
            MockClusterNamespaces, MockDispatcher, MockImageRegistry, MockMailer, MockSecretStore,
        },
        notifications::ConnectionRegistry,
        provisioner::MockDatabaseProvisioner,
    };
    use hostplane_common::ApplicationName;

    pub(crate) const DOMAIN: &str = "apps.example.com";

    /// Collaborators without expectations; any unexpected call panics.
    #[derive(Default)]
    pub(crate) struct Mocks {
        pub secrets: MockSecretStore,
        pub dispatcher: MockDispatcher,
        pub cluster: MockClusterNamespaces,
        pub registry: MockImageRegistry,
        pub provisioner: MockDatabaseProvisioner,
        pub mailer: MockMailer,
    }

    impl Mocks {
        pub(crate) fn into_collaborators(self) -> Collaborators {
            Collaborators {
                secrets: Arc::new(self.secrets),
                dispatcher: Arc::new(self.dispatcher),
                cluster: Arc::new(self.cluster),
                registry: Arc::new(self.registry),
                provisioner: Arc::new(self.provisioner),
                mailer: Arc::new(self.mailer),
            }
        }
    }

    pub(crate) fn orchestrator(db: &TestDb, mocks: Mocks) -> Orchestrator {
        let notifications = NotificationService::new(
            db.pool.clone(),
            ConnectionRegistry::new(NotificationsConfig::default()),
            None,
        );
        Orchestrator::new(
            db.pool.clone(),
            notifications,
            mocks.into_collaborators(),
            DOMAIN,
        )
    }

    pub(crate) async fn user(pool: &DbPool, name: &str, is_admin: bool) -> i64 {
        db::users::insert_if_absent(pool, name, &format!("{name}@example.com"), is_admin)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    /// Inserts an application directly, bypassing submission.
    pub(crate) async fn application(
        pool: &DbPool,
        owner_id: i64,
        name: &str,
        status: ApplicationStatus,
    ) -> Application {
        let name = ApplicationName::parse(name).unwrap();
        let primary_hostname = format!("{name}.{DOMAIN}");
        let application = db::applications::insert(
            pool,
            &db::NewApplication {
                name: &name,
                git_url: "https://github.com/example/app.git",
                branch: "main",
                port: 8080,
                description: "",
                owner_id,
                primary_hostname: &primary_hostname,
            },
        )
        .await
        .unwrap();
        if status == ApplicationStatus::Approved {
            assert!(
                db::applications::transition_status(
                    pool,
                    application.id,
                    ApplicationStatus::Pending,
                    ApplicationStatus::Approved,
                )
                .await
                .unwrap()
            );
        }
        db::applications::find(pool, application.id)
            .await
            .unwrap()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::*, *};
    use crate::app::db::{ApplicationStatus, test_support::TestDb};

    #[tokio::test]
    async fn owner_reads_are_scoped_to_owner() {
        let db = TestDb::new().await;
        let alice = user(&db.pool, "alice", false).await;
        let bob = user(&db.pool, "bob", false).await;
        let blog = application(&db.pool, alice, "blog", ApplicationStatus::Pending).await;
        let orchestrator = orchestrator(&db, Mocks::default());

        assert_eq!(orchestrator.list_own(alice).await.unwrap().len(), 1);
        assert!(orchestrator.list_own(bob).await.unwrap().is_empty());
        let details = orchestrator.get_own(alice, blog.id).await.unwrap();
        assert_eq!(details.application.name.as_str(), "blog");
        assert!(details.extra_hostnames.is_empty());
        assert!(matches!(
            orchestrator.get_own(bob, blog.id).await,
            Err(LifecycleError::PermissionDenied)
        ));
        assert!(matches!(
            orchestrator.get(9999).await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_user_reads_list_only_that_users_applications() {
        let db = TestDb::new().await;
        let alice = user(&db.pool, "alice", false).await;
        let bob = user(&db.pool, "bob", false).await;
        application(&db.pool, alice, "blog", ApplicationStatus::Pending).await;
        application(&db.pool, alice, "shop", ApplicationStatus::Approved).await;
        application(&db.pool, bob, "wiki", ApplicationStatus::Pending).await;
        let orchestrator = orchestrator(&db, Mocks::default());

        let details = orchestrator.get_user(alice).await.unwrap();
        assert_eq!(details.user.username, "alice");
        let mut names: Vec<_> = details
            .applications
            .iter()
            .map(|a| a.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["blog", "shop"]);

        let bobs = orchestrator.list_for_user(bob).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].name.as_str(), "wiki");
        assert!(bobs.iter().all(|a| a.owner_id == bob));
    }

    #[tokio::test]
    async fn admin_user_reads_of_unknown_user_are_not_found() {
        let db = TestDb::new().await;
        let orchestrator = orchestrator(&db, Mocks::default());

        assert!(matches!(
            orchestrator.get_user(4242).await,
            Err(LifecycleError::NotFound("user"))
        ));
        assert!(matches!(
            orchestrator.list_for_user(4242).await,
            Err(LifecycleError::NotFound("user"))
        ));
    }
}
