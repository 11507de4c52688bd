//! Runtime environment of approved applications, kept in the secret store under the name.

use hostplane_common::validate_environment_key;
use serde::{Deserialize, Serialize};

use super::{
    LifecycleError, Orchestrator, Stage,
    hostnames::require_approved,
    journal::{Journal, Operation},
};
use crate::integrations::SecretMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EnvironmentEntry {
    pub key: String,
    pub value: String,
}

impl Orchestrator {
    /// Returns the environment of an approved application of `user_id`, ordered by key.
    #[tracing::instrument(skip(self), err(Debug))]
    pub(crate) async fn get_environments(
        &self,
        user_id: i64,
        application_id: i64,
    ) -> Result<Vec<EnvironmentEntry>, LifecycleError> {
        let application = self.load_owned(user_id, application_id).await?;
        require_approved(&application)?;
        let stored = self
            .collaborators
            .secrets
            .get(application.name.as_str())
            .await
            .map_err(|e| LifecycleError::upstream(Stage::ReadEnvironment, e))?;
        Ok(stored
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| EnvironmentEntry { key, value })
            .collect())
    }

    /// Replaces the whole environment of an approved application of `user_id`.
    ///
    /// Later duplicates of a key win.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Validation`] if a key is not a valid environment variable name.
    #[tracing::instrument(skip(self, entries), err(Debug))]
    pub(crate) async fn update_environments(
        &self,
        user_id: i64,
        application_id: i64,
        entries: Vec<EnvironmentEntry>,
    ) -> Result<(), LifecycleError> {
        for entry in &entries {
            validate_environment_key(&entry.key)?;
        }
        let _claim = self.claim(application_id)?;
        let application = self.load_owned(user_id, application_id).await?;
        require_approved(&application)?;

        let values: SecretMap = entries
            .into_iter()
            .map(|EnvironmentEntry { key, value }| (key, value))
            .collect();
        Journal::new(&self.pool, &application, Operation::UpdateEnvironments)
            .step(
                Stage::WriteEnvironment,
                self.collaborators
                    .secrets
                    .put(application.name.as_str(), &values),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use hostplane_common::ValidationError;

    use super::*;
    use crate::{
        app::db::{ApplicationStatus, test_support::TestDb},
        lifecycle::test_support::{Mocks, application, orchestrator, user},
    };

    fn entry(key: &str, value: &str) -> EnvironmentEntry {
        EnvironmentEntry {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }

    #[tokio::test]
    async fn reads_stored_map_and_treats_missing_as_empty() {
        let db = TestDb::new().await;
        let alice = user(&db.pool, "alice", false).await;
        let blog = application(&db.pool, alice, "blog", ApplicationStatus::Approved).await;
        let shop = application(&db.pool, alice, "shop", ApplicationStatus::Approved).await;
        let mut mocks = Mocks::default();
        mocks
            .secrets
            .expect_get()
            .withf(|path| path == "blog")
            .returning(|_| {
                Ok(Some(SecretMap::from([
                    ("PORT".to_owned(), "8080".to_owned()),
                    ("API_KEY".to_owned(), "k".to_owned()),
                ])))
            });
        mocks
            .secrets
            .expect_get()
            .withf(|path| path == "shop")
            .returning(|_| Ok(None));
        let orchestrator = orchestrator(&db, mocks);

        assert_eq!(
            orchestrator.get_environments(alice, blog.id).await.unwrap(),
            vec![entry("API_KEY", "k"), entry("PORT", "8080")]
        );
        assert!(orchestrator.get_environments(alice, shop.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_writes_the_whole_map() {
        let db = TestDb::new().await;
        let alice = user(&db.pool, "alice", false).await;
        let blog = application(&db.pool, alice, "blog", ApplicationStatus::Approved).await;
        let mut mocks = Mocks::default();
        mocks
            .secrets
            .expect_put()
            .withf(|path, values| {
                path == "blog"
                    && values.len() == 2
                    && values.get("DEBUG").map(String::as_str) == Some("1")
            })
            .once()
            .returning(|_, _| Ok(()));
        let orchestrator = orchestrator(&db, mocks);

        orchestrator
            .update_environments(
                alice,
                blog.id,
                vec![entry("PORT", "8080"), entry("DEBUG", "0"), entry("DEBUG", "1")],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_bad_keys_foreign_and_pending_applications() {
        let db = TestDb::new().await;
        let alice = user(&db.pool, "alice", false).await;
        let bob = user(&db.pool, "bob", false).await;
        let blog = application(&db.pool, alice, "blog", ApplicationStatus::Approved).await;
        let draft = application(&db.pool, alice, "draft", ApplicationStatus::Pending).await;
        let orchestrator = orchestrator(&db, Mocks::default());

        assert!(matches!(
            orchestrator
                .update_environments(alice, blog.id, vec![entry("1BAD", "x")])
                .await,
            Err(LifecycleError::Validation(ValidationError::EnvironmentKey(_)))
        ));
        assert!(matches!(
            orchestrator.get_environments(bob, blog.id).await,
            Err(LifecycleError::PermissionDenied)
        ));
        assert!(matches!(
            orchestrator.get_environments(alice, draft.id).await,
            Err(LifecycleError::Conflict(_))
        ));
    }
}
