//! Step log of lifecycle transitions.
//!
//! Entries are written outside of the operation's transaction so failed steps stay visible.

use tracing::{error, info, warn};

use super::{LifecycleError, Stage};
use crate::app::db::{self, Application, DbPool, StepOutcome, journal::NewJournalEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operation {
    Approve,
    CancelApproval,
    Delete,
    AddExtraHostname,
    DeleteExtraHostname,
    UpdatePrimaryHostname,
    UpdateEnvironments,
}

impl Operation {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::CancelApproval => "cancel_approval",
            Self::Delete => "delete",
            Self::AddExtraHostname => "add_extra_hostname",
            Self::DeleteExtraHostname => "delete_extra_hostname",
            Self::UpdatePrimaryHostname => "update_primary_hostname",
            Self::UpdateEnvironments => "update_environments",
        }
    }
}

pub(super) struct Journal<'a> {
    pool: &'a DbPool,
    application: &'a Application,
    operation: Operation,
}

impl<'a> Journal<'a> {
    pub(super) const fn new(
        pool: &'a DbPool,
        application: &'a Application,
        operation: Operation,
    ) -> Self {
        Self {
            pool,
            application,
            operation,
        }
    }

    /// Awaits one step and records its outcome.
    ///
    /// A failure becomes [`LifecycleError::Upstream`] for `stage`.
    pub(super) async fn step<T>(
        &self,
        stage: Stage,
        step: impl Future<Output = eyre::Result<T>>,
    ) -> Result<T, LifecycleError> {
        self.conclude(stage, step.await).await
    }

    /// Records the outcome of a step that already ran.
    ///
    /// For steps running while a transaction holds the database's write lock; record only once
    /// that transaction has ended.
    pub(super) async fn conclude<T>(
        &self,
        stage: Stage,
        outcome: eyre::Result<T>,
    ) -> Result<T, LifecycleError> {
        match outcome {
            Ok(value) => {
                info!(
                    application = %self.application.name,
                    operation = self.operation.as_str(),
                    %stage,
                    "Step completed"
                );
                self.record(stage, StepOutcome::Completed, None).await;
                Ok(value)
            }
            Err(report) => {
                error!(
                    application = %self.application.name,
                    operation = self.operation.as_str(),
                    %stage,
                    "Step failed: {report:#}"
                );
                self.record(stage, StepOutcome::Failed, Some(&format!("{report:#}")))
                    .await;
                Err(LifecycleError::upstream(stage, report))
            }
        }
    }

    async fn record(&self, stage: Stage, outcome: StepOutcome, detail: Option<&str>) {
        let entry = NewJournalEntry {
            application_id: self.application.id,
            application_name: self.application.name.as_str(),
            operation: self.operation.as_str(),
            stage: stage.as_str(),
            outcome,
            detail,
        };
        if let Err(e) = db::journal::append(self.pool, &entry).await {
            warn!("Failed to write lifecycle journal: {e}");
        }
    }
}
