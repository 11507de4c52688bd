//! Errors of lifecycle operations.

use core::{error, fmt};

use hostplane_common::ValidationError;
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error as ThisError;

/// External (or otherwise failure-prone) step of a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Stage {
    LoadOwner,
    InitSecret,
    DispatchWriteValues,
    ProvisionDatabase,
    SendApprovalEmail,
    DeleteNamespace,
    DeleteRepository,
    DeleteSecret,
    DropDatabase,
    DispatchRemovePipeline,
    DispatchAddExtraHostname,
    DispatchDeleteExtraHostname,
    DispatchUpdatePrimaryHostname,
    ReadEnvironment,
    WriteEnvironment,
}

impl Stage {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::LoadOwner => "load_owner",
            Self::InitSecret => "init_secret",
            Self::DispatchWriteValues => "dispatch_write_values",
            Self::ProvisionDatabase => "provision_database",
            Self::SendApprovalEmail => "send_approval_email",
            Self::DeleteNamespace => "delete_namespace",
            Self::DeleteRepository => "delete_repository",
            Self::DeleteSecret => "delete_secret",
            Self::DropDatabase => "drop_database",
            Self::DispatchRemovePipeline => "dispatch_remove_pipeline",
            Self::DispatchAddExtraHostname => "dispatch_add_extra_hostname",
            Self::DispatchDeleteExtraHostname => "dispatch_delete_extra_hostname",
            Self::DispatchUpdatePrimaryHostname => "dispatch_update_primary_hostname",
            Self::ReadEnvironment => "read_environment",
            Self::WriteEnvironment => "write_environment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, ThisError)]
pub(crate) enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("permission denied")]
    PermissionDenied,

    /// An external system failed. Steps completed before `stage` are not undone.
    #[error("{stage} failed")]
    Upstream {
        stage: Stage,
        #[source]
        source: Box<dyn error::Error + Send + Sync>,
    },

    #[error("storage error")]
    Storage(#[source] sqlx::Error),
}

impl LifecycleError {
    pub(crate) fn upstream(stage: Stage, report: eyre::Report) -> Self {
        Self::Upstream {
            stage,
            source: report.into(),
        }
    }
}

impl From<sqlx::Error> for LifecycleError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound("record");
        }

        match error.as_database_error().map(|e| e.kind()) {
            Some(ErrorKind::UniqueViolation) => Self::Conflict("already exists"),
            Some(ErrorKind::ForeignKeyViolation) => Self::NotFound("referenced record"),
            Some(_) | None => Self::Storage(error),
        }
    }
}
