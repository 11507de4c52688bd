use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::{lifecycle::LifecycleError, notifications::NotificationError};

/// Everything a handler can fail with, rendered as `{"error": "..."}`.
#[derive(Debug, ThisError)]
pub(crate) enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("admin privileges required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("storage error")]
    Storage(#[from] sqlx::Error),

    #[error("operation task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::Lifecycle(LifecycleError::PermissionDenied) => {
                StatusCode::FORBIDDEN
            }
            Self::NotFound(_)
            | Self::Lifecycle(LifecycleError::NotFound(_))
            | Self::Notification(NotificationError::NotFound) => StatusCode::NOT_FOUND,
            Self::Lifecycle(LifecycleError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Lifecycle(LifecycleError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Lifecycle(LifecycleError::Upstream { .. }) => StatusCode::BAD_GATEWAY,
            Self::Lifecycle(LifecycleError::Storage(_))
            | Self::Notification(NotificationError::Storage(_))
            | Self::Storage(_)
            | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", eyre::Report::new(self));
            let message = if status == StatusCode::BAD_GATEWAY {
                "a backing system failed"
            } else {
                "internal server error"
            };
            return (status, Json(json!({ "error": message }))).into_response();
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use hostplane_common::ValidationError;

    use super::*;
    use crate::lifecycle::Stage;

    #[test]
    fn lifecycle_errors_map_to_status_codes() {
        let cases = [
            (
                ApiError::from(LifecycleError::Validation(ValidationError::Port(0))),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(LifecycleError::NotFound("application")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(LifecycleError::Conflict("application is not pending")),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(LifecycleError::PermissionDenied),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(LifecycleError::upstream(
                    Stage::DeleteSecret,
                    eyre::eyre!("vault sealed"),
                )),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(NotificationError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
