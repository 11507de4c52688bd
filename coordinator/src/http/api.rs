//! Routes of the signed-in user: own applications, notifications and push subscriptions.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;

use super::{error::ApiError, identity::CurrentUser, run_to_completion};
use crate::{
    app::{AppState, db::NewSubscription},
    lifecycle::{ApplicationSubmission, EnvironmentEntry},
};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications).post(submit_application))
        .route(
            "/applications/{id}",
            get(get_application).delete(delete_application),
        )
        .route("/applications/{id}/extra-hostnames", post(add_extra_hostname))
        .route(
            "/applications/{id}/extra-hostnames/{hostname}",
            delete(delete_extra_hostname),
        )
        .route(
            "/applications/{id}/environments",
            get(get_environments).put(update_environments),
        )
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/read", delete(delete_read))
        .route("/notifications/{id}", delete(delete_notification))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/subscriptions", post(subscribe))
        .route("/push/public-key", get(push_public_key))
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostnameBody {
    pub hostname: String,
}

async fn list_applications(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.list_own(user.id).await?))
}

async fn submit_application(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(submission): Json<ApplicationSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let application = state.lifecycle.submit(user.id, &submission).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn get_application(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.get_own(user.id, id).await?))
}

async fn delete_application(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let lifecycle = state.lifecycle;
    run_to_completion(async move { lifecycle.delete_application(user.id, id).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_extra_hostname(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<HostnameBody>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle;
    let extra = run_to_completion(async move {
        lifecycle
            .add_extra_hostname(user.id, id, &body.hostname)
            .await
    })
    .await?;
    Ok((StatusCode::CREATED, Json(extra)))
}

async fn delete_extra_hostname(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path((id, hostname)): Path<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    let lifecycle = state.lifecycle;
    run_to_completion(async move {
        lifecycle
            .delete_extra_hostname(user.id, id, &hostname)
            .await
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_environments(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.get_environments(user.id, id).await?))
}

async fn update_environments(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(entries): Json<Vec<EnvironmentEntry>>,
) -> Result<StatusCode, ApiError> {
    let lifecycle = state.lifecycle;
    run_to_completion(async move {
        lifecycle
            .update_environments(user.id, id, entries)
            .await
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_notifications(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.notifications.list(user.id).await?))
}

async fn mark_read(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.notifications.mark_read(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.notifications.mark_all_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_notification(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.notifications.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_read(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.notifications.delete_read(user.id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn subscribe(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(subscription): Json<NewSubscription>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = state.notifications.subscribe(user.id, &subscription).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// VAPID public key browsers need to subscribe.
async fn push_public_key(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let push = state
        .config
        .push
        .as_ref()
        .ok_or(ApiError::NotFound("push configuration"))?;
    Ok(Json(json!({ "public_key": push.public_key })))
}
