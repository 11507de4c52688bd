//! Admin routes: approvals, hostname changes and oversight of every application.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use super::{api::HostnameBody, error::ApiError, identity::AdminUser, run_to_completion};
use crate::app::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications))
        .route(
            "/applications/{id}",
            get(get_application).delete(delete_application),
        )
        .route("/applications/{id}/approve", post(approve))
        .route("/applications/{id}/cancel-approval", post(cancel_approval))
        .route(
            "/applications/{id}/primary-hostname",
            put(update_primary_hostname),
        )
        .route("/applications/{id}/journal", get(journal))
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/applications", get(list_user_applications))
}

async fn list_applications(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.list_all().await?))
}

async fn get_application(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.get(id).await?))
}

async fn delete_application(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    tracing::info!(admin = %admin.username, "Admin deletes application {id}");
    let lifecycle = state.lifecycle;
    run_to_completion(async move { lifecycle.delete_application_as_admin(id).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Responds with the approved application and its database; the password only goes to the
/// owner by email.
async fn approve(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(admin = %admin.username, "Approving application {id}");
    let lifecycle = state.lifecycle;
    let approval = run_to_completion(async move { lifecycle.approve(id).await }).await?;
    let database = &approval.credentials;
    Ok(Json(json!({
        "application": approval.application,
        "database": {
            "host": database.host,
            "port": database.port,
            "name": database.database,
            "user": database.username,
        },
    })))
}

async fn cancel_approval(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(admin = %admin.username, "Cancelling approval of application {id}");
    let lifecycle = state.lifecycle;
    Ok(Json(
        run_to_completion(async move { lifecycle.cancel_approval(id).await }).await?,
    ))
}

async fn update_primary_hostname(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<HostnameBody>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle;
    Ok(Json(
        run_to_completion(async move {
            lifecycle.update_primary_hostname(id, &body.hostname).await
        })
        .await?,
    ))
}

async fn journal(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.journal(id).await?))
}

async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.list_users().await?))
}

async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.get_user(id).await?))
}

async fn list_user_applications(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.lifecycle.list_for_user(id).await?))
}
