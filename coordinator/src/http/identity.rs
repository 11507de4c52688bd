//! Caller identity, as asserted by the authenticating reverse proxy.
//!
//! The proxy passes the username and email in configurable headers. A username seen for the
//! first time becomes a user; whether it is an admin follows `[server.auth].admins`.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::info;

use super::error::ApiError;
use crate::app::{
    AppState,
    db::{self, User},
};

#[derive(Debug, Clone)]
pub(crate) struct CurrentUser(pub User);

/// A [`CurrentUser`] with the admin flag.
#[derive(Debug, Clone)]
pub(crate) struct AdminUser(pub User);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Looks up the user, creating it on first sight and syncing email and admin flag otherwise.
#[tracing::instrument(skip(state, email), err(Debug))]
async fn resolve(state: &AppState, username: &str, email: &str) -> Result<User, ApiError> {
    let is_admin = state
        .config
        .server
        .auth
        .admins
        .iter()
        .any(|admin| admin == username);

    if let Some(mut user) = db::users::find_by_username(&state.db_pool, username).await? {
        if (!email.is_empty() && user.email != email) || user.is_admin != is_admin {
            if !email.is_empty() {
                email.clone_into(&mut user.email);
            }
            user.is_admin = is_admin;
            db::users::update_profile(&state.db_pool, user.id, &user.email, is_admin).await?;
        }
        return Ok(user);
    }

    let Some(user) = db::users::insert_if_absent(&state.db_pool, username, email, is_admin).await?
    else {
        // A concurrent first request created the user.
        return db::users::find_by_username(&state.db_pool, username)
            .await?
            .ok_or(ApiError::Unauthorized);
    };
    info!(is_admin, "Registered new user {username}");

    state
        .notifications
        .create_admin_notification(&format!("New user registered: {username}"))
        .await?;
    Ok(user)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }

        let auth = &state.config.server.auth;
        let username = header(parts, &auth.user_header).ok_or(ApiError::Unauthorized)?;
        let email = header(parts, &auth.email_header).unwrap_or_default();
        let user = Self(resolve(state, username, email).await?);

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_admin {
            Ok(Self(user))
        } else {
            Err(ApiError::Forbidden)
        }
    }
}
