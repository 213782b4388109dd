use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::CurrentUser,
        handlers::is_valid_email,
        password::{hash_password, verify_password},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::{dto::PublicUser, repo::User},
};

use super::dto::UpdateProfileRequest;

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}

#[instrument(skip(state, current))]
pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, current.id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(PublicUser::from_user(user, state.storage.as_ref())))
}

#[instrument(skip(state, current, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<PublicUser>> {
    if let Some(name) = payload.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".into()));
        }
    }
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            return Err(ApiError::Validation("invalid email".into()));
        }
    }

    // Password change first, so a failed current-password check leaves the
    // record untouched.
    if let Some(new_password) = payload.new_password.as_deref() {
        if new_password.len() < 6 {
            return Err(ApiError::Validation("password too short".into()));
        }
        let current_password = payload
            .current_password
            .as_deref()
            .ok_or_else(|| ApiError::Validation("current password is required".into()))?;

        let user = User::find_by_id(&state.db, current.id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

        let ok = match user.password_hash.as_deref() {
            Some(hash) => verify_password(current_password, hash).map_err(ApiError::Internal)?,
            None => false,
        };
        if !ok {
            warn!(user_id = %current.id, "current password mismatch");
            return Err(ApiError::Validation("current password is incorrect".into()));
        }

        let new_hash = hash_password(new_password).map_err(ApiError::Internal)?;
        User::set_password(&state.db, current.id, &new_hash)
            .await
            .map_err(ApiError::Internal)?;
        info!(user_id = %current.id, "password changed");
    }

    // COALESCE update; a duplicate email trips the unique index, mapped to
    // Conflict by the error layer.
    let user = User::update_name_email(
        &state.db,
        current.id,
        payload.name.as_deref(),
        payload.email.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(PublicUser::from_user(user, state.storage.as_ref())))
}
