use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::{CurrentUser, RequireAdmin},
        handlers::is_valid_email,
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{CreateUserRequest, MessageResponse, PublicUser, UpdateUserRequest},
        repo::{Role, User},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = User::list(&state.db).await.map_err(ApiError::Internal)?;
    let out = users
        .into_iter()
        .map(|u| PublicUser::from_user(u, state.storage.as_ref()))
        .collect();
    Ok(Json(out))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(PublicUser::from_user(user, state.storage.as_ref())))
}

/// Admin-created records carry no password; the account owner gets one
/// through the reset flow.
#[instrument(skip(state, admin, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(mut payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("invalid email".into()));
    }

    let user = User::create(&state.db, &payload.name, &payload.email, None, Role::User).await?;

    info!(admin_id = %admin.0.id, user_id = %user.id, "user created by admin");
    Ok((
        StatusCode::CREATED,
        Json(PublicUser::from_user(user, state.storage.as_ref())),
    ))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateUserRequest>,
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

    let user = User::update_name_email(&state.db, id, payload.name.as_deref(), payload.email.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    info!(admin_id = %admin.0.id, user_id = %user.id, "user updated by admin");
    Ok(Json(PublicUser::from_user(user, state.storage.as_ref())))
}

/// Owners may delete themselves; admins may delete anyone.
#[instrument(skip(state, current))]
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    current.ensure_self_or_admin(id)?;

    if !User::delete(&state.db, id).await.map_err(ApiError::Internal)? {
        warn!(%id, "delete of missing user");
        return Err(ApiError::NotFound("user not found".into()));
    }

    info!(actor_id = %current.id, user_id = %id, "user deleted");
    Ok(Json(MessageResponse {
        message: "user deleted".into(),
    }))
}
