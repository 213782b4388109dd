use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::Duration as TimeDuration;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
            ResetPasswordRequest, SignupRequest,
        },
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        reset::{generate_reset_token, hash_reset_token},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{MessageResponse, PublicUser},
        repo::{bootstrap_role, User},
    },
};

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if payload.name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation("password too short".into()));
    }

    // Friendly pre-check; the lower(email) unique index is the authoritative
    // backstop when two signups race on the same address.
    if User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(ApiError::Internal)?
        .is_some()
    {
        warn!(email = %payload.email, "email already in use");
        return Err(ApiError::Conflict("email already in use".into()));
    }

    let existing = User::count(&state.db).await.map_err(ApiError::Internal)?;
    let role = bootstrap_role(existing);

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
    let user = User::create(&state.db, &payload.name, &payload.email, Some(&hash), role).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role).map_err(ApiError::Internal)?;

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from_user(user, state.storage.as_ref()),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    // One generic message for unknown email, passwordless record and wrong
    // password, so responses carry no account-existence signal.
    let invalid = || ApiError::Unauthorized("invalid email or password".into());

    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            invalid()
        })?;

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "login against passwordless record");
        return Err(invalid());
    };

    if !verify_password(&payload.password, hash).map_err(ApiError::Internal)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role).map_err(ApiError::Internal)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from_user(user, state.storage.as_ref()),
    }))
}

/// Stateless: the token stays valid until natural expiry; the client simply
/// drops its copy.
#[instrument]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "logged out".into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("invalid email".into()));
    }

    // Uniform response whether or not the email matches an account.
    let message = "if that email exists, a reset token has been issued".to_string();

    let Some(user) = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(ApiError::Internal)?
    else {
        info!("forgot-password for unknown email");
        return Ok(Json(ForgotPasswordResponse {
            message,
            reset_token: None,
        }));
    };

    let token = generate_reset_token();
    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.reset_token_ttl_minutes);
    User::set_reset_token(&state.db, user.id, &hash_reset_token(&token), expires_at)
        .await
        .map_err(ApiError::Internal)?;

    info!(user_id = %user.id, "reset token issued");
    let reset_token = state.config.expose_reset_token.then_some(token);
    Ok(Json(ForgotPasswordResponse {
        message,
        reset_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if payload.token.is_empty() {
        return Err(ApiError::Validation("token is required".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation("password too short".into()));
    }

    let new_hash = hash_password(&payload.password).map_err(ApiError::Internal)?;

    // One statement matches the digest, checks the expiry and clears both
    // reset fields together with the password update. A miss stays a single
    // generic error so the caller cannot probe which condition failed.
    let consumed =
        User::consume_reset_token(&state.db, &hash_reset_token(&payload.token), &new_hash)
            .await
            .map_err(ApiError::Internal)?;

    match consumed {
        Some(user_id) => {
            info!(user_id = %user_id, "password reset");
            Ok(Json(MessageResponse {
                message: "password reset successfully".into(),
            }))
        }
        None => {
            warn!("reset with invalid or expired token");
            Err(ApiError::Validation("invalid or expired reset token".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plausible_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn email_validation_rejects_garbage() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@nodot"));
    }
}
