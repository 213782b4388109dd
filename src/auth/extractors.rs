use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{Role, User};

/// Identity resolved from the bearer token and re-checked against the store.
/// A valid token whose subject no longer exists is rejected, so a deleted
/// account cannot keep acting on a leftover token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_key: Option<String>,
}

pub fn role_permitted(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

pub fn is_self_or_admin(actor_id: Uuid, role: Role, target_id: Uuid) -> bool {
    role == Role::Admin || actor_id == target_id
}

impl CurrentUser {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if role_permitted(self.role, allowed) {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = ?self.role, "role not permitted");
            Err(ApiError::Forbidden("access denied".into()))
        }
    }

    pub fn ensure_self_or_admin(&self, target_id: Uuid) -> Result<(), ApiError> {
        if is_self_or_admin(self.id, self.role, target_id) {
            Ok(())
        } else {
            warn!(user_id = %self.id, %target_id, "self-or-admin check failed");
            Err(ApiError::Forbidden("access denied".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let keys = JwtKeys::from_ref(&state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("invalid Authorization header".into()))?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthorized("invalid or expired token".into())
        })?;

        let user = User::find_by_id(&state.db, claims.sub)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject no longer exists");
                ApiError::Unauthorized("invalid or expired token".into())
            })?;

        Ok(CurrentUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            avatar_key: user.avatar_key,
        })
    }
}

/// Extractor for admin-only routes.
pub struct RequireAdmin(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        user.require_role(&[Role::Admin])?;
        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            role,
            avatar_key: None,
        }
    }

    #[test]
    fn permit_accepts_listed_role() {
        assert!(role_permitted(Role::Admin, &[Role::Admin]));
        assert!(role_permitted(Role::User, &[Role::User, Role::Admin]));
    }

    #[test]
    fn permit_rejects_unlisted_role() {
        assert!(!role_permitted(Role::User, &[Role::Admin]));
    }

    #[test]
    fn require_role_maps_to_forbidden() {
        let user = current(Role::User);
        let err = user.require_role(&[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(current(Role::Admin).require_role(&[Role::Admin]).is_ok());
    }

    #[test]
    fn self_or_admin_matrix() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(is_self_or_admin(me, Role::User, me));
        assert!(!is_self_or_admin(me, Role::User, other));
        assert!(is_self_or_admin(me, Role::Admin, other));
    }

    #[test]
    fn ensure_self_or_admin_maps_to_forbidden() {
        let user = current(Role::User);
        let err = user.ensure_self_or_admin(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(user.ensure_self_or_admin(user.id).is_ok());
    }
}
