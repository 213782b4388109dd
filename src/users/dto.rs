use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::StorageClient;
use crate::users::repo::{Role, User};

/// Public part of a user returned to clients. Never carries the password
/// hash or the reset fields.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PublicUser {
    pub fn from_user(user: User, storage: &dyn StorageClient) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_key.as_deref().map(|k| storage.object_url(k)),
            cover_url: user.cover_key.as_deref().map(|k| storage.object_url(k)),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Admin-created users have no password; they get one via the reset flow.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use time::OffsetDateTime;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            password_hash: Some("$argon2id$not-a-real-hash".into()),
            role: Role::User,
            avatar_key: Some("avatars/x/y.png".into()),
            cover_key: None,
            password_reset_token_hash: Some("deadbeef".into()),
            password_reset_expires_at: Some(OffsetDateTime::now_utc()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn public_user_never_leaks_secrets() {
        let state = AppState::fake();
        let public = PublicUser::from_user(sample_user(), state.storage.as_ref());
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(!json.contains("deadbeef"));
        assert!(json.contains("a@x.com"));
    }

    #[tokio::test]
    async fn image_keys_become_urls() {
        let state = AppState::fake();
        let public = PublicUser::from_user(sample_user(), state.storage.as_ref());
        assert_eq!(
            public.avatar_url.as_deref(),
            Some("https://fake.local/avatars/x/y.png")
        );
        assert!(public.cover_url.is_none());
    }
}
