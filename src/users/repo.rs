use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The role a fresh signup receives. The very first account in an empty
/// store becomes the admin; everyone after is a plain user.
pub fn bootstrap_role(existing_users: i64) -> Role {
    if existing_users == 0 {
        Role::Admin
    } else {
        Role::User
    }
}

/// User record in the database. Deliberately not `Serialize`: the wire shape
/// is `dto::PublicUser`, which never carries the password hash or the reset
/// fields.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub avatar_key: Option<String>,
    pub cover_key: Option<String>,
    pub password_reset_token_hash: Option<String>,
    pub password_reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, avatar_key, cover_key, \
     password_reset_token_hash, password_reset_expires_at, created_at, updated_at";

impl User {
    /// Find a user by email, case-insensitively.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let n: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(n.0)
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, User>(&sql).fetch_all(db).await?;
        Ok(rows)
    }

    /// Create a user. `password_hash` is None for records created by an
    /// admin without a password; those cannot log in until a reset.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> sqlx::Result<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(role)
            .fetch_one(db)
            .await
    }

    /// Partial update of name and/or email. Returns None when the user is
    /// gone; surfaces the unique-index violation on a duplicate email.
    pub async fn update_name_email(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> sqlx::Result<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET name = COALESCE($2, name), email = COALESCE($3, email), updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Open a reset window: store the token digest and its expiry.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users \
             SET password_reset_token_hash = $2, password_reset_expires_at = $3, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Consume a reset token: in one statement, match the digest, require the
    /// expiry to be in the future, install the new password hash and clear
    /// both reset fields. Returns the affected user id, or None when the
    /// token is unknown, already used, or expired (the caller must not be
    /// able to tell which).
    pub async fn consume_reset_token(
        db: &PgPool,
        token_hash: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE users \
             SET password_hash = $2, password_reset_token_hash = NULL, \
                 password_reset_expires_at = NULL, updated_at = now() \
             WHERE password_reset_token_hash = $1 \
               AND password_reset_expires_at > now() \
             RETURNING id",
        )
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn set_avatar_key(db: &PgPool, id: Uuid, key: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET avatar_key = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn set_cover_key(db: &PgPool, id: Uuid, key: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET cover_key = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_user_becomes_admin() {
        assert_eq!(bootstrap_role(0), Role::Admin);
    }

    #[test]
    fn later_users_stay_plain() {
        assert_eq!(bootstrap_role(1), Role::User);
        assert_eq!(bootstrap_role(100), Role::User);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
