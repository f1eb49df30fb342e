use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub picture: String,
    /// NULL for users created through OAuth sign-in.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, picture, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Exact-match lookup; login resolves users by the name they registered.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, picture, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a locally registered user with a hashed password.
    pub async fn create_local(
        db: &PgPool,
        username: &str,
        email: &str,
        picture: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, picture, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, picture, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(picture)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Create a user from an OAuth profile; no password is stored.
    pub async fn create_oauth(
        db: &PgPool,
        username: &str,
        email: &str,
        picture: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, picture)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, picture, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(picture)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
