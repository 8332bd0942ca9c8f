//! User accounts and bearer sessions
//!
//! Thin persistence for the auth layer: account rows keyed by email and
//! opaque session tokens minted at login.

use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// User account row
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
    }
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

pub async fn create_user(pool: &SqlitePool, email: &str, password_hash: &str) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)",
    )
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_last_login(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mint a new session token for a user
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    Ok(token)
}

/// Resolve a bearer token to its user, if the session exists
pub async fn session_user(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.email, u.password_hash
        FROM sessions s
        INNER JOIN users u ON u.id = s.user_id
        WHERE s.token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(user_from_row))
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_tables;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_fetch_user() {
        let pool = test_pool().await;
        let id = create_user(&pool, "a@example.com", "hash").await.unwrap();

        let user = get_user_by_email(&pool, "a@example.com")
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(user.id, id);
        assert_eq!(user.password_hash, "hash");

        assert!(get_user_by_email(&pool, "b@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let pool = test_pool().await;
        create_user(&pool, "a@example.com", "hash").await.unwrap();
        assert!(create_user(&pool, "a@example.com", "hash2").await.is_err());
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let pool = test_pool().await;
        let id = create_user(&pool, "a@example.com", "hash").await.unwrap();

        let token = create_session(&pool, id).await.unwrap();
        let user = session_user(&pool, &token).await.unwrap().expect("session valid");
        assert_eq!(user.id, id);

        delete_session(&pool, &token).await.unwrap();
        assert!(session_user(&pool, &token).await.unwrap().is_none());
    }
}
