//! Shared fixtures for database-backed tests.
#![allow(dead_code)]

use chrono::Utc;
use sqlx::PgPool;

use waxwing_core::config::QueueConfig;
use waxwing_core::database::Database;
use waxwing_core::model::Account;
use waxwing_core::types::UserId;

pub fn database(pool: PgPool) -> Database {
    Database::from_pool(pool, QueueConfig::default())
}

pub async fn seed_user(db: &Database, email: &str) -> anyhow::Result<UserId> {
    let user = db.accounts().upsert_user(email, None).await?;
    Ok(user.id)
}

pub async fn seed_account(db: &Database, email: &str) -> anyhow::Result<Account> {
    let user_id = seed_user(db, email).await?;
    let account = db
        .accounts()
        .upsert(
            user_id,
            "spotify",
            &format!("spotify-{email}"),
            "access-token",
            "refresh-token",
            Utc::now().timestamp() + 3_600,
            Some("user-read-recently-played"),
        )
        .await?;
    Ok(account)
}
