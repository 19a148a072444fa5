use sqlx::PgPool;

use crate::error::Result;
use crate::model::{Account, User, UserRole};
use crate::types::{AccountId, UserId};

#[derive(Clone, Debug)]
pub struct AccountsRepository {
    pool: PgPool,
}

impl AccountsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All accounts for a provider, in stable order. Both loops iterate this
    /// set sequentially each cycle.
    pub async fn list_by_provider(&self, provider: &str) -> Result<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, provider, external_id, access_token, refresh_token,
                   token_expires_at, scope, created_at, updated_at
            FROM accounts
            WHERE provider = $1
            ORDER BY created_at
            "#,
        )
        .bind(provider)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    pub async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, provider, external_id, access_token, refresh_token,
                   token_expires_at, scope, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn get_for_user(&self, user_id: UserId, provider: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, provider, external_id, access_token, refresh_token,
                   token_expires_at, scope, created_at, updated_at
            FROM accounts
            WHERE user_id = $1 AND provider = $2
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn update_tokens(
        &self,
        id: AccountId,
        access_token: &str,
        refresh_token: &str,
        expires_at_epoch: i64,
        scope: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = $2,
                refresh_token = $3,
                token_expires_at = $4,
                scope = COALESCE($5, scope),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at_epoch)
        .bind(scope)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Link a provider account to a user, updating token material when the
    /// provider-side account is already known.
    pub async fn upsert(
        &self,
        user_id: UserId,
        provider: &str,
        external_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at_epoch: i64,
        scope: Option<&str>,
    ) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts
                (user_id, provider, external_id, access_token, refresh_token,
                 token_expires_at, scope)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, provider) DO UPDATE
                SET access_token = EXCLUDED.access_token,
                    refresh_token = EXCLUDED.refresh_token,
                    token_expires_at = EXCLUDED.token_expires_at,
                    scope = EXCLUDED.scope,
                    updated_at = now()
            RETURNING id, user_id, provider, external_id, access_token, refresh_token,
                      token_expires_at, scope, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(external_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at_epoch)
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    /// Create a user on first authentication, or return the existing row.
    pub async fn upsert_user(&self, email: &str, username: Option<&str>) -> Result<User> {
        let row: (UserId, String, Option<String>, String, chrono::DateTime<chrono::Utc>) =
            sqlx::query_as(
                r#"
                INSERT INTO users (email, username)
                VALUES ($1, $2)
                ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
                RETURNING id, email, username, role, created_at
                "#,
            )
            .bind(email)
            .bind(username)
            .fetch_one(&self.pool)
            .await?;

        Ok(User {
            id: row.0,
            email: row.1,
            username: row.2,
            role: UserRole::from_db(&row.3),
            created_at: row.4,
        })
    }
}
