//! Provider token lifecycle.
//!
//! Access-token expiry is stored as an absolute epoch-seconds value. A token
//! counts as expired slightly before its deadline so a request issued now
//! cannot outlive it.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SpotifyConfig;
use crate::database::accounts::AccountsRepository;
use crate::error::{CoreError, Result};
use crate::model::Account;

#[derive(Clone, Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    /// The provider may rotate the refresh token; absent means keep the old one.
    refresh_token: Option<String>,
    scope: Option<String>,
}

pub struct TokenClient {
    http: reqwest::Client,
    config: SpotifyConfig,
}

impl TokenClient {
    pub fn new(config: SpotifyConfig) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(CoreError::Config(
                "provider client id/secret must be set".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    /// Return a live access token for the account, refreshing and persisting
    /// new token material when the stored one is (nearly) expired.
    pub async fn get_valid_access_token(
        &self,
        accounts: &AccountsRepository,
        account: &Account,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        if !account.token_expired(now, self.config.token_safety_margin_secs) {
            return Ok(account.access_token.clone());
        }

        debug!(account_id = %account.id, "access token expired, refreshing");
        let refreshed = self.refresh(&account.refresh_token).await?;

        let expires_at = Utc::now().timestamp() + refreshed.expires_in;
        let refresh_token = refreshed
            .refresh_token
            .clone()
            .unwrap_or_else(|| account.refresh_token.clone());
        accounts
            .update_tokens(
                account.id,
                &refreshed.access_token,
                &refresh_token,
                expires_at,
                refreshed.scope.as_deref(),
            )
            .await?;

        info!(account_id = %account.id, "refreshed provider access token");
        Ok(refreshed.access_token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let basic = BASE64_STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));

        let response = self
            .http
            .post(&self.config.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::TokenRefresh(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response.json::<TokenResponse>().await.map_err(CoreError::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_fail_construction() {
        let result = TokenClient::new(SpotifyConfig::default());
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn token_response_tolerates_absent_rotation() {
        let body = r#"{"access_token": "new-at", "expires_in": 3600}"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token, "new-at");
        assert!(parsed.refresh_token.is_none());
    }
}
