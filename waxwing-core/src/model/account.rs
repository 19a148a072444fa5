use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AccountId, UserId};

/// A user's link to one streaming provider, including the token material
/// needed to poll on their behalf. Exactly one row per (user, provider).
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub provider: String,
    pub external_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    /// Absolute expiry in epoch seconds.
    pub token_expires_at: i64,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A token is treated as expired slightly before its real deadline so a
    /// request issued now cannot race the expiry mid-flight.
    pub fn token_expired(&self, now_epoch: i64, safety_margin_secs: i64) -> bool {
        self.token_expires_at < now_epoch + safety_margin_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(expires_at: i64) -> Account {
        Account {
            id: AccountId::new(),
            user_id: UserId::new(),
            provider: "spotify".into(),
            external_id: "spotify-user-1".into(),
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_expires_at: expires_at,
            scope: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn expiry_applies_safety_margin() {
        let now = 1_700_000_000;
        assert!(account(now + 30).token_expired(now, 60));
        assert!(!account(now + 90).token_expired(now, 60));
        assert!(account(now - 1).token_expired(now, 60));
    }
}
