//! OAuth2 access tokens for service accounts
//!
//! Implements the JWT bearer grant: a self-signed RS256 assertion is
//! exchanged at the account's token endpoint for a short-lived access token.

use crate::credentials::ServiceAccount;
use crate::error::ComputeError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tracing::debug;

/// OAuth2 scope for Compute Engine
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// Access token source for one service account.
///
/// Tokens are reused until shortly before they expire.
pub struct ServiceAccountTokenSource {
    http: Client,
    account: ServiceAccount,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    /// Create a token source, failing early if the private key is not a valid RSA PEM.
    pub fn new(http: Client, account: ServiceAccount) -> Result<Self, ComputeError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
            ComputeError::InvalidCredentials(format!("invalid service account private key: {e}"))
        })?;
        Ok(Self {
            http,
            account,
            key,
            cached: Mutex::new(None),
        })
    }

    /// Returns a valid access token, fetching a new one if needed.
    pub async fn token(&self) -> Result<String, ComputeError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        let fresh = self.fetch().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, ComputeError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: COMPUTE_SCOPE,
            aud: &self.account.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ComputeError::Authentication(format!("failed to sign JWT assertion: {e}")))
    }

    async fn fetch(&self) -> Result<CachedToken, ComputeError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        debug!(
            "Requesting access token for {} from {}",
            self.account.client_email, self.account.token_uri
        );

        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComputeError::Authentication(format!(
                "token exchange failed: {status} - {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_validity_includes_skew() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + Duration::seconds(EXPIRY_SKEW_SECS + 10),
        };
        assert!(token.is_valid_at(now));
        assert!(!token.is_valid_at(now + Duration::seconds(20)));
    }

    #[test]
    fn test_rejects_invalid_private_key() {
        let account = ServiceAccount::from_json(
            br#"{"type": "service_account", "project_id": "p", "client_email": "a@p", "private_key": "not a pem"}"#,
        )
        .unwrap();
        let err = ServiceAccountTokenSource::new(Client::new(), account).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidCredentials(_)));
    }
}
