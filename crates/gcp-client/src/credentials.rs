//! Service account credentials
//!
//! Gardener stores the GCP service account key in the `cloudprovider`
//! secret under `serviceaccount.json`.

use crate::error::ComputeError;
use k8s_openapi::ByteString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Secret data key holding the service account JSON
pub const SERVICE_ACCOUNT_JSON_KEY: &str = "serviceaccount.json";

/// Default OAuth2 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// Decoded GCP service account key
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Parses and validates a service account JSON document.
    pub fn from_json(data: &[u8]) -> Result<Self, ComputeError> {
        let account: Self = serde_json::from_slice(data).map_err(|e| {
            ComputeError::InvalidCredentials(format!("could not decode service account JSON: {e}"))
        })?;

        if account.account_type != SERVICE_ACCOUNT_TYPE {
            return Err(ComputeError::InvalidCredentials(format!(
                "unsupported credentials type {:?}, expected {SERVICE_ACCOUNT_TYPE:?}",
                account.account_type
            )));
        }
        if account.project_id.is_empty() {
            return Err(ComputeError::InvalidCredentials(
                "service account has no project_id".to_string(),
            ));
        }
        if account.client_email.is_empty() || account.private_key.is_empty() {
            return Err(ComputeError::InvalidCredentials(
                "service account has no client_email or private_key".to_string(),
            ));
        }
        Ok(account)
    }

    /// Reads the service account from a secret's data map.
    pub fn from_secret_data(data: &BTreeMap<String, ByteString>) -> Result<Self, ComputeError> {
        let raw = data.get(SERVICE_ACCOUNT_JSON_KEY).ok_or_else(|| {
            ComputeError::InvalidCredentials(format!(
                "secret does not contain key {SERVICE_ACCOUNT_JSON_KEY:?}"
            ))
        })?;
        Self::from_json(&raw.0)
    }
}
