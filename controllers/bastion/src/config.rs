//! Controller configuration.
//!
//! Built once at startup from environment variables and handed to the
//! controller constructor.

use crate::error::ControllerError;
use gcp_client::DEFAULT_COMPUTE_ENDPOINT;
use std::net::SocketAddr;

/// Default number of bastions reconciled in parallel
pub const DEFAULT_CONCURRENCY: u16 = 5;

/// Default name of the secret holding the GCP service account
pub const DEFAULT_SECRET_NAME: &str = "cloudprovider";

/// Default address of the health/metrics server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Bastion controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Secret in the bastion's namespace carrying `serviceaccount.json`
    pub secret_name: String,
    /// Compute API base URL
    pub compute_endpoint: String,
    /// Bind address of the health/metrics server
    pub metrics_bind_address: SocketAddr,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let concurrency = match non_empty("BASTION_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<u16>().ok().filter(|c| *c > 0).ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "BASTION_CONCURRENCY must be a positive integer, got {raw:?}"
                ))
            })?,
            None => DEFAULT_CONCURRENCY,
        };

        let metrics_raw = non_empty("METRICS_BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());
        let metrics_bind_address = metrics_raw.trim().parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!(
                "METRICS_BIND_ADDRESS {metrics_raw:?} is not a socket address: {e}"
            ))
        })?;

        Ok(Self {
            namespace: non_empty("WATCH_NAMESPACE"),
            concurrency,
            secret_name: non_empty("CLOUDPROVIDER_SECRET_NAME")
                .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string()),
            compute_endpoint: non_empty("GCP_COMPUTE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_COMPUTE_ENDPOINT.to_string()),
            metrics_bind_address,
        })
    }
}
