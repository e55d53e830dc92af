//! GCP Compute Engine REST API Client
//!
//! A Rust client library for the subset of the Compute Engine API a bastion
//! host needs: instances, disks, firewall rules and regions.
//!
//! # Example
//!
//! ```no_run
//! use gcp_client::{ComputeClient, ComputeClientTrait, ServiceAccount, DEFAULT_COMPUTE_ENDPOINT};
//!
//! # async fn example(json: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let account = ServiceAccount::from_json(json)?;
//! let client = ComputeClient::new(DEFAULT_COMPUTE_ENDPOINT, account)?;
//!
//! let region = client.get_region("europe-west1").await?;
//! let firewall = client.get_firewall("my-bastion-allow-ssh").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Service account auth**: JWT bearer grant with token caching
//! - **Typed errors**: not-found and conflict are distinguishable for idempotent calls
//! - **Mocking**: `MockComputeClient` behind the `test-util` feature

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod compute_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{ComputeClient, DEFAULT_COMPUTE_ENDPOINT, DefaultComputeClientFactory};
pub use compute_trait::{ComputeClientFactory, ComputeClientTrait};
pub use credentials::ServiceAccount;
pub use error::ComputeError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockComputeClient, MockComputeClientFactory};
