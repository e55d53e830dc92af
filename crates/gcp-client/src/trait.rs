//! ComputeClient trait for mocking
//!
//! This trait abstracts the Compute Engine client to enable mocking in unit tests.
//! The concrete ComputeClient implements this trait, and tests can use mock implementations.

use crate::credentials::ServiceAccount;
use crate::error::ComputeError;
use crate::models::*;
use std::sync::Arc;

/// Trait for Compute Engine API operations
///
/// One client is bound to one project. Methods map one-to-one to REST calls;
/// a dropped future cancels the in-flight request.
#[async_trait::async_trait]
pub trait ComputeClientTrait: Send + Sync {
    /// Project all calls are scoped to
    fn project_id(&self) -> &str;

    // Instances
    async fn get_instance(&self, zone: &str, name: &str) -> Result<Instance, ComputeError>;
    async fn insert_instance(&self, zone: &str, instance: &Instance) -> Result<Operation, ComputeError>;
    async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError>;

    // Disks
    async fn get_disk(&self, zone: &str, name: &str) -> Result<Disk, ComputeError>;
    async fn insert_disk(&self, zone: &str, disk: &Disk) -> Result<Operation, ComputeError>;
    async fn delete_disk(&self, zone: &str, name: &str) -> Result<Operation, ComputeError>;

    // Firewalls
    async fn get_firewall(&self, name: &str) -> Result<Firewall, ComputeError>;
    async fn insert_firewall(&self, firewall: &Firewall) -> Result<Operation, ComputeError>;
    async fn patch_firewall(&self, name: &str, firewall: &Firewall) -> Result<Operation, ComputeError>;
    async fn delete_firewall(&self, name: &str) -> Result<Operation, ComputeError>;

    // Regions
    async fn get_region(&self, region: &str) -> Result<Region, ComputeError>;
}

/// Builds project-bound compute clients from service account credentials.
#[async_trait::async_trait]
pub trait ComputeClientFactory: Send + Sync {
    async fn new_client(
        &self,
        service_account: &ServiceAccount,
    ) -> Result<Arc<dyn ComputeClientTrait>, ComputeError>;
}
