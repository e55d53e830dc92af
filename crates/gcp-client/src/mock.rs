//! Mock ComputeClient for unit testing
//!
//! This module provides a mock implementation of ComputeClientTrait that can be used
//! in unit tests without talking to the Compute Engine API.

use crate::compute_trait::{ComputeClientFactory, ComputeClientTrait};
use crate::credentials::ServiceAccount;
use crate::error::ComputeError;
use crate::models::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

type ZonalKey = (String, String);

/// Mock ComputeClient for testing
///
/// This mock stores resources in memory. Inserting an existing resource
/// fails with `AlreadyExists`, reading or deleting a missing one fails with
/// `NotFound`, mirroring the API's status codes.
#[derive(Clone)]
pub struct MockComputeClient {
    project_id: String,
    instances: Arc<Mutex<HashMap<ZonalKey, Instance>>>,
    disks: Arc<Mutex<HashMap<ZonalKey, Disk>>>,
    firewalls: Arc<Mutex<HashMap<String, Firewall>>>,
    regions: Arc<Mutex<HashMap<String, Region>>>,
    // Instance deletion is asynchronous when set: deleted instances stay
    // in STOPPING until finish_pending_deletions()
    async_deletes: Arc<Mutex<bool>>,
    pending_deletions: Arc<Mutex<HashSet<ZonalKey>>>,
    // Inserted disks stay in CREATING until finish_disk_creation() when set
    async_disks: Arc<Mutex<bool>>,
    // Inserted instances get addresses immediately when set
    assign_addresses: Arc<Mutex<bool>>,
    failures: Arc<Mutex<HashMap<String, u16>>>,
    calls: Arc<Mutex<Vec<String>>>,
    next_address: Arc<Mutex<u8>>,
}

impl MockComputeClient {
    /// Create a new mock client
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            instances: Arc::new(Mutex::new(HashMap::new())),
            disks: Arc::new(Mutex::new(HashMap::new())),
            firewalls: Arc::new(Mutex::new(HashMap::new())),
            regions: Arc::new(Mutex::new(HashMap::new())),
            async_deletes: Arc::new(Mutex::new(false)),
            pending_deletions: Arc::new(Mutex::new(HashSet::new())),
            async_disks: Arc::new(Mutex::new(false)),
            assign_addresses: Arc::new(Mutex::new(true)),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            next_address: Arc::new(Mutex::new(2)),
        }
    }

    /// Add an instance to the mock store (for test setup)
    pub fn add_instance(&self, zone: &str, instance: Instance) {
        self.instances
            .lock()
            .unwrap()
            .insert((zone.to_string(), instance.name.clone()), instance);
    }

    /// Add a disk to the mock store (for test setup)
    pub fn add_disk(&self, zone: &str, disk: Disk) {
        self.disks
            .lock()
            .unwrap()
            .insert((zone.to_string(), disk.name.clone()), disk);
    }

    /// Add a firewall rule to the mock store (for test setup)
    pub fn add_firewall(&self, firewall: Firewall) {
        self.firewalls
            .lock()
            .unwrap()
            .insert(firewall.name.clone(), firewall);
    }

    /// Add a region to the mock store (for test setup)
    pub fn add_region(&self, region: Region) {
        self.regions
            .lock()
            .unwrap()
            .insert(region.name.clone(), region);
    }

    /// Make instance deletion asynchronous
    pub fn set_async_deletes(&self, enabled: bool) {
        *self.async_deletes.lock().unwrap() = enabled;
    }

    /// Complete all instance deletions started while async deletes were on
    pub fn finish_pending_deletions(&self) {
        let pending: Vec<ZonalKey> = self.pending_deletions.lock().unwrap().drain().collect();
        let mut instances = self.instances.lock().unwrap();
        for key in pending {
            instances.remove(&key);
        }
    }

    /// Make disk creation asynchronous
    pub fn set_async_disks(&self, enabled: bool) {
        *self.async_disks.lock().unwrap() = enabled;
    }

    /// Mark every stored disk READY
    pub fn finish_disk_creation(&self) {
        for disk in self.disks.lock().unwrap().values_mut() {
            disk.status = Some("READY".to_string());
        }
    }

    /// Control whether inserted instances receive internal and NAT addresses
    pub fn set_assign_addresses(&self, enabled: bool) {
        *self.assign_addresses.lock().unwrap() = enabled;
    }

    /// Set the addresses of a stored instance (simulates late NAT IP assignment)
    pub fn set_instance_addresses(&self, zone: &str, name: &str, private_ip: &str, public_ip: &str) {
        let mut instances = self.instances.lock().unwrap();
        if let Some(instance) = instances.get_mut(&(zone.to_string(), name.to_string())) {
            instance.status = Some("RUNNING".to_string());
            Self::set_addresses(instance, private_ip, public_ip);
        }
    }

    /// Make every call to `operation` (e.g. "insert_firewall") fail with the given HTTP status
    pub fn fail_on(&self, operation: &str, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), status);
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, operation: &str) {
        self.failures.lock().unwrap().remove(operation);
    }

    /// Recorded calls, formatted as "operation resource"
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn instance(&self, zone: &str, name: &str) -> Option<Instance> {
        self.instances
            .lock()
            .unwrap()
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    pub fn disk(&self, zone: &str, name: &str) -> Option<Disk> {
        self.disks
            .lock()
            .unwrap()
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    pub fn firewall(&self, name: &str) -> Option<Firewall> {
        self.firewalls.lock().unwrap().get(name).cloned()
    }

    pub fn firewall_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.firewalls.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn set_addresses(instance: &mut Instance, private_ip: &str, public_ip: &str) {
        if instance.network_interfaces.is_empty() {
            instance.network_interfaces.push(NetworkInterface::default());
        }
        let nic = &mut instance.network_interfaces[0];
        nic.network_ip = Some(private_ip.to_string());
        if nic.access_configs.is_empty() {
            nic.access_configs.push(AccessConfig::default());
        }
        nic.access_configs[0].nat_ip = Some(public_ip.to_string());
    }

    /// Record the call and return the injected failure, if any
    fn record(&self, operation: &str, resource: &str) -> Result<(), ComputeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation} {resource}"));
        match self.failures.lock().unwrap().get(operation) {
            Some(status) => Err(Self::error_for(*status, resource)),
            None => Ok(()),
        }
    }

    fn error_for(status: u16, resource: &str) -> ComputeError {
        match status {
            404 => ComputeError::NotFound(resource.to_string()),
            409 => ComputeError::AlreadyExists(resource.to_string()),
            401 | 403 => ComputeError::Authentication(resource.to_string()),
            status => ComputeError::Api {
                status,
                message: format!("{resource}: injected failure"),
            },
        }
    }

    fn operation(&self, operation_type: &str, target: String) -> Operation {
        Operation {
            name: format!("operation-{operation_type}"),
            status: Some("DONE".to_string()),
            operation_type: Some(operation_type.to_string()),
            target_link: Some(target),
        }
    }

    fn zonal_link(&self, zone: &str, collection: &str, name: &str) -> String {
        format!(
            "projects/{}/zones/{zone}/{collection}/{name}",
            self.project_id
        )
    }

    fn firewall_link(&self, name: &str) -> String {
        format!("projects/{}/global/firewalls/{name}", self.project_id)
    }
}

#[async_trait::async_trait]
impl ComputeClientTrait for MockComputeClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn get_instance(&self, zone: &str, name: &str) -> Result<Instance, ComputeError> {
        let resource = format!("instance {zone}/{name}");
        self.record("get_instance", &resource)?;
        self.instance(zone, name)
            .ok_or(ComputeError::NotFound(resource))
    }

    async fn insert_instance(&self, zone: &str, instance: &Instance) -> Result<Operation, ComputeError> {
        let resource = format!("instance {zone}/{}", instance.name);
        self.record("insert_instance", &resource)?;

        let key = (zone.to_string(), instance.name.clone());
        let mut instances = self.instances.lock().unwrap();
        if instances.contains_key(&key) {
            return Err(ComputeError::AlreadyExists(resource));
        }

        let mut stored = instance.clone();
        stored.zone = Some(zone.to_string());
        stored.self_link = Some(self.zonal_link(zone, "instances", &instance.name));
        if *self.assign_addresses.lock().unwrap() {
            let mut next = self.next_address.lock().unwrap();
            let octet = *next;
            *next = next.wrapping_add(1);
            stored.status = Some("RUNNING".to_string());
            Self::set_addresses(
                &mut stored,
                &format!("10.250.0.{octet}"),
                &format!("34.90.0.{octet}"),
            );
        } else {
            stored.status = Some("PROVISIONING".to_string());
        }
        instances.insert(key, stored);

        Ok(self.operation("insert", self.zonal_link(zone, "instances", &instance.name)))
    }

    async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        let resource = format!("instance {zone}/{name}");
        self.record("delete_instance", &resource)?;

        let key = (zone.to_string(), name.to_string());
        let mut instances = self.instances.lock().unwrap();
        if !instances.contains_key(&key) {
            return Err(ComputeError::NotFound(resource));
        }
        if *self.async_deletes.lock().unwrap() {
            if let Some(instance) = instances.get_mut(&key) {
                instance.status = Some("STOPPING".to_string());
            }
            self.pending_deletions.lock().unwrap().insert(key);
        } else {
            instances.remove(&key);
        }

        Ok(self.operation("delete", self.zonal_link(zone, "instances", name)))
    }

    async fn get_disk(&self, zone: &str, name: &str) -> Result<Disk, ComputeError> {
        let resource = format!("disk {zone}/{name}");
        self.record("get_disk", &resource)?;
        self.disk(zone, name).ok_or(ComputeError::NotFound(resource))
    }

    async fn insert_disk(&self, zone: &str, disk: &Disk) -> Result<Operation, ComputeError> {
        let resource = format!("disk {zone}/{}", disk.name);
        self.record("insert_disk", &resource)?;

        let key = (zone.to_string(), disk.name.clone());
        let mut disks = self.disks.lock().unwrap();
        if disks.contains_key(&key) {
            return Err(ComputeError::AlreadyExists(resource));
        }
        let mut stored = disk.clone();
        stored.zone = Some(zone.to_string());
        let status = if *self.async_disks.lock().unwrap() {
            "CREATING"
        } else {
            "READY"
        };
        stored.status = Some(status.to_string());
        stored.self_link = Some(self.zonal_link(zone, "disks", &disk.name));
        disks.insert(key, stored);

        Ok(self.operation("insert", self.zonal_link(zone, "disks", &disk.name)))
    }

    async fn delete_disk(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        let resource = format!("disk {zone}/{name}");
        self.record("delete_disk", &resource)?;
        self.disks
            .lock()
            .unwrap()
            .remove(&(zone.to_string(), name.to_string()))
            .ok_or(ComputeError::NotFound(resource))?;
        Ok(self.operation("delete", self.zonal_link(zone, "disks", name)))
    }

    async fn get_firewall(&self, name: &str) -> Result<Firewall, ComputeError> {
        let resource = format!("firewall {name}");
        self.record("get_firewall", &resource)?;
        self.firewall(name).ok_or(ComputeError::NotFound(resource))
    }

    async fn insert_firewall(&self, firewall: &Firewall) -> Result<Operation, ComputeError> {
        let resource = format!("firewall {}", firewall.name);
        self.record("insert_firewall", &resource)?;

        let mut firewalls = self.firewalls.lock().unwrap();
        if firewalls.contains_key(&firewall.name) {
            return Err(ComputeError::AlreadyExists(resource));
        }
        let mut stored = firewall.clone();
        stored.self_link = Some(self.firewall_link(&firewall.name));
        firewalls.insert(firewall.name.clone(), stored);

        Ok(self.operation("insert", self.firewall_link(&firewall.name)))
    }

    async fn patch_firewall(&self, name: &str, firewall: &Firewall) -> Result<Operation, ComputeError> {
        let resource = format!("firewall {name}");
        self.record("patch_firewall", &resource)?;

        let mut firewalls = self.firewalls.lock().unwrap();
        let stored = firewalls
            .get_mut(name)
            .ok_or_else(|| ComputeError::NotFound(resource.clone()))?;
        // PATCH semantics: only fields present in the body replace stored ones
        if !firewall.source_ranges.is_empty() {
            stored.source_ranges = firewall.source_ranges.clone();
        }
        if !firewall.destination_ranges.is_empty() {
            stored.destination_ranges = firewall.destination_ranges.clone();
        }
        if !firewall.allowed.is_empty() {
            stored.allowed = firewall.allowed.clone();
        }
        if !firewall.denied.is_empty() {
            stored.denied = firewall.denied.clone();
        }
        if firewall.priority.is_some() {
            stored.priority = firewall.priority;
        }
        if firewall.description.is_some() {
            stored.description = firewall.description.clone();
        }

        Ok(self.operation("patch", self.firewall_link(name)))
    }

    async fn delete_firewall(&self, name: &str) -> Result<Operation, ComputeError> {
        let resource = format!("firewall {name}");
        self.record("delete_firewall", &resource)?;
        self.firewalls
            .lock()
            .unwrap()
            .remove(name)
            .ok_or(ComputeError::NotFound(resource))?;
        Ok(self.operation("delete", self.firewall_link(name)))
    }

    async fn get_region(&self, region: &str) -> Result<Region, ComputeError> {
        let resource = format!("region {region}");
        self.record("get_region", &resource)?;
        self.regions
            .lock()
            .unwrap()
            .get(region)
            .cloned()
            .ok_or(ComputeError::NotFound(resource))
    }
}

/// Factory handing out one shared mock client regardless of credentials
#[derive(Clone)]
pub struct MockComputeClientFactory {
    client: MockComputeClient,
}

impl MockComputeClientFactory {
    pub fn new(client: MockComputeClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ComputeClientFactory for MockComputeClientFactory {
    async fn new_client(
        &self,
        _service_account: &ServiceAccount,
    ) -> Result<Arc<dyn ComputeClientTrait>, ComputeError> {
        Ok(Arc::new(self.client.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_twice_conflicts() {
        let client = MockComputeClient::new("p");
        let fw = Firewall {
            name: "fw".to_string(),
            ..Default::default()
        };
        client.insert_firewall(&fw).await.unwrap();
        let err = client.insert_firewall(&fw).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_async_instance_deletion() {
        let client = MockComputeClient::new("p");
        client.set_async_deletes(true);
        client.add_instance(
            "z",
            Instance {
                name: "vm".to_string(),
                ..Default::default()
            },
        );

        client.delete_instance("z", "vm").await.unwrap();
        let lingering = client.get_instance("z", "vm").await.unwrap();
        assert_eq!(lingering.status.as_deref(), Some("STOPPING"));

        client.finish_pending_deletions();
        assert!(client.get_instance("z", "vm").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_async_disk_creation() {
        let client = MockComputeClient::new("p");
        client.set_async_disks(true);
        let disk = Disk {
            name: "boot".to_string(),
            ..Default::default()
        };

        client.insert_disk("z", &disk).await.unwrap();
        let creating = client.get_disk("z", "boot").await.unwrap();
        assert_eq!(creating.status.as_deref(), Some("CREATING"));

        client.finish_disk_creation();
        let ready = client.get_disk("z", "boot").await.unwrap();
        assert_eq!(ready.status.as_deref(), Some("READY"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let client = MockComputeClient::new("p");
        client.fail_on("get_region", 503);
        let err = client.get_region("europe-west1").await.unwrap_err();
        assert!(matches!(err, ComputeError::Api { status: 503, .. }));
        assert_eq!(client.calls(), vec!["get_region region europe-west1"]);
    }
}
