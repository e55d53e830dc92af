//! Compute Engine API client
//!
//! Implements the `compute/v1` REST calls used by the bastion controller.
//! Based on the API structure: /projects/{project}/zones/{zone}/instances/{name}
//! and /projects/{project}/global/firewalls/{name}

use crate::auth::ServiceAccountTokenSource;
use crate::compute_trait::{ComputeClientFactory, ComputeClientTrait};
use crate::credentials::ServiceAccount;
use crate::error::ComputeError;
use crate::models::*;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default Compute Engine API base URL
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Compute Engine API client bound to one project
#[derive(Debug)]
pub struct ComputeClient {
    client: Client,
    base_url: String,
    project_id: String,
    tokens: ServiceAccountTokenSource,
}

impl ComputeClient {
    /// Create a new compute client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://compute.googleapis.com/compute/v1")
    /// * `service_account` - Credentials; its `project_id` scopes every call
    pub fn new(base_url: &str, service_account: ServiceAccount) -> Result<Self, ComputeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let project_id = service_account.project_id.clone();
        let tokens = ServiceAccountTokenSource::new(client.clone(), service_account)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            tokens,
        })
    }

    fn project_url(&self, path: &str) -> String {
        format!("{}/projects/{}/{}", self.base_url, self.project_id, path)
    }

    fn zonal_url(&self, zone: &str, collection: &str, name: Option<&str>) -> String {
        match name {
            Some(name) => self.project_url(&format!("zones/{zone}/{collection}/{name}")),
            None => self.project_url(&format!("zones/{zone}/{collection}")),
        }
    }

    fn firewall_url(&self, name: Option<&str>) -> String {
        match name {
            Some(name) => self.project_url(&format!("global/firewalls/{name}")),
            None => self.project_url("global/firewalls"),
        }
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response, ComputeError> {
        debug!("{} {}", method, url);
        let token = self.tokens.token().await?;
        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, resource: &str) -> Result<T, ComputeError> {
        let response = self.request::<()>(Method::GET, url, None).await?;
        decode_response(response, resource).await
    }

    async fn mutate<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        resource: &str,
    ) -> Result<Operation, ComputeError> {
        let response = self.request(method, url, body).await?;
        decode_response(response, resource).await
    }
}

/// Maps the HTTP status of a response onto `ComputeError`, decoding the body on success.
async fn decode_response<T: DeserializeOwned>(
    response: Response,
    resource: &str,
) -> Result<T, ComputeError> {
    let status = response.status();
    if status.is_success() {
        let text = response.text().await?;
        return Ok(serde_json::from_str(&text)?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    Err(match status.as_u16() {
        404 => ComputeError::NotFound(format!("{resource}: {message}")),
        409 => ComputeError::AlreadyExists(format!("{resource}: {message}")),
        401 | 403 => ComputeError::Authentication(format!("{resource}: {message}")),
        code => ComputeError::Api {
            status: code,
            message: format!("{resource}: {message}"),
        },
    })
}

#[async_trait::async_trait]
impl ComputeClientTrait for ComputeClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn get_instance(&self, zone: &str, name: &str) -> Result<Instance, ComputeError> {
        let url = self.zonal_url(zone, "instances", Some(name));
        self.get(&url, &format!("instance {zone}/{name}")).await
    }

    async fn insert_instance(&self, zone: &str, instance: &Instance) -> Result<Operation, ComputeError> {
        let url = self.zonal_url(zone, "instances", None);
        let resource = format!("instance {zone}/{}", instance.name);
        self.mutate(Method::POST, &url, Some(instance), &resource).await
    }

    async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        let url = self.zonal_url(zone, "instances", Some(name));
        self.mutate::<()>(Method::DELETE, &url, None, &format!("instance {zone}/{name}"))
            .await
    }

    async fn get_disk(&self, zone: &str, name: &str) -> Result<Disk, ComputeError> {
        let url = self.zonal_url(zone, "disks", Some(name));
        self.get(&url, &format!("disk {zone}/{name}")).await
    }

    async fn insert_disk(&self, zone: &str, disk: &Disk) -> Result<Operation, ComputeError> {
        let url = self.zonal_url(zone, "disks", None);
        let resource = format!("disk {zone}/{}", disk.name);
        self.mutate(Method::POST, &url, Some(disk), &resource).await
    }

    async fn delete_disk(&self, zone: &str, name: &str) -> Result<Operation, ComputeError> {
        let url = self.zonal_url(zone, "disks", Some(name));
        self.mutate::<()>(Method::DELETE, &url, None, &format!("disk {zone}/{name}"))
            .await
    }

    async fn get_firewall(&self, name: &str) -> Result<Firewall, ComputeError> {
        let url = self.firewall_url(Some(name));
        self.get(&url, &format!("firewall {name}")).await
    }

    async fn insert_firewall(&self, firewall: &Firewall) -> Result<Operation, ComputeError> {
        let url = self.firewall_url(None);
        let resource = format!("firewall {}", firewall.name);
        self.mutate(Method::POST, &url, Some(firewall), &resource).await
    }

    async fn patch_firewall(&self, name: &str, firewall: &Firewall) -> Result<Operation, ComputeError> {
        let url = self.firewall_url(Some(name));
        self.mutate(Method::PATCH, &url, Some(firewall), &format!("firewall {name}"))
            .await
    }

    async fn delete_firewall(&self, name: &str) -> Result<Operation, ComputeError> {
        let url = self.firewall_url(Some(name));
        self.mutate::<()>(Method::DELETE, &url, None, &format!("firewall {name}"))
            .await
    }

    async fn get_region(&self, region: &str) -> Result<Region, ComputeError> {
        let url = self.project_url(&format!("regions/{region}"));
        self.get(&url, &format!("region {region}")).await
    }
}

/// Factory producing `ComputeClient`s against a fixed API endpoint
#[derive(Debug, Clone)]
pub struct DefaultComputeClientFactory {
    base_url: String,
}

impl DefaultComputeClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for DefaultComputeClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_COMPUTE_ENDPOINT)
    }
}

#[async_trait::async_trait]
impl ComputeClientFactory for DefaultComputeClientFactory {
    async fn new_client(
        &self,
        service_account: &ServiceAccount,
    ) -> Result<Arc<dyn ComputeClientTrait>, ComputeError> {
        let client = ComputeClient::new(&self.base_url, service_account.clone())?;
        Ok(Arc::new(client))
    }
}
