//! Bastion actuator.
//!
//! Drives the cloud side of a bastion through the compute client:
//! firewall rules, boot disk and instance on reconcile; the same resources
//! in reverse dependency order on delete. Slow cloud operations are reported
//! as `BastionError::RequeueAfter` rather than waited for.

use crate::bastion::firewall::{
    egress_allow_only, egress_deny_all, firewall_rule_names, ingress_allow_ssh, ranges_patch,
};
use crate::bastion::options::Options;
use crate::bastion::resources::{disk_spec, instance_spec};
use crate::error::BastionError;
use crds::BastionIngress;
use gcp_client::{ComputeClientTrait, Firewall, Instance, zone_name_from_url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry delay while the instance waits for its addresses
pub const ENDPOINTS_REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Retry delay while the instance is being deleted
pub const DELETION_REQUEUE_DELAY: Duration = Duration::from_secs(30);

/// Instance status while a stop or delete is in flight
const STATUS_STOPPING: &str = "STOPPING";

/// Disk status once it can be attached
const STATUS_READY: &str = "READY";

/// Addresses of a running bastion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionEndpoints {
    pub private: BastionIngress,
    pub public: BastionIngress,
}

/// Pins the options to a zone, asking the region for one when none is known.
pub async fn ensure_zone(
    client: &dyn ComputeClientTrait,
    opts: &Options,
) -> Result<Options, BastionError> {
    if !opts.zone.is_empty() {
        return Ok(opts.clone());
    }

    let region = client
        .get_region(&opts.region)
        .await
        .map_err(|e| BastionError::compute("get", format!("region {}", opts.region), e))?;
    let zone = region
        .zones
        .first()
        .map(|url| zone_name_from_url(url).to_string())
        .filter(|z| !z.is_empty())
        .ok_or_else(|| {
            BastionError::configuration(format!("region {} has no zones", opts.region))
        })?;

    debug!("Resolved zone {} for region {}", zone, opts.region);
    Ok(opts.with_zone(zone))
}

/// Creates or updates the bastion and returns its endpoints.
///
/// `opts.zone` must be set (see [`ensure_zone`]).
pub async fn reconcile(
    client: &dyn ComputeClientTrait,
    opts: &Options,
    ingress_cidrs: &[String],
    user_data: &str,
    shoot_name: &str,
) -> Result<BastionEndpoints, BastionError> {
    require_zone(opts)?;

    for rule in [
        ingress_allow_ssh(opts, ingress_cidrs),
        egress_deny_all(opts),
        egress_allow_only(opts),
    ] {
        ensure_firewall_rule(client, &rule).await?;
    }

    ensure_disk(client, opts).await?;
    let instance = ensure_instance(client, opts, user_data, shoot_name).await?;

    let Some(endpoints) = endpoints(&instance) else {
        return Err(BastionError::requeue_after(
            format!(
                "bastion instance {} endpoints not ready yet (status {})",
                opts.bastion_instance_name,
                instance.status.as_deref().unwrap_or("UNKNOWN")
            ),
            ENDPOINTS_REQUEUE_DELAY,
        ));
    };

    info!(
        "Bastion instance {} is ready (public {:?}, private {:?})",
        opts.bastion_instance_name, endpoints.public.ip, endpoints.private.ip
    );
    Ok(endpoints)
}

/// Removes the bastion's instance, disk and firewall rules.
///
/// Returns `RequeueAfter` while the instance is still being deleted; the
/// disk and firewall rules are only touched once it is gone. A stopped
/// (`TERMINATED`) instance is deleted like a running one.
pub async fn delete(client: &dyn ComputeClientTrait, opts: &Options) -> Result<(), BastionError> {
    require_zone(opts)?;
    let zone = opts.zone.as_str();
    let name = opts.bastion_instance_name.as_str();

    if let Some(instance) = get_instance(client, zone, name).await? {
        if instance.status.as_deref() != Some(STATUS_STOPPING) {
            info!("Deleting bastion instance {}/{}", zone, name);
            match client.delete_instance(zone, name).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(BastionError::compute("delete", format!("instance {zone}/{name}"), e));
                }
            }
        }

        if get_instance(client, zone, name).await?.is_some() {
            return Err(BastionError::requeue_after(
                format!("bastion instance {name} is still being deleted"),
                DELETION_REQUEUE_DELAY,
            ));
        }
    }

    match client.delete_disk(zone, &opts.disk_name).await {
        Ok(_) => info!("Deleted bastion disk {}/{}", zone, opts.disk_name),
        Err(e) if e.is_not_found() => debug!("Bastion disk {}/{} already gone", zone, opts.disk_name),
        Err(e) => {
            return Err(BastionError::compute(
                "delete",
                format!("disk {zone}/{}", opts.disk_name),
                e,
            ));
        }
    }

    for rule in firewall_rule_names(name) {
        match client.delete_firewall(&rule).await {
            Ok(_) => info!("Deleted firewall rule {}", rule),
            Err(e) if e.is_not_found() => debug!("Firewall rule {} already gone", rule),
            Err(e) => return Err(BastionError::compute("delete", format!("firewall {rule}"), e)),
        }
    }

    Ok(())
}

/// Private and public endpoints of the instance, `None` until both have an address.
pub fn endpoints(instance: &Instance) -> Option<BastionEndpoints> {
    let nic = instance.network_interfaces.first()?;
    let private = BastionIngress::from_parts(nic.network_ip.as_deref(), None)?;
    let public = BastionIngress::from_parts(
        nic.access_configs.first().and_then(|ac| ac.nat_ip.as_deref()),
        None,
    )?;
    (private.is_ready() && public.is_ready()).then_some(BastionEndpoints { private, public })
}

fn require_zone(opts: &Options) -> Result<(), BastionError> {
    if opts.zone.is_empty() {
        return Err(BastionError::configuration(format!(
            "no zone resolved for bastion {}",
            opts.bastion_instance_name
        )));
    }
    Ok(())
}

async fn get_instance(
    client: &dyn ComputeClientTrait,
    zone: &str,
    name: &str,
) -> Result<Option<Instance>, BastionError> {
    match client.get_instance(zone, name).await {
        Ok(instance) => Ok(Some(instance)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(BastionError::compute("get", format!("instance {zone}/{name}"), e)),
    }
}

async fn ensure_firewall_rule(
    client: &dyn ComputeClientTrait,
    desired: &Firewall,
) -> Result<(), BastionError> {
    let resource = format!("firewall {}", desired.name);
    match client.get_firewall(&desired.name).await {
        Ok(current) => {
            if let Some(patch) = ranges_patch(&current, desired) {
                warn!(
                    "Firewall rule {} ranges drifted, patching (source {:?}, destination {:?})",
                    desired.name, patch.source_ranges, patch.destination_ranges
                );
                client
                    .patch_firewall(&desired.name, &patch)
                    .await
                    .map_err(|e| BastionError::compute("patch", resource, e))?;
            }
            Ok(())
        }
        Err(e) if e.is_not_found() => match client.insert_firewall(desired).await {
            Ok(_) => {
                info!("Created firewall rule {}", desired.name);
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!("Firewall rule {} created concurrently", desired.name);
                Ok(())
            }
            Err(e) => Err(BastionError::compute("insert", resource, e)),
        },
        Err(e) => Err(BastionError::compute("get", resource, e)),
    }
}

/// Ensures the boot disk exists and is `READY` before the instance references it.
async fn ensure_disk(client: &dyn ComputeClientTrait, opts: &Options) -> Result<(), BastionError> {
    let zone = opts.zone.as_str();
    let resource = format!("disk {zone}/{}", opts.disk_name);
    let disk = match client.get_disk(zone, &opts.disk_name).await {
        Ok(disk) => disk,
        Err(e) if e.is_not_found() => {
            match client.insert_disk(zone, &disk_spec(opts)).await {
                Ok(_) => info!("Created bastion disk {}", resource),
                Err(e) if e.is_already_exists() => {}
                Err(e) => return Err(BastionError::compute("insert", resource, e)),
            }
            match client.get_disk(zone, &opts.disk_name).await {
                Ok(disk) => disk,
                Err(e) if e.is_not_found() => {
                    return Err(BastionError::requeue_after(
                        format!("bastion disk {} is being created", opts.disk_name),
                        ENDPOINTS_REQUEUE_DELAY,
                    ));
                }
                Err(e) => return Err(BastionError::compute("get", resource, e)),
            }
        }
        Err(e) => return Err(BastionError::compute("get", resource, e)),
    };

    match disk.status.as_deref() {
        Some(status) if status != STATUS_READY => Err(BastionError::requeue_after(
            format!("bastion disk {} is not ready yet (status {status})", opts.disk_name),
            ENDPOINTS_REQUEUE_DELAY,
        )),
        _ => Ok(()),
    }
}

async fn ensure_instance(
    client: &dyn ComputeClientTrait,
    opts: &Options,
    user_data: &str,
    shoot_name: &str,
) -> Result<Instance, BastionError> {
    let zone = opts.zone.as_str();
    let name = opts.bastion_instance_name.as_str();

    if let Some(instance) = get_instance(client, zone, name).await? {
        return Ok(instance);
    }

    let spec = instance_spec(opts, user_data, shoot_name);
    match client.insert_instance(zone, &spec).await {
        Ok(_) => info!("Created bastion instance {}/{}", zone, name),
        Err(e) if e.is_already_exists() => {}
        Err(e) => return Err(BastionError::compute("insert", format!("instance {zone}/{name}"), e)),
    }

    get_instance(client, zone, name).await?.ok_or_else(|| {
        BastionError::requeue_after(
            format!("bastion instance {name} is being created"),
            ENDPOINTS_REQUEUE_DELAY,
        )
    })
}
