//! Firewall rules of a bastion.
//!
//! Three rules are attached to the bastion instance through its network tag:
//! SSH ingress from the requested CIDRs, SSH egress to the workers, and a
//! lower priority deny of all other egress.

use crate::bastion::options::Options;
use crate::error::BastionError;
use crds::BastionSpec;
use gcp_client::{Firewall, FirewallRule};
use ipnetwork::{IpNetwork, Ipv4Network};
use std::collections::BTreeSet;

pub const SSH_PORT: &str = "22";

const DIRECTION_INGRESS: &str = "INGRESS";
const DIRECTION_EGRESS: &str = "EGRESS";
const PROTOCOL_TCP: &str = "tcp";
const PROTOCOL_ALL: &str = "all";
const ALL_IPV4: &str = "0.0.0.0/0";

const PRIORITY_ALLOW_SSH: i32 = 50;
const PRIORITY_EGRESS_WORKER: i32 = 60;
const PRIORITY_DENY_ALL: i32 = 1000;

/// Name of the SSH ingress rule
pub fn firewall_ingress_allow_ssh_resource_name(base_name: &str) -> String {
    format!("{base_name}-allow-ssh")
}

/// Name of the egress deny-all rule
pub fn firewall_egress_deny_resource_name(base_name: &str) -> String {
    format!("{base_name}-deny-all")
}

/// Name of the egress allow-to-workers rule
pub fn firewall_egress_allow_only_resource_name(base_name: &str) -> String {
    format!("{base_name}-egress-worker")
}

/// All firewall rule names of a bastion, in creation order
pub fn firewall_rule_names(base_name: &str) -> [String; 3] {
    [
        firewall_ingress_allow_ssh_resource_name(base_name),
        firewall_egress_deny_resource_name(base_name),
        firewall_egress_allow_only_resource_name(base_name),
    ]
}

/// Normalized IPv4 source ranges of the bastion's ingress policies.
///
/// Each CIDR is reduced to its network address. Input order and duplicates
/// are kept.
pub fn ingress_permissions(spec: &BastionSpec) -> Result<Vec<String>, BastionError> {
    spec.ingress
        .iter()
        .map(|policy| normalize_ipv4_cidr(&policy.ip_block.cidr))
        .collect()
}

fn normalize_ipv4_cidr(cidr: &str) -> Result<String, BastionError> {
    let cidr = cidr.trim();
    // A bare address would parse as a host network
    if !cidr.contains('/') {
        return Err(BastionError::configuration(format!(
            "invalid ingress CIDR {cidr:?}: missing prefix length"
        )));
    }

    let network: IpNetwork = cidr
        .parse()
        .map_err(|e| BastionError::configuration(format!("invalid ingress CIDR {cidr:?}: {e}")))?;

    match network {
        IpNetwork::V4(v4) => {
            let normalized = Ipv4Network::new(v4.network(), v4.prefix()).map_err(|e| {
                BastionError::configuration(format!("invalid ingress CIDR {cidr:?}: {e}"))
            })?;
            Ok(normalized.to_string())
        }
        IpNetwork::V6(_) => Err(BastionError::configuration(format!(
            "invalid ingress CIDR {cidr:?}: IPv6 not supported"
        ))),
    }
}

fn ssh_rule() -> Vec<FirewallRule> {
    vec![FirewallRule {
        ip_protocol: PROTOCOL_TCP.to_string(),
        ports: vec![SSH_PORT.to_string()],
    }]
}

/// SSH ingress from `cidrs` to the bastion
pub fn ingress_allow_ssh(opts: &Options, cidrs: &[String]) -> Firewall {
    Firewall {
        name: firewall_ingress_allow_ssh_resource_name(&opts.bastion_instance_name),
        description: Some("SSH access for Bastion".to_string()),
        network: Some(opts.network.clone()),
        priority: Some(PRIORITY_ALLOW_SSH),
        direction: Some(DIRECTION_INGRESS.to_string()),
        source_ranges: cidrs.to_vec(),
        target_tags: vec![opts.bastion_instance_name.clone()],
        allowed: ssh_rule(),
        ..Default::default()
    }
}

/// Denies all egress from the bastion not allowed by a higher priority rule
pub fn egress_deny_all(opts: &Options) -> Firewall {
    Firewall {
        name: firewall_egress_deny_resource_name(&opts.bastion_instance_name),
        description: Some("Bastion egress deny".to_string()),
        network: Some(opts.network.clone()),
        priority: Some(PRIORITY_DENY_ALL),
        direction: Some(DIRECTION_EGRESS.to_string()),
        destination_ranges: vec![ALL_IPV4.to_string()],
        target_tags: vec![opts.bastion_instance_name.clone()],
        denied: vec![FirewallRule {
            ip_protocol: PROTOCOL_ALL.to_string(),
            ports: Vec::new(),
        }],
        ..Default::default()
    }
}

/// SSH egress from the bastion to the workers network
pub fn egress_allow_only(opts: &Options) -> Firewall {
    Firewall {
        name: firewall_egress_allow_only_resource_name(&opts.bastion_instance_name),
        description: Some("Allow Bastion egress to Shoot workers".to_string()),
        network: Some(opts.network.clone()),
        priority: Some(PRIORITY_EGRESS_WORKER),
        direction: Some(DIRECTION_EGRESS.to_string()),
        destination_ranges: vec![opts.workers_cidr.clone()],
        target_tags: vec![opts.bastion_instance_name.clone()],
        allowed: ssh_rule(),
        ..Default::default()
    }
}

/// Patch body for a rule whose ranges drifted from `desired`, `None` if in sync.
///
/// Ranges are compared as sets; the API may reorder or deduplicate them.
pub fn ranges_patch(current: &Firewall, desired: &Firewall) -> Option<Firewall> {
    if same_ranges(&current.source_ranges, &desired.source_ranges)
        && same_ranges(&current.destination_ranges, &desired.destination_ranges)
    {
        return None;
    }
    Some(Firewall {
        name: desired.name.clone(),
        source_ranges: desired.source_ranges.clone(),
        destination_ranges: desired.destination_ranges.clone(),
        ..Default::default()
    })
}

fn same_ranges(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}
