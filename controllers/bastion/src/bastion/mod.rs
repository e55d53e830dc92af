//! GCP bastion logic.
//!
//! - `vm_details`: machine type and image selection from the cloud profile
//! - `options`: resource names, zone, network and image resolution
//! - `firewall`: ingress CIDR normalization and firewall rule bodies
//! - `resources`: instance and disk bodies
//! - `actuator`: reconcile/delete against the compute API

pub mod actuator;
pub mod firewall;
pub mod options;
pub mod resources;
pub mod vm_details;

#[cfg(test)]
mod options_test;
#[cfg(test)]
mod vm_details_test;
