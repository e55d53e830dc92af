//! Gardener resources for the GCP bastion controller
//!
//! Typed views of the extension resources the bastion controller reads and
//! writes, the subset of the Gardener core API it consumes (cloud profiles
//! and shoots), and the GCP provider configuration formats.
//!
//! - `bastion`: the `Bastion` extension resource (spec + status)
//! - `cluster`: the `Cluster` extension resource carrying raw shoot and cloud profile
//! - `infrastructure`: the `Infrastructure` extension resource (provider status only)
//! - `core`: cloud profile and shoot subsets
//! - `gcp`: GCP provider config / status types

pub mod bastion;
pub mod cluster;
pub mod core;
pub mod gcp;
pub mod infrastructure;

pub use bastion::*;
pub use cluster::*;
pub use infrastructure::*;

/// API group of the Gardener extension resources
pub const EXTENSIONS_GROUP: &str = "extensions.gardener.cloud";

/// Extension type handled by this provider
pub const PROVIDER_TYPE: &str = "gcp";

/// Schema for embedded raw objects (`runtime.RawExtension` in Gardener).
///
/// The content is validated by the consumer, so the CRD keeps unknown fields.
pub(crate) fn raw_extension(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true,
    })
}
