//! Machine type and image selection for the bastion VM.
//!
//! Resolution is a pure function of the cloud profile. Every failure means
//! the profile (or its bastion section) references something that does not
//! exist, so all errors are configuration errors.

use crate::error::BastionError;
use crds::core::{CloudProfileSpec, MachineImage, MachineType};
use semver::Version;
use std::collections::BTreeSet;

/// Resolved machine and image for a bastion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmDetails {
    pub machine_name: String,
    pub architecture: String,
    pub image_base_name: String,
    pub image_version: String,
}

/// Picks the machine type and image version for a bastion.
///
/// Explicit choices from `spec.bastion` win; otherwise the cheapest machine
/// (fewest CPUs, first in profile order on ties) and the greatest supported
/// image version for its architecture are used.
pub fn determine_vm_details(spec: &CloudProfileSpec) -> Result<VmDetails, BastionError> {
    let architectures = candidate_architectures(spec);
    let machine = select_machine(spec, &architectures)?;
    let architecture = machine.architecture().to_string();
    let image_base_name = select_image_name(spec, &architecture)?;
    let image = find_image(spec, &image_base_name)?;
    let image_version = select_image_version(spec, image, &architecture)?;

    Ok(VmDetails {
        machine_name: machine.name.clone(),
        architecture,
        image_base_name,
        image_version,
    })
}

fn bastion_image(spec: &CloudProfileSpec) -> Option<(&str, Option<&str>)> {
    spec.bastion
        .as_ref()
        .and_then(|b| b.machine_image.as_ref())
        .map(|img| (img.name.as_str(), img.version.as_deref()))
}

/// Architectures a bastion image could be booted on.
fn candidate_architectures(spec: &CloudProfileSpec) -> BTreeSet<String> {
    let supported_archs = |image: &MachineImage| -> Vec<String> {
        image
            .versions
            .iter()
            .filter(|v| v.is_supported())
            .flat_map(|v| v.architectures.iter().cloned())
            .collect()
    };

    match bastion_image(spec) {
        None => spec.machine_images.iter().flat_map(supported_archs).collect(),
        Some((name, None)) => spec
            .machine_images
            .iter()
            .filter(|img| img.name == name)
            .flat_map(supported_archs)
            .collect(),
        Some((name, Some(version))) => spec
            .machine_images
            .iter()
            .filter(|img| img.name == name)
            .flat_map(|img| img.versions.iter())
            .filter(|v| v.version == version)
            .flat_map(|v| v.architectures.iter().cloned())
            .collect(),
    }
}

fn select_machine<'a>(
    spec: &'a CloudProfileSpec,
    architectures: &BTreeSet<String>,
) -> Result<&'a MachineType, BastionError> {
    if let Some(wanted) = spec.bastion.as_ref().and_then(|b| b.machine_type.as_ref()) {
        return spec
            .machine_types
            .iter()
            .find(|mt| mt.name == wanted.name)
            .ok_or_else(|| {
                BastionError::configuration(format!(
                    "bastion machine type {:?} not found in cloud profile",
                    wanted.name
                ))
            });
    }

    let mut best: Option<(&MachineType, i64)> = None;
    for machine in &spec.machine_types {
        if !architectures.is_empty() && !architectures.contains(machine.architecture()) {
            continue;
        }
        let cpu = machine.cpu_millis().map_err(|e| {
            BastionError::configuration(format!(
                "machine type {:?} has invalid cpu: {e}",
                machine.name
            ))
        })?;
        // Strict comparison: the first minimal machine in profile order wins
        if best.is_none_or(|(_, best_cpu)| cpu < best_cpu) {
            best = Some((machine, cpu));
        }
    }

    best.map(|(machine, _)| machine)
        .ok_or_else(|| BastionError::configuration("no suitable machine found"))
}

fn select_image_name(spec: &CloudProfileSpec, architecture: &str) -> Result<String, BastionError> {
    if let Some((name, _)) = bastion_image(spec) {
        return Ok(name.to_string());
    }

    spec.machine_images
        .iter()
        .find(|img| {
            img.versions
                .iter()
                .any(|v| v.is_supported() && v.supports_architecture(architecture))
        })
        .map(|img| img.name.clone())
        .ok_or_else(|| {
            BastionError::configuration(format!(
                "no supported machine image found for architecture {architecture:?}"
            ))
        })
}

fn find_image<'a>(spec: &'a CloudProfileSpec, name: &str) -> Result<&'a MachineImage, BastionError> {
    spec.machine_images
        .iter()
        .find(|img| img.name == name)
        .ok_or_else(|| {
            BastionError::configuration(format!("machine image {name:?} not found in cloud profile"))
        })
}

fn select_image_version(
    spec: &CloudProfileSpec,
    image: &MachineImage,
    architecture: &str,
) -> Result<String, BastionError> {
    if let Some((_, Some(version))) = bastion_image(spec) {
        return image
            .versions
            .iter()
            .find(|v| v.version == version)
            .map(|v| v.version.clone())
            .ok_or_else(|| {
                BastionError::configuration(format!(
                    "version {version:?} of machine image {:?} not found in cloud profile",
                    image.name
                ))
            });
    }

    let mut greatest: Option<(Version, &str)> = None;
    for candidate in image
        .versions
        .iter()
        .filter(|v| v.is_supported() && v.supports_architecture(architecture))
    {
        let parsed = parse_version(&candidate.version)?;
        if greatest.as_ref().is_none_or(|(current, _)| parsed > *current) {
            greatest = Some((parsed, candidate.version.as_str()));
        }
    }

    greatest
        .map(|(_, version)| version.to_string())
        .ok_or_else(|| {
            BastionError::configuration(format!(
                "no supported version of machine image {:?} found for architecture {architecture:?}",
                image.name
            ))
        })
}

/// Parses a machine image version, padding missing minor/patch components.
pub(crate) fn parse_version(raw: &str) -> Result<Version, BastionError> {
    let trimmed = raw.trim().trim_start_matches('v');
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map_err(|e| {
        BastionError::configuration(format!("invalid machine image version {raw:?}: {e}"))
    })
}
