//! Self-host lookup by MAC address

use crate::error::{BootstrapError, Result};
use mgrboot_cloud::{CloudProvider, Instance, MacAddress};

/// The instance whose interfaces include `mac`
///
/// Listing failures surface as [`BootstrapError::Cloud`]. No match is
/// [`BootstrapError::NotFound`]; there is no other identity source to fall
/// back on.
pub async fn find_instance_by_mac(
    provider: &dyn CloudProvider,
    mac: &MacAddress,
) -> Result<Instance> {
    let instances = provider.list_instances().await?;
    tracing::debug!(
        "Looking for MAC {} among {} instances",
        mac,
        instances.len()
    );
    select_by_mac(instances, mac)
}

/// First instance in listing order carrying `mac`. Several matches mean a
/// broken fixture or a provider bug, so every candidate is logged.
pub fn select_by_mac(instances: Vec<Instance>, mac: &MacAddress) -> Result<Instance> {
    let mut matching = instances.into_iter().filter(|i| i.has_mac(mac));
    let found = matching
        .next()
        .ok_or(BootstrapError::NotFound { mac: *mac })?;

    let others: Vec<String> = matching.map(|i| i.id).collect();
    if !others.is_empty() {
        tracing::warn!(
            "MAC {} is attached to {} instances ({}, {}); using {}",
            mac,
            others.len() + 1,
            found.id,
            others.join(", "),
            found.id
        );
    }

    tracing::info!("Located self as {} ({})", found.name, found.id);
    Ok(found)
}
