//! Disambiguation policies for the topology walk
//!
//! Nova reports an instance's security groups and Neutron a network's
//! subnets as plain lists. Which entry the manager should use is a policy
//! decision, not something the provider records.

use ipnetwork::IpNetwork;
use mgrboot_cloud::{Instance, Network, Subnet};
use std::net::IpAddr;

pub trait SelectionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Name of the instance's management-facing security group
    fn management_security_group<'a>(&self, instance: &'a Instance) -> Option<&'a str>;

    /// Subnet of `network` the manager and its agents live on. `subnets` is
    /// the full subnet listing.
    fn internal_subnet<'a>(
        &self,
        instance: &Instance,
        network: &Network,
        subnets: &'a [Subnet],
    ) -> Option<&'a Subnet>;
}

/// First listed security group, first declared subnet
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstListed;

impl SelectionPolicy for FirstListed {
    fn name(&self) -> &'static str {
        "first"
    }

    fn management_security_group<'a>(&self, instance: &'a Instance) -> Option<&'a str> {
        instance.security_groups.first().map(String::as_str)
    }

    fn internal_subnet<'a>(
        &self,
        _instance: &Instance,
        network: &Network,
        subnets: &'a [Subnet],
    ) -> Option<&'a Subnet> {
        let first = network.subnets.first()?;
        subnets.iter().find(|s| &s.id == first)
    }
}

/// Picks the subnet whose CIDR contains one of the instance's fixed
/// addresses on the network. Falls back to [`FirstListed`] when none does.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressContainment;

impl SelectionPolicy for AddressContainment {
    fn name(&self) -> &'static str {
        "containment"
    }

    fn management_security_group<'a>(&self, instance: &'a Instance) -> Option<&'a str> {
        FirstListed.management_security_group(instance)
    }

    fn internal_subnet<'a>(
        &self,
        instance: &Instance,
        network: &Network,
        subnets: &'a [Subnet],
    ) -> Option<&'a Subnet> {
        let addresses = fixed_ips_on(instance, &network.name);

        let containing = network
            .subnets
            .iter()
            .filter_map(|id| subnets.iter().find(|s| &s.id == id))
            .find(|subnet| subnet_contains_any(subnet, &addresses));

        match containing {
            Some(subnet) => Some(subnet),
            None => {
                tracing::debug!(
                    "No subnet of {} contains the instance's addresses, using the first one",
                    network.name
                );
                FirstListed.internal_subnet(instance, network, subnets)
            }
        }
    }
}

/// Parsed fixed addresses `instance` holds on the network named `network_name`
pub(crate) fn fixed_ips_on(instance: &Instance, network_name: &str) -> Vec<IpAddr> {
    instance
        .fixed_addresses_on(network_name)
        .filter_map(|a| a.addr.parse().ok())
        .collect()
}

pub(crate) fn subnet_contains_any(subnet: &Subnet, addresses: &[IpAddr]) -> bool {
    match subnet.cidr.parse::<IpNetwork>() {
        Ok(cidr) => addresses.iter().any(|addr| cidr.contains(*addr)),
        Err(e) => {
            tracing::warn!("Subnet {} has unparsable CIDR {:?}: {}", subnet.id, subnet.cidr, e);
            false
        }
    }
}
