//! Topology resolution
//!
//! Walks instance → network → router → subnet → external network, plus the
//! floating IP and security group back-references. The provider offers no
//! reverse indices, so every hop is a foreign-key match over a listing.
//! Listings are fetched once, concurrently, and all of them must succeed
//! before the walk starts.

use crate::error::{BootstrapError, Hop, Result};
use crate::policy::{FirstListed, SelectionPolicy, fixed_ips_on, subnet_contains_any};
use mgrboot_cloud::{
    CloudProvider, Instance, Network, Port, ResourceContext, ResourceDescriptor, ResourceType,
    Role, Router, SecurityGroup, Subnet,
};

/// Everything the walk reads besides the instance itself
#[derive(Debug, Clone, Default)]
pub struct Listings {
    pub networks: Vec<Network>,
    pub subnets: Vec<Subnet>,
    pub routers: Vec<Router>,
    pub router_interfaces: Vec<Port>,
    pub security_groups: Vec<SecurityGroup>,
}

impl Listings {
    pub async fn fetch(provider: &dyn CloudProvider) -> Result<Self> {
        let (networks, subnets, routers, router_interfaces, security_groups) = tokio::try_join!(
            provider.list_networks(),
            provider.list_subnets(),
            provider.list_routers(),
            provider.list_router_interfaces(),
            provider.list_security_groups(),
        )
        .map_err(|e| BootstrapError::at(Hop::Listing, e.to_string()))?;

        tracing::debug!(
            "Listed {} networks, {} subnets, {} routers, {} router ports, {} security groups",
            networks.len(),
            subnets.len(),
            routers.len(),
            router_interfaces.len(),
            security_groups.len()
        );

        Ok(Self {
            networks,
            subnets,
            routers,
            router_interfaces,
            security_groups,
        })
    }

    fn networks_named<'s, 'n>(&'s self, name: &'n str) -> impl Iterator<Item = &'s Network> + use<'s, 'n> {
        self.networks.iter().filter(move |n| n.name == name)
    }

    fn subnets_of<'s>(&'s self, network: &'s Network) -> impl Iterator<Item = &'s Subnet> + 's {
        self.subnets
            .iter()
            .filter(move |s| s.network_id == network.id || network.subnets.contains(&s.id))
    }

    fn network_by_id(&self, id: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.id == id)
    }
}

pub struct TopologyResolver<'a> {
    provider: &'a dyn CloudProvider,
    policy: &'a dyn SelectionPolicy,
}

impl<'a> TopologyResolver<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self {
            provider,
            policy: &FirstListed,
        }
    }

    pub fn with_policy(mut self, policy: &'a dyn SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve the full context for `instance`
    ///
    /// The agent keypair and security group do not exist yet; they enter the
    /// context as owned placeholders named after the configuration.
    pub async fn build_context(
        &self,
        instance: &Instance,
        agents_keypair_name: &str,
        agents_secgroup_name: &str,
    ) -> Result<ResourceContext> {
        let listings = Listings::fetch(self.provider).await?;
        self.resolve(instance, agents_keypair_name, agents_secgroup_name, &listings)
            .await
    }

    /// Resolve against listings the caller already holds
    pub async fn resolve(
        &self,
        instance: &Instance,
        agents_keypair_name: &str,
        agents_secgroup_name: &str,
        listings: &Listings,
    ) -> Result<ResourceContext> {
        let mut context = ResourceContext::new();

        context.insert(
            Role::AgentsKeypair,
            ResourceDescriptor::owned(ResourceType::Keypair, agents_keypair_name),
        );
        context.insert(
            Role::AgentsSecurityGroup,
            ResourceDescriptor::owned(ResourceType::SecurityGroup, agents_secgroup_name),
        );

        if let Some(floating) = self.floating_ip(instance).await? {
            context.insert(Role::FloatingIp, floating);
        }

        let network = internal_network(instance, listings)?;
        context.insert(
            Role::IntNetwork,
            ResourceDescriptor::existing(
                ResourceType::Network,
                &network.id,
                Some(network.name.clone()),
            ),
        );

        let key_name = instance.key_name.as_deref().ok_or_else(|| {
            BootstrapError::at(
                Hop::ManagementKeypair,
                format!("instance {} was booted without a keypair", instance.id),
            )
        })?;
        context.insert(
            Role::ManagementKeypair,
            ResourceDescriptor::existing(ResourceType::Keypair, key_name, Some(key_name.to_string())),
        );

        let group = self.management_group(instance, listings)?;
        context.insert(
            Role::ManagementSecurityGroup,
            ResourceDescriptor::existing(
                ResourceType::SecurityGroup,
                &group.id,
                Some(group.name.clone()),
            ),
        );

        let router = attached_router(network, listings)?;
        context.insert(
            Role::Router,
            ResourceDescriptor::existing(ResourceType::Router, &router.id, Some(router.name.clone())),
        );

        let subnet = self.internal_subnet(instance, network, listings)?;
        context.insert(
            Role::Subnet,
            ResourceDescriptor::existing(ResourceType::Subnet, &subnet.id, Some(subnet.name.clone()))
                .with_extra("cidr", &subnet.cidr),
        );

        let external = external_network(router, listings)?;
        context.insert(
            Role::ExtNetwork,
            ResourceDescriptor::existing(
                ResourceType::Network,
                &external.id,
                Some(external.name.clone()),
            ),
        );

        debug_assert!(context.is_complete());
        tracing::info!(
            "Resolved topology: network {}, subnet {} ({}), router {}, external {}",
            network.name,
            subnet.name,
            subnet.cidr,
            router.name,
            external.name
        );
        Ok(context)
    }

    async fn floating_ip(&self, instance: &Instance) -> Result<Option<ResourceDescriptor>> {
        let Some(address) = instance.first_floating_address() else {
            tracing::debug!("Instance {} has no floating address", instance.id);
            return Ok(None);
        };

        let fip = self
            .provider
            .find_floating_ip(&address.addr)
            .await
            .map_err(|e| BootstrapError::at(Hop::FloatingIp, e.to_string()))?
            .ok_or_else(|| {
                BootstrapError::at(
                    Hop::FloatingIp,
                    format!("no floating IP object for address {}", address.addr),
                )
            })?;

        Ok(Some(
            ResourceDescriptor::existing(ResourceType::FloatingIp, fip.id, None)
                .with_extra("ip", fip.address),
        ))
    }

    fn management_group<'l>(
        &self,
        instance: &Instance,
        listings: &'l Listings,
    ) -> Result<&'l SecurityGroup> {
        let name = self.policy.management_security_group(instance).ok_or_else(|| {
            BootstrapError::at(
                Hop::ManagementSecurityGroup,
                format!("instance {} has no security groups", instance.id),
            )
        })?;

        let mut candidates = listings.security_groups.iter().filter(|g| g.name == name);
        let group = candidates.next().ok_or_else(|| {
            BootstrapError::at(
                Hop::ManagementSecurityGroup,
                format!("security group {} is not in the group listing", name),
            )
        })?;
        if candidates.next().is_some() {
            tracing::warn!(
                "Several security groups are named {}; using {}",
                name,
                group.id
            );
        }
        Ok(group)
    }

    fn internal_subnet<'l>(
        &self,
        instance: &Instance,
        network: &Network,
        listings: &'l Listings,
    ) -> Result<&'l Subnet> {
        if network.subnets.is_empty() {
            return Err(BootstrapError::at(
                Hop::Subnet,
                format!("network {} declares no subnets", network.name),
            ));
        }
        self.policy
            .internal_subnet(instance, network, &listings.subnets)
            .ok_or_else(|| {
                BootstrapError::at(
                    Hop::Subnet,
                    format!(
                        "{} policy found none of {} in the subnet listing",
                        self.policy.name(),
                        network.subnets.join(", ")
                    ),
                )
            })
    }
}

fn internal_network<'l>(instance: &Instance, listings: &'l Listings) -> Result<&'l Network> {
    let attached = instance.primary_network().ok_or_else(|| {
        BootstrapError::at(
            Hop::IntNetwork,
            format!("instance {} has no attached networks", instance.id),
        )
    })?;
    let named: Vec<&Network> = listings.networks_named(&attached.name).collect();
    match named.as_slice() {
        [] => Err(BootstrapError::at(
            Hop::IntNetwork,
            format!("network {} is not in the network listing", attached.name),
        )),
        [only] => Ok(*only),
        _ => disambiguate_network(instance, &attached.name, &named, listings),
    }
}

/// Neutron allows duplicate network names while Nova reports networks by
/// name only. Keep the one whose subnets hold the instance's fixed address.
fn disambiguate_network<'l>(
    instance: &Instance,
    name: &str,
    named: &[&'l Network],
    listings: &'l Listings,
) -> Result<&'l Network> {
    let addresses = fixed_ips_on(instance, name);
    let holding: Vec<&'l Network> = named
        .iter()
        .copied()
        .filter(|n| {
            listings
                .subnets_of(n)
                .any(|s| subnet_contains_any(s, &addresses))
        })
        .collect();
    let ids = || named.iter().map(|n| n.id.as_str()).collect::<Vec<_>>().join(", ");

    match holding.as_slice() {
        [network] => {
            tracing::warn!(
                "Several networks are named {} ({}); using {} which holds the instance's address",
                name,
                ids(),
                network.id
            );
            Ok(*network)
        }
        [] => Err(BootstrapError::at(
            Hop::IntNetwork,
            format!(
                "network name {} is ambiguous ({}) and no candidate holds the instance's address",
                name,
                ids()
            ),
        )),
        _ => Err(BootstrapError::at(
            Hop::IntNetwork,
            format!(
                "network name {} is ambiguous: {} all hold the instance's address",
                name,
                holding.iter().map(|n| n.id.as_str()).collect::<Vec<_>>().join(", ")
            ),
        )),
    }
}

fn attached_router<'l>(network: &Network, listings: &'l Listings) -> Result<&'l Router> {
    let port = listings
        .router_interfaces
        .iter()
        .find(|p| p.network_id == network.id && p.is_router_interface())
        .ok_or_else(|| {
            BootstrapError::at(
                Hop::RouterInterface,
                format!("network {} is not attached to any router", network.name),
            )
        })?;
    listings
        .routers
        .iter()
        .find(|r| r.id == port.device_id)
        .ok_or_else(|| {
            BootstrapError::at(
                Hop::Router,
                format!(
                    "router {} owning port {} is not in the router listing",
                    port.device_id, port.id
                ),
            )
        })
}

fn external_network<'l>(router: &Router, listings: &'l Listings) -> Result<&'l Network> {
    let gateway = router
        .external_gateway_network_id
        .as_deref()
        .ok_or_else(|| {
            BootstrapError::at(
                Hop::ExtNetwork,
                format!("router {} has no external gateway", router.name),
            )
        })?;
    listings.network_by_id(gateway).ok_or_else(|| {
        BootstrapError::at(
            Hop::ExtNetwork,
            format!("gateway network {} is not in the network listing", gateway),
        )
    })
}
