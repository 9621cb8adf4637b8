//! Nova and Neutron wire types
//!
//! Response bodies as the services send them, with conversions into the
//! provider-neutral model.

use mgrboot_cloud::{
    AddressKind, AttachedNetwork, FloatingIp, Instance, InstanceAddress, Keypair, MacAddress,
    Network, Port, Router, RuleSource, SecurityGroup, SecurityGroupRule, SecurityRule, Subnet,
};
use serde::{Deserialize, Serialize};

// ============ Nova ============

#[derive(Debug, Deserialize)]
pub(crate) struct ServersPage {
    pub servers: Vec<ApiServer>,
    #[serde(default)]
    pub servers_links: Vec<ApiLink>,
}

impl ServersPage {
    pub fn next_href(&self) -> Option<&str> {
        self.servers_links
            .iter()
            .find(|l| l.rel == "next")
            .map(|l| l.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLink {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiServer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<ApiNamed>,
    /// Network name → addresses. Kept as a JSON map so the provider's
    /// network order survives deserialization.
    #[serde(default)]
    pub addresses: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiNamed {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAddress {
    pub addr: String,
    #[serde(default = "default_ip_version")]
    pub version: u8,
    #[serde(rename = "OS-EXT-IPS:type", default)]
    pub ip_type: Option<String>,
    #[serde(rename = "OS-EXT-IPS-MAC:mac_addr", default)]
    pub mac_addr: Option<String>,
}

fn default_ip_version() -> u8 {
    4
}

impl TryFrom<ApiServer> for Instance {
    type Error = serde_json::Error;

    fn try_from(server: ApiServer) -> Result<Self, Self::Error> {
        let mut networks = Vec::with_capacity(server.addresses.len());
        for (name, value) in server.addresses {
            let listings: Vec<ApiAddress> = serde_json::from_value(value)?;
            let addresses = listings
                .into_iter()
                .map(|a| convert_address(&server.id, a))
                .collect();
            networks.push(AttachedNetwork { name, addresses });
        }

        // Nova repeats a group once per port
        let mut security_groups: Vec<String> = Vec::new();
        for group in server.security_groups {
            if !security_groups.contains(&group.name) {
                security_groups.push(group.name);
            }
        }

        Ok(Instance {
            id: server.id,
            name: server.name,
            key_name: server.key_name.filter(|k| !k.is_empty()),
            security_groups,
            networks,
        })
    }
}

fn convert_address(server_id: &str, address: ApiAddress) -> InstanceAddress {
    let kind = match address.ip_type.as_deref() {
        Some("floating") => AddressKind::Floating,
        _ => AddressKind::Fixed,
    };
    let mac = address.mac_addr.as_deref().and_then(|raw| {
        raw.parse::<MacAddress>()
            .inspect_err(|e| {
                tracing::warn!("Server {} reports unparsable MAC {:?}: {}", server_id, raw, e)
            })
            .ok()
    });
    InstanceAddress {
        addr: address.addr,
        version: address.version,
        kind,
        mac,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeypairList {
    pub keypairs: Vec<KeypairEnvelope>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeypairEnvelope {
    pub keypair: ApiKeypair,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiKeypair {
    pub name: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
}

impl From<ApiKeypair> for Keypair {
    fn from(k: ApiKeypair) -> Self {
        Keypair {
            name: k.name,
            fingerprint: k.fingerprint,
            private_key: k.private_key,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateKeypairRequest<'a> {
    pub keypair: NameOnly<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NameOnly<'a> {
    pub name: &'a str,
}

// ============ Neutron ============

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkList {
    pub networks: Vec<ApiNetwork>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiNetwork {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(rename = "router:external", default)]
    pub router_external: bool,
}

impl From<ApiNetwork> for Network {
    fn from(n: ApiNetwork) -> Self {
        Network {
            id: n.id,
            name: n.name,
            subnets: n.subnets,
            external: n.router_external,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubnetList {
    pub subnets: Vec<ApiSubnet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiSubnet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub cidr: String,
    pub network_id: String,
}

impl From<ApiSubnet> for Subnet {
    fn from(s: ApiSubnet) -> Self {
        Subnet {
            id: s.id,
            name: s.name,
            cidr: s.cidr,
            network_id: s.network_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouterList {
    pub routers: Vec<ApiRouter>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRouter {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_gateway_info: Option<ApiGateway>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiGateway {
    #[serde(default)]
    pub network_id: Option<String>,
}

impl From<ApiRouter> for Router {
    fn from(r: ApiRouter) -> Self {
        Router {
            id: r.id,
            name: r.name,
            external_gateway_network_id: r.external_gateway_info.and_then(|g| g.network_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortList {
    pub ports: Vec<ApiPort>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiPort {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_owner: String,
}

impl From<ApiPort> for Port {
    fn from(p: ApiPort) -> Self {
        Port {
            id: p.id,
            network_id: p.network_id,
            device_id: p.device_id,
            device_owner: p.device_owner,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FloatingIpList {
    pub floatingips: Vec<ApiFloatingIp>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiFloatingIp {
    pub id: String,
    pub floating_ip_address: String,
}

impl From<ApiFloatingIp> for FloatingIp {
    fn from(f: ApiFloatingIp) -> Self {
        FloatingIp {
            id: f.id,
            address: f.floating_ip_address,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupList {
    pub security_groups: Vec<ApiSecurityGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecurityGroupEnvelope {
    pub security_group: ApiSecurityGroup,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiSecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<ApiSecurityGroup> for SecurityGroup {
    fn from(g: ApiSecurityGroup) -> Self {
        SecurityGroup {
            id: g.id,
            name: g.name,
            description: g.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSecurityGroupRequest<'a> {
    pub security_group: NewSecurityGroup<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewSecurityGroup<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleList {
    pub security_group_rules: Vec<ApiRule>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleEnvelope {
    pub security_group_rule: ApiRule,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRule {
    pub id: String,
    pub security_group_id: String,
    pub direction: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port_range_min: Option<u16>,
    #[serde(default)]
    pub port_range_max: Option<u16>,
    #[serde(default)]
    pub remote_ip_prefix: Option<String>,
    #[serde(default)]
    pub remote_group_id: Option<String>,
}

impl From<ApiRule> for SecurityGroupRule {
    fn from(r: ApiRule) -> Self {
        SecurityGroupRule {
            id: r.id,
            security_group_id: r.security_group_id,
            direction: r.direction,
            protocol: r.protocol,
            port_range_min: r.port_range_min,
            port_range_max: r.port_range_max,
            remote_ip_prefix: r.remote_ip_prefix,
            remote_group_id: r.remote_group_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRuleRequest<'a> {
    pub security_group_rule: NewRule<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewRule<'a> {
    pub security_group_id: &'a str,
    pub direction: &'static str,
    pub ethertype: &'static str,
    pub protocol: &'a str,
    pub port_range_min: u16,
    pub port_range_max: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<&'a str>,
}

impl<'a> NewRule<'a> {
    pub fn ingress(group_id: &'a str, rule: &'a SecurityRule) -> Self {
        let (remote_ip_prefix, remote_group_id, ethertype) = match &rule.source {
            RuleSource::Cidr(cidr) => {
                let ethertype = if cidr.contains(':') { "IPv6" } else { "IPv4" };
                (Some(cidr.as_str()), None, ethertype)
            }
            RuleSource::SecurityGroup(id) => (None, Some(id.as_str()), "IPv4"),
        };
        Self {
            security_group_id: group_id,
            direction: "ingress",
            ethertype,
            protocol: &rule.protocol,
            port_range_min: rule.from_port,
            port_range_max: rule.to_port,
            remote_ip_prefix,
            remote_group_id,
        }
    }
}
