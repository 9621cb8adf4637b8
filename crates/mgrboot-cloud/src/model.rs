//! Provider object model
//!
//! Provider-neutral views of the compute and network objects the bootstrap
//! walks. Provider crates convert their wire formats into these types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Device owner Neutron assigns to a router's internal interface port
pub const ROUTER_INTERFACE_OWNER: &str = "network:router_interface";

/// An EUI-48 link-layer address
///
/// Equality is on the octets, so `FA:16:3E:00:00:01` and `fa:16:3e:00:00:01`
/// compare equal. Always displayed lowercase and colon-separated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MacAddress(macaddr::MacAddr6);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out.copy_from_slice(self.0.as_bytes());
        out
    }
}

impl FromStr for MacAddress {
    type Err = macaddr::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MacAddress)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.octets();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A compute instance as listed by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,

    /// Keypair the instance was booted with
    pub key_name: Option<String>,

    /// Security group names, in the order the provider reports them
    pub security_groups: Vec<String>,

    /// Attached networks, in the order the provider reports them
    pub networks: Vec<AttachedNetwork>,
}

impl Instance {
    /// All addresses across every attached network
    pub fn addresses(&self) -> impl Iterator<Item = &InstanceAddress> {
        self.networks.iter().flat_map(|n| n.addresses.iter())
    }

    /// Whether any interface of this instance carries `mac`
    pub fn has_mac(&self, mac: &MacAddress) -> bool {
        self.addresses().any(|a| a.mac.as_ref() == Some(mac))
    }

    pub fn first_floating_address(&self) -> Option<&InstanceAddress> {
        self.addresses().find(|a| a.kind == AddressKind::Floating)
    }

    pub fn primary_network(&self) -> Option<&AttachedNetwork> {
        self.networks.first()
    }

    /// Fixed addresses the instance holds on the named network
    pub fn fixed_addresses_on<'a>(
        &'a self,
        network_name: &'a str,
    ) -> impl Iterator<Item = &'a InstanceAddress> + 'a {
        self.networks
            .iter()
            .filter(move |n| n.name == network_name)
            .flat_map(|n| n.addresses.iter())
            .filter(|a| a.kind == AddressKind::Fixed)
    }
}

/// A network as seen from the instance: its name plus the addresses bound on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedNetwork {
    pub name: String,
    pub addresses: Vec<InstanceAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceAddress {
    pub addr: String,
    pub version: u8,
    pub kind: AddressKind,
    pub mac: Option<MacAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Fixed,
    Floating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,

    /// Subnet IDs in declaration order
    pub subnets: Vec<String>,

    /// Whether this is a provider (external) network
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub cidr: String,
    pub network_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Router {
    pub id: String,
    pub name: String,

    /// Network ID of the router's external gateway, if one is set
    pub external_gateway_network_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub network_id: String,
    pub device_id: String,
    pub device_owner: String,
}

impl Port {
    pub fn is_router_interface(&self) -> bool {
        self.device_owner == ROUTER_INTERFACE_OWNER
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A rule as it exists in the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub id: String,
    pub security_group_id: String,
    pub direction: String,
    pub protocol: Option<String>,
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
    pub remote_ip_prefix: Option<String>,
    pub remote_group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypair {
    pub name: String,
    pub fingerprint: Option<String>,

    /// Only present in the response to a create call where the provider
    /// generated the key
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
}
