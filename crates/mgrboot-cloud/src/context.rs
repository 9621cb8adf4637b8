//! Resource context handed to downstream orchestration
//!
//! A `ResourceContext` maps logical roles (`int_network`, `router`, ...) to
//! descriptors of the provider resources filling them. Iteration and
//! serialization follow the declaration order of [`Role`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical role a resource plays in the manager's topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AgentsKeypair,
    AgentsSecurityGroup,
    IntNetwork,
    ManagementKeypair,
    ManagementSecurityGroup,
    Router,
    Subnet,
    ExtNetwork,
    FloatingIp,
}

impl Role {
    /// Roles every complete context carries
    pub const MANDATORY: [Role; 8] = [
        Role::AgentsKeypair,
        Role::AgentsSecurityGroup,
        Role::IntNetwork,
        Role::ManagementKeypair,
        Role::ManagementSecurityGroup,
        Role::Router,
        Role::Subnet,
        Role::ExtNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AgentsKeypair => "agents_keypair",
            Role::AgentsSecurityGroup => "agents_security_group",
            Role::IntNetwork => "int_network",
            Role::ManagementKeypair => "management_keypair",
            Role::ManagementSecurityGroup => "management_security_group",
            Role::Router => "router",
            Role::Subnet => "subnet",
            Role::ExtNetwork => "ext_network",
            Role::FloatingIp => "floating_ip",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Keypair,
    SecurityGroup,
    Network,
    Subnet,
    Router,
    FloatingIp,
}

/// One provider resource, by reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,

    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `false` for resources this run creates and owns; `true` for
    /// pre-existing resources that must never be destroyed on teardown
    pub external_resource: bool,

    /// Type-specific attributes (`ip` for floating IPs, `cidr` for subnets)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// A resource this run is about to create. Its ID is its name until
    /// the provider assigns one.
    pub fn owned(resource_type: ResourceType, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            resource_type,
            id: name.clone(),
            name: Some(name),
            external_resource: false,
            extra: BTreeMap::new(),
        }
    }

    /// A resource that already exists in the provider
    pub fn existing(
        resource_type: ResourceType,
        id: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            resource_type,
            id: id.into(),
            name,
            external_resource: true,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// Role → descriptor mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceContext {
    resources: BTreeMap<Role, ResourceDescriptor>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the descriptor for `role`, returning the one it replaces
    pub fn insert(
        &mut self,
        role: Role,
        descriptor: ResourceDescriptor,
    ) -> Option<ResourceDescriptor> {
        self.resources.insert(role, descriptor)
    }

    pub fn get(&self, role: Role) -> Option<&ResourceDescriptor> {
        self.resources.get(&role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.resources.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &ResourceDescriptor)> {
        self.resources.iter().map(|(role, d)| (*role, d))
    }

    /// Mandatory roles not yet filled
    pub fn missing_roles(&self) -> Vec<Role> {
        Role::MANDATORY
            .iter()
            .copied()
            .filter(|role| !self.contains(*role))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_roles().is_empty()
    }

    /// CIDR of the internal subnet, if resolved
    pub fn subnet_cidr(&self) -> Option<&str> {
        self.get(Role::Subnet).and_then(|d| d.extra("cidr"))
    }
}
