//! Bootstrap error types

use mgrboot_cloud::{CloudError, MacAddress};
use std::fmt;
use thiserror::Error;

/// Step of the topology walk that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hop {
    /// One of the batched provider listings
    Listing,
    FloatingIp,
    IntNetwork,
    ManagementKeypair,
    ManagementSecurityGroup,
    /// Port linking the internal network to a router
    RouterInterface,
    Router,
    Subnet,
    ExtNetwork,
}

impl Hop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hop::Listing => "listing",
            Hop::FloatingIp => "floating_ip",
            Hop::IntNetwork => "int_network",
            Hop::ManagementKeypair => "management_keypair",
            Hop::ManagementSecurityGroup => "management_security_group",
            Hop::RouterInterface => "router_interface",
            Hop::Router => "router",
            Hop::Subnet => "subnet",
            Hop::ExtNetwork => "ext_network",
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("No usable network interface: {0}")]
    NoUsableInterface(String),

    #[error("No instance has an interface with MAC {mac}")]
    NotFound { mac: MacAddress },

    #[error("Topology resolution failed at {hop}: {reason}")]
    TopologyResolution { hop: Hop, reason: String },

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Failed to publish resource context: {0}")]
    Publish(String),

    #[error("Cloud provider error: {0}")]
    Cloud(#[from] CloudError),
}

impl BootstrapError {
    pub(crate) fn at(hop: Hop, reason: impl Into<String>) -> Self {
        BootstrapError::TopologyResolution {
            hop,
            reason: reason.into(),
        }
    }

    /// The failing hop, for topology errors
    pub fn hop(&self) -> Option<Hop> {
        match self {
            BootstrapError::TopologyResolution { hop, .. } => Some(*hop),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
