//! Cloud provider trait definition

use crate::error::Result;
use crate::model::{
    FloatingIp, Instance, Keypair, Network, Port, Router, SecurityGroup, SecurityGroupRule,
    Subnet,
};
use crate::rule::SecurityRule;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Compute + network control plane as the bootstrap sees it
///
/// Listing calls return everything visible to the session's credentials.
/// The provider exposes no reverse indices, so callers correlate listings by
/// foreign key themselves.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "openstack")
    fn name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    async fn list_instances(&self) -> Result<Vec<Instance>>;

    async fn list_networks(&self) -> Result<Vec<Network>>;

    async fn list_subnets(&self) -> Result<Vec<Subnet>>;

    async fn list_routers(&self) -> Result<Vec<Router>>;

    /// Ports owned by routers (`network:router_interface`)
    async fn list_router_interfaces(&self) -> Result<Vec<Port>>;

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;

    async fn list_security_group_rules(&self, group_id: &str) -> Result<Vec<SecurityGroupRule>>;

    async fn create_security_group(&self, name: &str, description: &str)
    -> Result<SecurityGroup>;

    /// Add an ingress rule. Fails with `CloudError::AlreadyExists` when the
    /// group already carries an identical rule.
    async fn create_security_group_rule(
        &self,
        group_id: &str,
        rule: &SecurityRule,
    ) -> Result<SecurityGroupRule>;

    async fn list_keypairs(&self) -> Result<Vec<Keypair>>;

    /// Create a keypair with provider-generated key material. The returned
    /// keypair carries the private key.
    async fn create_keypair(&self, name: &str) -> Result<Keypair>;

    async fn find_floating_ip(&self, address: &str) -> Result<Option<FloatingIp>>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/project information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
