//! Security provisioning
//!
//! Creates or reuses the agent keypair and agent security group, then makes
//! both security groups carry the ingress rules manager and agents need.
//!
//! Rules are synchronized in two layers. First the group's current rules are
//! listed and diffed against the required set, so only missing rules are
//! created. A create that still races with another writer and comes back as
//! [`CloudError::AlreadyExists`] counts as present. Any other error aborts.

use crate::error::{BootstrapError, Result};
use mgrboot_cloud::{
    CloudError, CloudProvider, ResourceContext, Role, RulePlan, SecurityGroup, SecurityRule,
};

/// Manager → agent ports: SSH and WinRM
pub const MANAGER_TO_AGENT_PORTS: [u16; 2] = [22, 5985];

pub const AGENT_GROUP_DESCRIPTION: &str = "Security group for agent VMs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeypairOutcome {
    /// Created by this run. The provider hands out the private key only once.
    Created { private_key: String },
    /// Already present; no key material available
    Reused,
}

impl KeypairOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, KeypairOutcome::Created { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleCounts {
    pub created: usize,
    pub existing: usize,
}

/// Outcome of the security group half of provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub agents_security_group_id: String,
    pub agents_security_group_created: bool,
    pub agent_rules: RuleCounts,
    pub management_rules: RuleCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub keypair: KeypairOutcome,
    pub groups: GroupReport,
}

pub struct SecurityProvisioner<'a> {
    provider: &'a dyn CloudProvider,
}

impl<'a> SecurityProvisioner<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self { provider }
    }

    pub async fn provision(
        &self,
        context: &ResourceContext,
        subnet_cidr: &str,
        agent_to_manager_ports: &[u16],
    ) -> Result<ProvisionReport> {
        let keypair = self
            .ensure_keypair(placeholder_name(context, Role::AgentsKeypair)?)
            .await?;
        let groups = self
            .secure_groups(context, subnet_cidr, agent_to_manager_ports)
            .await?;
        Ok(ProvisionReport { keypair, groups })
    }

    /// Ensure the agent group exists and both groups carry their rules
    pub async fn secure_groups(
        &self,
        context: &ResourceContext,
        subnet_cidr: &str,
        agent_to_manager_ports: &[u16],
    ) -> Result<GroupReport> {
        let group_name = placeholder_name(context, Role::AgentsSecurityGroup)?;
        let management_group_id = context
            .get(Role::ManagementSecurityGroup)
            .map(|d| d.id.as_str())
            .ok_or_else(|| missing_role(Role::ManagementSecurityGroup))?;

        let (group, group_created) = self.ensure_security_group(group_name).await?;

        let agent_rules = self
            .sync_rules(
                &group.id,
                SecurityRule::tcp_from_cidr(&MANAGER_TO_AGENT_PORTS, subnet_cidr),
            )
            .await?;
        let management_rules = self
            .sync_rules(
                management_group_id,
                SecurityRule::tcp_from_cidr(agent_to_manager_ports, subnet_cidr),
            )
            .await?;

        Ok(GroupReport {
            agents_security_group_id: group.id,
            agents_security_group_created: group_created,
            agent_rules,
            management_rules,
        })
    }

    /// Reuse keypair `name` or create it. Only a created keypair comes with
    /// its private key.
    pub async fn ensure_keypair(&self, name: &str) -> Result<KeypairOutcome> {
        let existing = self.provider.list_keypairs().await.map_err(provisioning)?;
        if existing.iter().any(|k| k.name == name) {
            tracing::info!("Keypair {} already exists, reusing it", name);
            return Ok(KeypairOutcome::Reused);
        }

        let created = match self.provider.create_keypair(name).await {
            Ok(keypair) => keypair,
            Err(e) if e.is_already_exists() => {
                tracing::info!("Keypair {} appeared concurrently, reusing it", name);
                return Ok(KeypairOutcome::Reused);
            }
            Err(e) => return Err(provisioning(e)),
        };
        let private_key = created.private_key.ok_or_else(|| {
            BootstrapError::Provisioning(format!(
                "provider created keypair {} without returning its private key",
                name
            ))
        })?;
        Ok(KeypairOutcome::Created { private_key })
    }

    async fn ensure_security_group(&self, name: &str) -> Result<(SecurityGroup, bool)> {
        let groups = self
            .provider
            .list_security_groups()
            .await
            .map_err(provisioning)?;
        let mut named = groups.into_iter().filter(|g| g.name == name);
        if let Some(group) = named.next() {
            let others: Vec<String> = named.map(|g| g.id).collect();
            if others.is_empty() {
                tracing::info!("Security group {} already exists ({})", name, group.id);
            } else {
                tracing::warn!(
                    "Several security groups are named {} ({}, {}); using {}",
                    name,
                    group.id,
                    others.join(", "),
                    group.id
                );
            }
            return Ok((group, false));
        }

        let group = self
            .provider
            .create_security_group(name, AGENT_GROUP_DESCRIPTION)
            .await
            .map_err(provisioning)?;
        Ok((group, true))
    }

    /// Make `group_id` carry every rule in `required`
    pub async fn sync_rules(
        &self,
        group_id: &str,
        required: Vec<SecurityRule>,
    ) -> Result<RuleCounts> {
        let existing = self
            .provider
            .list_security_group_rules(group_id)
            .await
            .map_err(provisioning)?;
        let plan = RulePlan::diff(group_id, required, &existing);
        tracing::debug!("Rules for {}: {}", group_id, plan.summary());

        let mut counts = RuleCounts {
            created: 0,
            existing: plan.summary().no_change,
        };
        for rule in plan.to_create() {
            match self.provider.create_security_group_rule(group_id, rule).await {
                Ok(_) => {
                    tracing::info!("Added {} to {}", rule, group_id);
                    counts.created += 1;
                }
                Err(e) if e.is_already_exists() => {
                    tracing::info!("{} already present in {}: {}", rule, group_id, e);
                    counts.existing += 1;
                }
                Err(e) => return Err(provisioning(e)),
            }
        }
        Ok(counts)
    }
}

fn placeholder_name(context: &ResourceContext, role: Role) -> Result<&str> {
    context
        .get(role)
        .and_then(|d| d.name.as_deref())
        .ok_or_else(|| missing_role(role))
}

fn missing_role(role: Role) -> BootstrapError {
    BootstrapError::Provisioning(format!("resource context has no {}", role))
}

fn provisioning(err: CloudError) -> BootstrapError {
    BootstrapError::Provisioning(err.to_string())
}
