pub mod check;
pub mod discover;
pub mod inspect;
pub mod run;

use anyhow::Context;
use mgrboot_cloud_openstack::{Credentials, OpenStackProvider};
use mgrboot_config::{BootstrapConfig, SubnetSelection};
use mgrboot_core::{AddressContainment, AgentSettings, FirstListed, SelectionPolicy};
use std::time::Duration;

pub fn credentials(config: &BootstrapConfig) -> Credentials {
    let os = &config.openstack;
    Credentials {
        auth_url: os.auth_url.clone(),
        username: os.username.clone(),
        password: os.password.clone(),
        project_name: os.project_name.clone(),
        user_domain_name: os.user_domain_name.clone(),
        project_domain_name: os.project_domain_name.clone(),
        region: os.region.clone(),
    }
}

pub fn agent_settings(config: &BootstrapConfig) -> AgentSettings {
    let agents = &config.agents;
    AgentSettings {
        keypair_name: agents.keypair_name.clone(),
        security_group_name: agents.security_group_name.clone(),
        user: agents.user.clone(),
        to_manager_ports: agents.to_manager_inbound_ports.as_slice().to_vec(),
    }
}

pub fn policy(selection: SubnetSelection) -> &'static dyn SelectionPolicy {
    match selection {
        SubnetSelection::First => &FirstListed,
        SubnetSelection::Containment => &AddressContainment,
    }
}

pub async fn connect(config: &BootstrapConfig) -> anyhow::Result<OpenStackProvider> {
    let credentials = credentials(config);
    tracing::debug!("Authenticating: {:?}", credentials);
    OpenStackProvider::connect(&credentials)
        .await
        .with_context(|| format!("failed to authenticate against {}", credentials.auth_url))
}

/// Bound `work` by the configured timeout
pub async fn with_timeout<T>(
    config: &BootstrapConfig,
    work: impl std::future::Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    let limit = Duration::from_secs(config.timeout_secs);
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| anyhow::anyhow!("gave up after {}s (timeout_secs)", config.timeout_secs))?
}
