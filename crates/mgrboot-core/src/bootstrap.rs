//! Bootstrap pipeline
//!
//! inspect → locate → resolve → provision → publish, strictly in sequence.
//! Nothing is published unless every earlier step succeeded.

use crate::collaborator::{AgentContext, ContextPublisher, KeyStore};
use crate::error::{BootstrapError, Result};
use crate::inspect::{SystemProbe, resolve_local_mac};
use crate::locator::find_instance_by_mac;
use crate::policy::{FirstListed, SelectionPolicy};
use crate::provisioner::{KeypairOutcome, ProvisionReport, SecurityProvisioner};
use crate::resolver::TopologyResolver;
use mgrboot_cloud::{CloudProvider, Instance, MacAddress, ResourceContext};
use std::future::Future;
use std::path::PathBuf;

/// Pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    InspectNetwork,
    LocateSelf,
    ResolveTopology,
    Provision,
    Publish,
}

impl BootstrapStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InspectNetwork => "Inspect local network",
            Self::LocateSelf => "Locate self in provider",
            Self::ResolveTopology => "Resolve topology",
            Self::Provision => "Provision security",
            Self::Publish => "Publish context",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::InspectNetwork => "inspect",
            Self::LocateSelf => "locate",
            Self::ResolveTopology => "resolve",
            Self::Provision => "provision",
            Self::Publish => "publish",
        }
    }

    /// Steps of `discover`
    pub fn discovery_steps() -> Vec<Self> {
        vec![Self::InspectNetwork, Self::LocateSelf, Self::ResolveTopology]
    }

    /// Steps of a full run
    pub fn all() -> Vec<Self> {
        vec![
            Self::InspectNetwork,
            Self::LocateSelf,
            Self::ResolveTopology,
            Self::Provision,
            Self::Publish,
        ]
    }
}

/// Progress callbacks. Every method defaults to doing nothing.
pub trait StepObserver: Send {
    fn step_started(&mut self, _step: BootstrapStep) {}

    fn step_succeeded(&mut self, _step: BootstrapStep, _detail: &str) {}

    fn step_failed(&mut self, _step: BootstrapStep, _error: &BootstrapError) {}
}

/// Observer that ignores everything
pub struct Silent;

impl StepObserver for Silent {}

/// Agent-side inputs. All of them are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub keypair_name: String,
    pub security_group_name: String,
    pub user: String,
    pub to_manager_ports: Vec<u16>,
}

/// Result of the read-only half of the pipeline
#[derive(Debug, Clone)]
pub struct Discovery {
    pub mac: MacAddress,
    pub instance: Instance,
    pub context: ResourceContext,
}

#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub record: AgentContext,
    pub report: ProvisionReport,
}

pub struct Bootstrap<'a> {
    provider: &'a dyn CloudProvider,
    probe: &'a dyn SystemProbe,
    policy: &'a dyn SelectionPolicy,
    settings: &'a AgentSettings,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        probe: &'a dyn SystemProbe,
        settings: &'a AgentSettings,
    ) -> Self {
        Self {
            provider,
            probe,
            policy: &FirstListed,
            settings,
        }
    }

    pub fn with_policy(mut self, policy: &'a dyn SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Identify the host and resolve its topology without changing anything
    pub async fn discover(&self, observer: &mut dyn StepObserver) -> Result<Discovery> {
        let mac = observe(
            observer,
            BootstrapStep::InspectNetwork,
            resolve_local_mac(self.probe),
            |mac| format!("outbound MAC {}", mac),
        )
        .await?;

        let instance = observe(
            observer,
            BootstrapStep::LocateSelf,
            find_instance_by_mac(self.provider, &mac),
            |i| format!("{} ({})", i.name, i.id),
        )
        .await?;

        let resolver = TopologyResolver::new(self.provider).with_policy(self.policy);
        let context = observe(
            observer,
            BootstrapStep::ResolveTopology,
            resolver.build_context(
                &instance,
                &self.settings.keypair_name,
                &self.settings.security_group_name,
            ),
            |c| format!("{} resources resolved", c.len()),
        )
        .await?;

        Ok(Discovery {
            mac,
            instance,
            context,
        })
    }

    /// The whole bootstrap. The agent private key is stored before any
    /// security group is touched, so a later failure never loses it.
    pub async fn run(
        &self,
        key_store: &dyn KeyStore,
        publisher: &dyn ContextPublisher,
        observer: &mut dyn StepObserver,
    ) -> Result<BootstrapOutcome> {
        let discovery = self.discover(observer).await?;
        let context = discovery.context;

        let (report, key_path) = observe(
            observer,
            BootstrapStep::Provision,
            self.provision(&context, key_store),
            |(report, _)| describe_report(report),
        )
        .await?;

        let record = AgentContext {
            resources: context,
            agent_user: self.settings.user.clone(),
            agent_key_path: key_path,
        };
        observe(
            observer,
            BootstrapStep::Publish,
            publisher.publish(&record),
            |_| format!("agent key at {}", record.agent_key_path.display()),
        )
        .await?;

        Ok(BootstrapOutcome { record, report })
    }

    async fn provision(
        &self,
        context: &ResourceContext,
        key_store: &dyn KeyStore,
    ) -> Result<(ProvisionReport, PathBuf)> {
        let cidr = context.subnet_cidr().ok_or_else(|| {
            BootstrapError::Provisioning("resolved subnet carries no CIDR".to_string())
        })?;
        let provisioner = SecurityProvisioner::new(self.provider);
        let name = &self.settings.keypair_name;

        let keypair = provisioner.ensure_keypair(name).await?;
        let key_path = match &keypair {
            KeypairOutcome::Created { private_key } => {
                let path = key_store.store(name, private_key).await?;
                tracing::info!("Stored private key for {} at {}", name, path.display());
                path
            }
            KeypairOutcome::Reused => key_store.locate(name).await?.ok_or_else(|| {
                BootstrapError::KeyStore(format!(
                    "keypair {} already exists but its private key was never stored here; \
                     delete the keypair or restore the key file",
                    name
                ))
            })?,
        };

        let groups = provisioner
            .secure_groups(context, cidr, &self.settings.to_manager_ports)
            .await?;
        Ok((ProvisionReport { keypair, groups }, key_path))
    }
}

async fn observe<T, F>(
    observer: &mut dyn StepObserver,
    step: BootstrapStep,
    work: F,
    describe: impl FnOnce(&T) -> String,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    observer.step_started(step);
    match work.await {
        Ok(value) => {
            observer.step_succeeded(step, &describe(&value));
            Ok(value)
        }
        Err(e) => {
            observer.step_failed(step, &e);
            Err(e)
        }
    }
}

fn describe_report(report: &ProvisionReport) -> String {
    let keypair = if report.keypair.is_created() {
        "keypair created"
    } else {
        "keypair reused"
    };
    let group = if report.groups.agents_security_group_created {
        "agent group created"
    } else {
        "agent group reused"
    };
    let created = report.groups.agent_rules.created + report.groups.management_rules.created;
    let existing = report.groups.agent_rules.existing + report.groups.management_rules.existing;
    format!(
        "{}, {}, {} rules added, {} already present",
        keypair, group, created, existing
    )
}
