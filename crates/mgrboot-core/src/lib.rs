//! mgrboot engine
//!
//! Bootstraps a management host inside an OpenStack-style cloud:
//!
//! 1. [`inspect`] finds the host's outbound MAC from the routing table
//! 2. [`locator`] finds the compute instance carrying that MAC
//! 3. [`resolver`] walks the instance's network topology into a
//!    `ResourceContext`
//! 4. [`provisioner`] ensures the agent keypair and security group exist and
//!    both security groups carry the required ingress rules
//! 5. the context is handed to a [`ContextPublisher`]
//!
//! [`Bootstrap`] chains the steps. Every step only depends on the previous
//! one's output and the provider handle.

pub mod bootstrap;
pub mod collaborator;
pub mod error;
pub mod inspect;
pub mod locator;
pub mod policy;
pub mod provisioner;
pub mod resolver;

pub use bootstrap::{
    AgentSettings, Bootstrap, BootstrapOutcome, BootstrapStep, Discovery, Silent, StepObserver,
};
pub use collaborator::{AgentContext, ContextPublisher, KeyStore};
pub use error::{BootstrapError, Hop, Result};
pub use inspect::{IpCommandProbe, SystemProbe, resolve_local_mac};
pub use locator::find_instance_by_mac;
pub use policy::{AddressContainment, FirstListed, SelectionPolicy};
pub use provisioner::{
    GroupReport, KeypairOutcome, MANAGER_TO_AGENT_PORTS, ProvisionReport, RuleCounts,
    SecurityProvisioner,
};
pub use resolver::{Listings, TopologyResolver};
