//! mgrboot cloud abstraction
//!
//! This crate provides the provider-neutral side of mgrboot: the
//! `CloudProvider` trait, the object model the bootstrap walks, security rule
//! values, and the `ResourceContext` record the bootstrap produces.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   mgrboot CLI                    │
//! │              (mgrboot run/discover)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 mgrboot-core                     │
//! │  inspect → locate → resolve → provision          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                mgrboot-cloud                     │
//! │  trait CloudProvider { ... }                     │
//! │  ResourceContext / SecurityRule / model          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │   openstack   │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod context;
pub mod error;
pub mod model;
pub mod provider;
pub mod rule;

// Re-exports
pub use context::{ResourceContext, ResourceDescriptor, ResourceType, Role};
pub use error::{CloudError, Result};
pub use model::{
    AddressKind, AttachedNetwork, FloatingIp, Instance, InstanceAddress, Keypair, MacAddress,
    Network, Port, ROUTER_INTERFACE_OWNER, Router, SecurityGroup, SecurityGroupRule, Subnet,
};
pub use provider::{AuthStatus, CloudProvider};
pub use rule::{PlanSummary, RuleAction, RuleActionType, RulePlan, RuleSource, SecurityRule};
