//! Interfaces to the world outside the bootstrap
//!
//! Key persistence and publishing the resulting context are not the
//! engine's job. It only sees these traits.

use crate::error::Result;
use async_trait::async_trait;
use mgrboot_cloud::ResourceContext;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persists agent private keys
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Write `private_key` for keypair `name`, returning where it went
    async fn store(&self, name: &str, private_key: &str) -> Result<PathBuf>;

    /// Path of a key stored by an earlier run, if any
    async fn locate(&self, name: &str) -> Result<Option<PathBuf>>;
}

/// What downstream orchestration receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    pub resources: ResourceContext,
    pub agent_user: String,
    pub agent_key_path: PathBuf,
}

#[async_trait]
pub trait ContextPublisher: Send + Sync {
    async fn publish(&self, record: &AgentContext) -> Result<()>;
}
