//! Configuration for the `mgrboot` binary
//!
//! A single YAML file carries the provider credentials, the agent settings
//! and where the bootstrap outputs go. [`find_config_file`] locates it and
//! [`load`] parses and validates it.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the configuration file directly
pub const CONFIG_ENV: &str = "MGRBOOT_CONFIG";

const CANDIDATES: [&str; 2] = ["mgrboot.local.yaml", "mgrboot.yaml"];
const PROJECT_DIR: &str = ".mgrboot";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub openstack: OpenStackConfig,
    pub agents: AgentsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub subnet_selection: SubnetSelection,
    /// Upper bound on the whole bootstrap run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenStackConfig {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_domain")]
    pub user_domain_name: String,
    #[serde(default = "default_domain")]
    pub project_domain_name: String,
}

impl fmt::Debug for OpenStackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenStackConfig")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"********")
            .field("project_name", &self.project_name)
            .field("region", &self.region)
            .field("user_domain_name", &self.user_domain_name)
            .field("project_domain_name", &self.project_domain_name)
            .finish()
    }
}

/// Agent-side settings. None of these have defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    pub keypair_name: String,
    pub security_group_name: String,
    pub user: String,
    pub to_manager_inbound_ports: PortList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `<keypair>.pem`
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,
    /// Where the agent context JSON goes. Unset means stdout.
    #[serde(default)]
    pub context_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            key_dir: default_key_dir(),
            context_path: None,
        }
    }
}

/// How the internal subnet is picked when a network carries several
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetSelection {
    #[default]
    First,
    Containment,
}

impl fmt::Display for SubnetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetSelection::First => write!(f, "first"),
            SubnetSelection::Containment => write!(f, "containment"),
        }
    }
}

/// TCP ports, written either as `"5672,8101"` or as a YAML list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPorts", into = "Vec<u16>")]
pub struct PortList(Vec<u16>);

impl PortList {
    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u16> {
        self.0
    }
}

impl From<PortList> for Vec<u16> {
    fn from(list: PortList) -> Self {
        list.0
    }
}

impl FromStr for PortList {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let ports = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u16>()
                    .map_err(|_| ConfigError::Invalid(format!("'{}' is not a TCP port", p)))
            })
            .collect::<Result<Vec<_>>>()?;
        PortList::try_from(ports)
    }
}

impl TryFrom<Vec<u16>> for PortList {
    type Error = ConfigError;

    fn try_from(ports: Vec<u16>) -> Result<Self> {
        if ports.is_empty() {
            return Err(ConfigError::Invalid(
                "agents.to_manager_inbound_ports must name at least one port".to_string(),
            ));
        }
        if ports.contains(&0) {
            return Err(ConfigError::Invalid("port 0 cannot be opened".to_string()));
        }
        Ok(PortList(ports))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPorts {
    Text(String),
    Single(u16),
    List(Vec<u16>),
}

impl TryFrom<RawPorts> for PortList {
    type Error = ConfigError;

    fn try_from(raw: RawPorts) -> Result<Self> {
        match raw {
            RawPorts::Text(text) => text.parse(),
            RawPorts::Single(port) => PortList::try_from(vec![port]),
            RawPorts::List(ports) => PortList::try_from(ports),
        }
    }
}

impl FromStr for BootstrapConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s, Path::new("<inline>"))
    }
}

impl BootstrapConfig {
    /// Rejects values serde accepts but the bootstrap cannot use
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("openstack.auth_url", &self.openstack.auth_url),
            ("openstack.username", &self.openstack.username),
            ("openstack.project_name", &self.openstack.project_name),
            ("agents.keypair_name", &self.agents.keypair_name),
            ("agents.security_group_name", &self.agents.security_group_name),
            ("agents.user", &self.agents.user),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_domain() -> String {
    "Default".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_key_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.config/mgrboot`, if the platform has a config directory
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mgrboot"))
}

/// Locate the configuration file
///
/// Search order:
/// 1. `explicit` (the `--config` flag); it must exist
/// 2. the `MGRBOOT_CONFIG` environment variable
/// 3. current directory: `mgrboot.local.yaml`, `mgrboot.yaml`
/// 4. `./.mgrboot/` with the same names
/// 5. `~/.config/mgrboot/mgrboot.yaml`
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(PROJECT_DIR)] {
        if !dir.is_dir() {
            continue;
        }
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(global) = global_config_dir().map(|dir| dir.join("mgrboot.yaml"))
        && global.exists()
    {
        return Ok(global);
    }

    Err(ConfigError::NotFound)
}

/// Read, parse and validate one configuration file
pub fn load(path: &Path) -> Result<BootstrapConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, path)
}

/// [`find_config_file`] followed by [`load`]
pub fn discover(explicit: Option<&Path>) -> Result<(PathBuf, BootstrapConfig)> {
    let path = find_config_file(explicit)?;
    let config = load(&path)?;
    Ok((path, config))
}

fn parse(content: &str, path: &Path) -> Result<BootstrapConfig> {
    let config: BootstrapConfig =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}
