//! Network self-inspection
//!
//! Works out which MAC address the host uses for outbound traffic, using
//! nothing but the local routing table. No metadata service and no cloud
//! API is involved, so this step succeeds even while the provider is down.

use crate::error::{BootstrapError, Result};
use async_trait::async_trait;
use mgrboot_cloud::MacAddress;
use std::process::Stdio;
use tokio::process::Command;

const LOOPBACK: &str = "lo";

/// Route types `ip route` may print ahead of the destination
const ROUTE_TYPES: &[&str] = &[
    "unicast",
    "local",
    "broadcast",
    "multicast",
    "unreachable",
    "blackhole",
    "prohibit",
    "throw",
    "nat",
    "anycast",
];

/// Read-only queries against the host's network stack
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Routing table in `ip route show` format
    async fn route_table(&self) -> Result<String>;

    /// Link details for one device in `ip addr show <dev>` format
    async fn link_details(&self, device: &str) -> Result<String>;
}

/// `SystemProbe` backed by the iproute2 `ip` tool
pub struct IpCommandProbe {
    program: String,
}

impl IpCommandProbe {
    pub fn new() -> Self {
        Self::with_program("ip")
    }

    /// Use a different binary, e.g. an absolute path to `ip`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = cmd.output().await.map_err(|e| {
            BootstrapError::NoUsableInterface(format!("failed to run {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BootstrapError::NoUsableInterface(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for IpCommandProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for IpCommandProbe {
    async fn route_table(&self) -> Result<String> {
        self.run(&["route", "show"]).await
    }

    async fn link_details(&self, device: &str) -> Result<String> {
        self.run(&["addr", "show", device]).await
    }
}

/// One line of the routing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub destination: String,
    pub device: Option<String>,
}

impl RouteEntry {
    pub fn is_default(&self) -> bool {
        self.destination == "default"
    }

    fn usable_device(&self) -> Option<&str> {
        self.device.as_deref().filter(|d| *d != LOOPBACK)
    }
}

pub fn parse_routes(output: &str) -> Vec<RouteEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace().peekable();
            if tokens.peek().is_some_and(|t| ROUTE_TYPES.contains(t)) {
                tokens.next();
            }
            let destination = tokens.next()?.to_string();
            let mut device = None;
            while let Some(token) = tokens.next() {
                if token == "dev" {
                    device = tokens.next().map(str::to_string);
                    break;
                }
            }
            Some(RouteEntry {
                destination,
                device,
            })
        })
        .collect()
}

/// MAC from the `link/ether` line of `ip addr show`
pub fn parse_link_address(output: &str) -> Option<MacAddress> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "link/ether" {
            return None;
        }
        tokens.next()?.parse().ok()
    })
}

/// Devices to try in order: the default route's device first, then every
/// other non-loopback device in the order the routing table names them
pub fn candidate_devices(routes: &[RouteEntry]) -> Vec<&str> {
    let default = routes
        .iter()
        .filter(|r| r.is_default())
        .filter_map(RouteEntry::usable_device);
    let rest = routes
        .iter()
        .filter(|r| !r.is_default())
        .filter_map(RouteEntry::usable_device);

    let mut devices: Vec<&str> = Vec::new();
    for device in default.chain(rest) {
        if !devices.contains(&device) {
            devices.push(device);
        }
    }
    devices
}

/// MAC address of the host's outbound interface
pub async fn resolve_local_mac(probe: &dyn SystemProbe) -> Result<MacAddress> {
    let table = probe.route_table().await?;
    let routes = parse_routes(&table);
    let has_default = routes
        .iter()
        .any(|r| r.is_default() && r.usable_device().is_some());

    for (index, device) in candidate_devices(&routes).into_iter().enumerate() {
        let details = match probe.link_details(device).await {
            Ok(details) => details,
            // The default device must be readable; fallbacks may be skipped
            Err(e) if index == 0 && has_default => return Err(e),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", device, e);
                continue;
            }
        };
        match parse_link_address(&details) {
            Some(mac) => {
                tracing::debug!("Outbound device {} has MAC {}", device, mac);
                return Ok(mac);
            }
            None if index == 0 && has_default => {
                tracing::warn!(
                    "Default route device {} has no link-layer address, trying other devices",
                    device
                );
            }
            None => tracing::debug!("{} has no link-layer address", device),
        }
    }

    Err(BootstrapError::NoUsableInterface(
        "no non-loopback device with a link-layer address in the routing table".to_string(),
    ))
}
