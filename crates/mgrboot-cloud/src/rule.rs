//! Security rule values and rule synchronization plans

use crate::model::SecurityGroupRule;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where ingress traffic for a rule may come from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    Cidr(String),
    SecurityGroup(String),
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Cidr(cidr) => write!(f, "{}", cidr),
            RuleSource::SecurityGroup(id) => write!(f, "group {}", id),
        }
    }
}

/// An ingress rule, identified by value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub source: RuleSource,
}

impl SecurityRule {
    pub fn tcp(port: u16, source: RuleSource) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            source,
        }
    }

    /// One single-port tcp rule per entry of `ports`, all from `cidr`
    pub fn tcp_from_cidr(ports: &[u16], cidr: &str) -> Vec<Self> {
        ports
            .iter()
            .map(|&port| Self::tcp(port, RuleSource::Cidr(cidr.to_string())))
            .collect()
    }

    /// Whether an existing provider rule is this rule
    pub fn matches(&self, existing: &SecurityGroupRule) -> bool {
        if existing.direction != "ingress" {
            return false;
        }
        let protocol_matches = existing
            .protocol
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(&self.protocol));
        let ports_match = existing.port_range_min == Some(self.from_port)
            && existing.port_range_max == Some(self.to_port);
        let source_matches = match &self.source {
            RuleSource::Cidr(cidr) => {
                existing.remote_ip_prefix.as_deref() == Some(cidr.as_str())
                    && existing.remote_group_id.is_none()
            }
            RuleSource::SecurityGroup(id) => {
                existing.remote_group_id.as_deref() == Some(id.as_str())
            }
        };
        protocol_matches && ports_match && source_matches
    }
}

impl fmt::Display for SecurityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_port == self.to_port {
            write!(f, "{}/{} from {}", self.protocol, self.from_port, self.source)
        } else {
            write!(
                f,
                "{}/{}-{} from {}",
                self.protocol, self.from_port, self.to_port, self.source
            )
        }
    }
}

/// What to do with one required rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleActionType {
    /// Rule is missing from the group
    Create,
    /// Rule is already present
    NoOp,
}

impl fmt::Display for RuleActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleActionType::Create => write!(f, "create"),
            RuleActionType::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    pub action_type: RuleActionType,
    pub rule: SecurityRule,
}

/// Diff between the rules a group must carry and the rules it has
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePlan {
    pub security_group_id: String,
    pub actions: Vec<RuleAction>,
}

impl RulePlan {
    /// Plan `required` against `existing`. Duplicate entries in `required`
    /// collapse into one action.
    pub fn diff(
        security_group_id: impl Into<String>,
        required: Vec<SecurityRule>,
        existing: &[SecurityGroupRule],
    ) -> Self {
        let mut actions: Vec<RuleAction> = Vec::with_capacity(required.len());
        for rule in required {
            if actions.iter().any(|a| a.rule == rule) {
                continue;
            }
            let action_type = if existing.iter().any(|e| rule.matches(e)) {
                RuleActionType::NoOp
            } else {
                RuleActionType::Create
            };
            actions.push(RuleAction { action_type, rule });
        }
        Self {
            security_group_id: security_group_id.into(),
            actions,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type == RuleActionType::Create)
    }

    pub fn to_create(&self) -> impl Iterator<Item = &SecurityRule> {
        self.actions
            .iter()
            .filter(|a| a.action_type == RuleActionType::Create)
            .map(|a| &a.rule)
    }

    pub fn summary(&self) -> PlanSummary {
        let create = self.to_create().count();
        PlanSummary {
            create,
            no_change: self.actions.len() - create,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub no_change: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} unchanged",
            self.create, self.no_change
        )
    }
}
