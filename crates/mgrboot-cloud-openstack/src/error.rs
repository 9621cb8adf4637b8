//! OpenStack provider error types

use mgrboot_cloud::CloudError;
use serde::Deserialize;
use thiserror::Error;

/// Neutron's error type for a duplicate security group rule
const NEUTRON_RULE_EXISTS: &str = "SecurityGroupRuleExists";

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("Keystone authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Keystone response carried no X-Subject-Token header")]
    MissingToken,

    #[error("No {service} endpoint in service catalog for region {region}")]
    EndpointNotFound { service: String, region: String },

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("OpenStack API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<OpenStackError> for CloudError {
    fn from(err: OpenStackError) -> Self {
        match err {
            OpenStackError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
            OpenStackError::MissingToken => {
                CloudError::AuthenticationFailed(OpenStackError::MissingToken.to_string())
            }
            OpenStackError::EndpointNotFound { service, region } => {
                CloudError::EndpointNotFound { service, region }
            }
            OpenStackError::AlreadyExists(msg) => CloudError::AlreadyExists(msg),
            OpenStackError::NotFound(msg) => CloudError::ResourceNotFound(msg),
            OpenStackError::Api { status, message } => CloudError::Api { status, message },
            OpenStackError::Http(e) => CloudError::Http(e),
            OpenStackError::JsonError(e) => CloudError::Json(e),
        }
    }
}

/// Error bodies across Keystone, Nova and Neutron. Each service wraps the
/// message in a different envelope.
#[derive(Debug, Deserialize)]
struct NeutronEnvelope {
    #[serde(rename = "NeutronError")]
    neutron_error: NeutronFault,
}

#[derive(Debug, Deserialize)]
struct NeutronFault {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(default)]
    message: String,
}

/// Pull `(structured kind, message)` out of an error body
fn extract_fault(body: &str) -> (Option<String>, String) {
    if let Ok(envelope) = serde_json::from_str::<NeutronEnvelope>(body) {
        return (envelope.neutron_error.kind, envelope.neutron_error.message);
    }
    // Nova: {"badRequest": {...}} / {"conflictingRequest": {...}}
    // Keystone: {"error": {...}}
    if let Ok(map) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(body) {
        if let Some(fault) = map
            .values()
            .find_map(|v| serde_json::from_value::<Fault>(v.clone()).ok())
            .filter(|f| !f.message.is_empty())
        {
            return (None, fault.message);
        }
    }
    (None, body.trim().to_string())
}

/// Map a non-success response to an error
///
/// "Already exists" is recognised by Neutron's structured error type first.
/// Only when no type is present does the message text decide, which covers
/// Nova's legacy "This rule already exists in group" and duplicate keypairs.
pub fn classify(status: u16, body: &str) -> OpenStackError {
    let (kind, message) = extract_fault(body);

    if kind.as_deref() == Some(NEUTRON_RULE_EXISTS) {
        return OpenStackError::AlreadyExists(message);
    }
    if kind.is_none() && message.to_ascii_lowercase().contains("already exists") {
        return OpenStackError::AlreadyExists(message);
    }

    match status {
        401 => OpenStackError::AuthenticationFailed(message),
        404 => OpenStackError::NotFound(message),
        _ => OpenStackError::Api { status, message },
    }
}

pub type Result<T> = std::result::Result<T, OpenStackError>;
