//! Keystone v3 session
//!
//! A `ProviderSession` is built once from explicit `Credentials` and carries
//! the token plus the compute and network endpoints picked from the service
//! catalog. Nothing reads ambient configuration after that.

use crate::error::{OpenStackError, Result, classify};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
pub(crate) const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Password credentials for a project-scoped token
#[derive(Clone)]
pub struct Credentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub user_domain_name: String,
    pub project_domain_name: String,
    /// Region to pick endpoints for. `None` takes the first public endpoint.
    pub region: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"********")
            .field("project_name", &self.project_name)
            .field("user_domain_name", &self.user_domain_name)
            .field("project_domain_name", &self.project_domain_name)
            .field("region", &self.region)
            .finish()
    }
}

/// Authenticated handle on one project's compute and network endpoints
#[derive(Clone)]
pub struct ProviderSession {
    client: Client,
    token: String,
    compute_endpoint: String,
    network_endpoint: String,
    project: Option<String>,
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("compute_endpoint", &self.compute_endpoint)
            .field("network_endpoint", &self.network_endpoint)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl ProviderSession {
    /// Exchange `credentials` for a token and resolve endpoints
    pub async fn authenticate(credentials: &Credentials) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_HTTP_TIMEOUT).build()?;
        Self::authenticate_with(client, credentials).await
    }

    pub async fn authenticate_with(client: Client, credentials: &Credentials) -> Result<Self> {
        let url = format!("{}/auth/tokens", identity_v3_base(&credentials.auth_url));
        tracing::debug!(
            "Authenticating {} against {} (project {})",
            credentials.username,
            url,
            credentials.project_name
        );

        let response = client
            .post(&url)
            .json(&TokenRequest::password(credentials))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match classify(status.as_u16(), &body) {
                OpenStackError::Api { message, .. } | OpenStackError::NotFound(message) => {
                    OpenStackError::AuthenticationFailed(message)
                }
                other => other,
            });
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(OpenStackError::MissingToken)?;

        let body: TokenResponse = response.json().await?;
        let region = credentials.region.as_deref();
        let compute_endpoint = select_endpoint(&body.token.catalog, "compute", region)?;
        let network_endpoint =
            network_v2_base(&select_endpoint(&body.token.catalog, "network", region)?);

        tracing::debug!("Compute endpoint: {}", compute_endpoint);
        tracing::debug!("Network endpoint: {}", network_endpoint);

        Ok(Self {
            client,
            token,
            compute_endpoint,
            network_endpoint,
            project: body.token.project.map(|p| format!("{} ({})", p.name, p.id)),
        })
    }

    /// Build a session from an already issued token and known endpoints
    pub fn from_token(
        client: Client,
        token: impl Into<String>,
        compute_endpoint: impl Into<String>,
        network_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token: token.into(),
            compute_endpoint: compute_endpoint.into().trim_end_matches('/').to_string(),
            network_endpoint: network_v2_base(&network_endpoint.into()),
            project: None,
        }
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub fn compute_url(&self, path: &str) -> String {
        format!("{}{}", self.compute_endpoint, path)
    }

    pub fn network_url(&self, path: &str) -> String {
        format!("{}{}", self.network_endpoint, path)
    }
}

/// `http://keystone:5000` and `http://keystone:5000/v3/` both become
/// `http://keystone:5000/v3`
fn identity_v3_base(auth_url: &str) -> String {
    let trimmed = auth_url.trim_end_matches('/');
    if trimmed.ends_with("/v3") {
        trimmed.to_string()
    } else {
        format!("{}/v3", trimmed)
    }
}

/// Neutron catalogs list the bare service root; the API lives under `/v2.0`
fn network_v2_base(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.ends_with("/v2.0") {
        trimmed.to_string()
    } else {
        format!("{}/v2.0", trimmed)
    }
}

fn select_endpoint(
    catalog: &[CatalogEntry],
    service_type: &str,
    region: Option<&str>,
) -> Result<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .filter(|ep| ep.interface == "public")
        .find(|ep| match region {
            Some(region) => {
                ep.region_id.as_deref() == Some(region) || ep.region.as_deref() == Some(region)
            }
            None => true,
        })
        .map(|ep| ep.url.trim_end_matches('/').to_string())
        .ok_or_else(|| OpenStackError::EndpointNotFound {
            service: service_type.to_string(),
            region: region.unwrap_or("<any>").to_string(),
        })
}

// ============ API Types ============

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Debug, Serialize)]
struct AuthBody<'a> {
    identity: Identity<'a>,
    scope: Scope<'a>,
}

#[derive(Debug, Serialize)]
struct Identity<'a> {
    methods: [&'a str; 1],
    password: PasswordMethod<'a>,
}

#[derive(Debug, Serialize)]
struct PasswordMethod<'a> {
    user: UserRef<'a>,
}

#[derive(Debug, Serialize)]
struct UserRef<'a> {
    name: &'a str,
    domain: DomainRef<'a>,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct Scope<'a> {
    project: ProjectRef<'a>,
}

#[derive(Debug, Serialize)]
struct ProjectRef<'a> {
    name: &'a str,
    domain: DomainRef<'a>,
}

#[derive(Debug, Serialize)]
struct DomainRef<'a> {
    name: &'a str,
}

impl<'a> TokenRequest<'a> {
    fn password(c: &'a Credentials) -> Self {
        Self {
            auth: AuthBody {
                identity: Identity {
                    methods: ["password"],
                    password: PasswordMethod {
                        user: UserRef {
                            name: &c.username,
                            domain: DomainRef {
                                name: &c.user_domain_name,
                            },
                            password: &c.password,
                        },
                    },
                },
                scope: Scope {
                    project: ProjectRef {
                        name: &c.project_name,
                        domain: DomainRef {
                            name: &c.project_domain_name,
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    #[serde(default)]
    project: Option<ProjectInfo>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}
