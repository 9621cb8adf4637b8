//! OpenStack provider implementation

use crate::api::{
    CreateKeypairRequest, CreateRuleRequest, CreateSecurityGroupRequest, FloatingIpList,
    KeypairEnvelope, KeypairList, NameOnly, NetworkList, NewRule, NewSecurityGroup, PortList,
    RouterList, RuleEnvelope, RuleList, SecurityGroupEnvelope, SecurityGroupList, ServersPage,
    SubnetList,
};
use crate::error::{OpenStackError, Result, classify};
use crate::session::{AUTH_TOKEN_HEADER, Credentials, ProviderSession};
use async_trait::async_trait;
use mgrboot_cloud::{
    AuthStatus, CloudProvider, FloatingIp, Instance, Keypair, Network, Port, ROUTER_INTERFACE_OWNER,
    Router, SecurityGroup, SecurityGroupRule, SecurityRule, Subnet,
};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Guard against a `next` link that points back at itself
const MAX_SERVER_PAGES: usize = 100;

/// OpenStack provider over Nova and Neutron
pub struct OpenStackProvider {
    session: ProviderSession,
}

impl OpenStackProvider {
    pub fn new(session: ProviderSession) -> Self {
        Self { session }
    }

    /// Authenticate and build a provider in one step
    pub async fn connect(credentials: &Credentials) -> Result<Self> {
        Ok(Self::new(ProviderSession::authenticate(credentials).await?))
    }

    pub fn session(&self) -> &ProviderSession {
        &self.session
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTH_TOKEN_HEADER, self.session.token())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self.send(self.session.client().get(url)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        tracing::debug!("POST {}", url);
        let response = self.send(self.session.client().post(url).json(body)).await?;
        Ok(response.json().await?)
    }

    /// Every server visible to the project, following Nova's pagination
    pub async fn servers(&self) -> Result<Vec<Instance>> {
        let mut url = self.session.compute_url("/servers/detail");
        let mut instances = Vec::new();

        for _ in 0..MAX_SERVER_PAGES {
            let page: ServersPage = self.get_json(&url).await?;
            let next = page.next_href().map(str::to_string);
            for server in page.servers {
                instances.push(Instance::try_from(server)?);
            }
            match next {
                Some(href) if href != url => url = href,
                _ => return Ok(instances),
            }
        }

        tracing::warn!(
            "Stopped following server pagination after {} pages",
            MAX_SERVER_PAGES
        );
        Ok(instances)
    }
}

#[async_trait]
impl CloudProvider for OpenStackProvider {
    fn name(&self) -> &str {
        "openstack"
    }

    async fn check_auth(&self) -> mgrboot_cloud::Result<AuthStatus> {
        let url = self.session.compute_url("/servers?limit=1");
        match self.get_json::<serde_json::Value>(&url).await {
            Ok(_) => Ok(AuthStatus::ok(
                self.session.project().unwrap_or("unknown project"),
            )),
            Err(OpenStackError::AuthenticationFailed(msg)) => Ok(AuthStatus::failed(msg)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_instances(&self) -> mgrboot_cloud::Result<Vec<Instance>> {
        Ok(self.servers().await?)
    }

    async fn list_networks(&self) -> mgrboot_cloud::Result<Vec<Network>> {
        let list: NetworkList = self.get_json(&self.session.network_url("/networks")).await?;
        Ok(list.networks.into_iter().map(Network::from).collect())
    }

    async fn list_subnets(&self) -> mgrboot_cloud::Result<Vec<Subnet>> {
        let list: SubnetList = self.get_json(&self.session.network_url("/subnets")).await?;
        Ok(list.subnets.into_iter().map(Subnet::from).collect())
    }

    async fn list_routers(&self) -> mgrboot_cloud::Result<Vec<Router>> {
        let list: RouterList = self.get_json(&self.session.network_url("/routers")).await?;
        Ok(list.routers.into_iter().map(Router::from).collect())
    }

    async fn list_router_interfaces(&self) -> mgrboot_cloud::Result<Vec<Port>> {
        let url = format!(
            "{}?device_owner={}",
            self.session.network_url("/ports"),
            ROUTER_INTERFACE_OWNER
        );
        let list: PortList = self.get_json(&url).await?;
        // Older Neutron releases ignore the filter
        Ok(list
            .ports
            .into_iter()
            .map(Port::from)
            .filter(Port::is_router_interface)
            .collect())
    }

    async fn list_security_groups(&self) -> mgrboot_cloud::Result<Vec<SecurityGroup>> {
        let list: SecurityGroupList = self
            .get_json(&self.session.network_url("/security-groups"))
            .await?;
        Ok(list
            .security_groups
            .into_iter()
            .map(SecurityGroup::from)
            .collect())
    }

    async fn list_security_group_rules(
        &self,
        group_id: &str,
    ) -> mgrboot_cloud::Result<Vec<SecurityGroupRule>> {
        let url = format!(
            "{}?security_group_id={}",
            self.session.network_url("/security-group-rules"),
            group_id
        );
        let list: RuleList = self.get_json(&url).await?;
        Ok(list
            .security_group_rules
            .into_iter()
            .map(SecurityGroupRule::from)
            .filter(|r| r.security_group_id == group_id)
            .collect())
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> mgrboot_cloud::Result<SecurityGroup> {
        let body = CreateSecurityGroupRequest {
            security_group: NewSecurityGroup { name, description },
        };
        let created: SecurityGroupEnvelope = self
            .post_json(&self.session.network_url("/security-groups"), &body)
            .await?;
        tracing::info!(
            "Created security group {} ({})",
            created.security_group.name,
            created.security_group.id
        );
        Ok(created.security_group.into())
    }

    async fn create_security_group_rule(
        &self,
        group_id: &str,
        rule: &SecurityRule,
    ) -> mgrboot_cloud::Result<SecurityGroupRule> {
        let body = CreateRuleRequest {
            security_group_rule: NewRule::ingress(group_id, rule),
        };
        let created: RuleEnvelope = self
            .post_json(&self.session.network_url("/security-group-rules"), &body)
            .await?;
        Ok(created.security_group_rule.into())
    }

    async fn list_keypairs(&self) -> mgrboot_cloud::Result<Vec<Keypair>> {
        let list: KeypairList = self
            .get_json(&self.session.compute_url("/os-keypairs"))
            .await?;
        Ok(list
            .keypairs
            .into_iter()
            .map(|k| Keypair::from(k.keypair))
            .collect())
    }

    async fn create_keypair(&self, name: &str) -> mgrboot_cloud::Result<Keypair> {
        let body = CreateKeypairRequest {
            keypair: NameOnly { name },
        };
        let created: KeypairEnvelope = self
            .post_json(&self.session.compute_url("/os-keypairs"), &body)
            .await?;
        tracing::info!("Created keypair {}", created.keypair.name);
        Ok(created.keypair.into())
    }

    async fn find_floating_ip(&self, address: &str) -> mgrboot_cloud::Result<Option<FloatingIp>> {
        let url = format!(
            "{}?floating_ip_address={}",
            self.session.network_url("/floatingips"),
            address
        );
        let list: FloatingIpList = self.get_json(&url).await?;
        Ok(list
            .floatingips
            .into_iter()
            .map(FloatingIp::from)
            .find(|f| f.address == address))
    }
}
