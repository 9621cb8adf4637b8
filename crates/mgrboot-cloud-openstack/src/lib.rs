//! OpenStack provider for mgrboot
//!
//! Talks to Keystone v3 for a project-scoped token, then to Nova
//! (`/servers/detail`, `/os-keypairs`) and Neutron (`/v2.0/networks`,
//! `/subnets`, `/routers`, `/ports`, `/security-groups`,
//! `/security-group-rules`, `/floatingips`) over reqwest.
//!
//! ```no_run
//! use mgrboot_cloud::CloudProvider;
//! use mgrboot_cloud_openstack::{Credentials, OpenStackProvider};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let creds = Credentials {
//!     auth_url: "https://keystone.example.com:5000".into(),
//!     username: "admin".into(),
//!     password: "secret".into(),
//!     project_name: "ci".into(),
//!     user_domain_name: "Default".into(),
//!     project_domain_name: "Default".into(),
//!     region: Some("RegionOne".into()),
//! };
//! let provider = OpenStackProvider::connect(&creds).await?;
//! let servers = provider.list_instances().await?;
//! # Ok(())
//! # }
//! ```

mod api;
pub mod error;
pub mod provider;
pub mod session;

pub use error::{OpenStackError, Result, classify};
pub use provider::OpenStackProvider;
pub use session::{Credentials, ProviderSession};
