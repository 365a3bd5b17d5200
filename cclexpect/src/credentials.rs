//! Host and domain credentials.
//!
//! Credentials are passed explicitly; nothing here is process-global.

use std::sync::Arc;

use secrecy::SecretString;

/// Login for the backend host's SSH account.
#[derive(Debug)]
pub struct HostCredentials {
    /// `host` or `host:port`.
    pub host: String,
    pub username: String,
    pub password: SecretString,
}

impl HostCredentials {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Login for CCL's security prompt.
#[derive(Debug)]
pub struct DomainCredentials {
    pub username: String,
    pub domain: String,
    pub password: SecretString,
}

impl DomainCredentials {
    pub fn new(
        username: impl Into<String>,
        domain: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            domain: domain.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Supplies the credentials a flow runs with.
pub trait CredentialSource: Send + Sync {
    fn host_credentials(&self) -> &HostCredentials;

    /// `None` means the domain authentication steps are left out.
    fn domain_credentials(&self) -> Option<Arc<DomainCredentials>>;
}

/// Fixed credentials.
#[derive(Debug)]
pub struct StaticCredentials {
    host: HostCredentials,
    domain: Option<Arc<DomainCredentials>>,
}

impl StaticCredentials {
    pub fn new(host: HostCredentials) -> Self {
        Self { host, domain: None }
    }

    pub fn with_domain(mut self, domain: DomainCredentials) -> Self {
        self.domain = Some(Arc::new(domain));
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn host_credentials(&self) -> &HostCredentials {
        &self.host
    }

    fn domain_credentials(&self) -> Option<Arc<DomainCredentials>> {
        self.domain.clone()
    }
}
