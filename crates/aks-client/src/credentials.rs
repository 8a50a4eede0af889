//! Service principal credentials and Azure cloud environments

use std::fmt;
use std::str::FromStr;

/// Azure cloud an account lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AzureEnvironment {
    #[default]
    Public,
    China,
    UsGovernment,
    German,
}

impl AzureEnvironment {
    /// Resource Manager endpoint
    pub fn resource_manager_url(&self) -> &'static str {
        match self {
            AzureEnvironment::Public => "https://management.azure.com/",
            AzureEnvironment::China => "https://management.chinacloudapi.cn/",
            AzureEnvironment::UsGovernment => "https://management.usgovcloudapi.net/",
            AzureEnvironment::German => "https://management.microsoftazure.de/",
        }
    }

    /// Active Directory endpoint
    pub fn active_directory_url(&self) -> &'static str {
        match self {
            AzureEnvironment::Public => "https://login.microsoftonline.com/",
            AzureEnvironment::China => "https://login.chinacloudapi.cn/",
            AzureEnvironment::UsGovernment => "https://login.microsoftonline.us/",
            AzureEnvironment::German => "https://login.microsoftonline.de/",
        }
    }
}

/// Raised for environment names outside the known set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown Azure environment: {0}")]
pub struct UnknownEnvironment(pub String);

impl FromStr for AzureEnvironment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "AzurePublicCloud" => Ok(AzureEnvironment::Public),
            "AzureChinaCloud" => Ok(AzureEnvironment::China),
            "AzureUSGovernmentCloud" => Ok(AzureEnvironment::UsGovernment),
            "AzureGermanCloud" => Ok(AzureEnvironment::German),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

/// Service principal credentials for one subscription
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Resource Manager endpoint, with trailing slash
    pub base_url: String,
    /// Active Directory endpoint, with trailing slash
    pub auth_base_url: String,
}

impl Credentials {
    /// Credentials using the endpoints of `environment`
    pub fn new(
        subscription_id: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        environment: AzureEnvironment,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: environment.resource_manager_url().to_string(),
            auth_base_url: environment.active_directory_url().to_string(),
        }
    }

    /// Override the Resource Manager endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = with_trailing_slash(base_url.into());
        self
    }

    /// Override the Active Directory endpoint
    pub fn with_auth_base_url(mut self, auth_base_url: impl Into<String>) -> Self {
        self.auth_base_url = with_trailing_slash(auth_base_url.into());
        self
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

// Keep the client secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("auth_base_url", &self.auth_base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_names() {
        assert_eq!("".parse(), Ok(AzureEnvironment::Public));
        assert_eq!("AzureChinaCloud".parse(), Ok(AzureEnvironment::China));
        assert_eq!("AzureUSGovernmentCloud".parse(), Ok(AzureEnvironment::UsGovernment));
        assert!("AzureMoonCloud".parse::<AzureEnvironment>().is_err());
    }

    #[test]
    fn test_overrides_normalise_trailing_slash() {
        let creds = Credentials::new("sub", "tenant", "client", "secret", AzureEnvironment::Public)
            .with_base_url("https://arm.example.test")
            .with_auth_base_url("https://login.example.test/");
        assert_eq!(creds.base_url, "https://arm.example.test/");
        assert_eq!(creds.auth_base_url, "https://login.example.test/");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("sub", "tenant", "client", "hunter2", AzureEnvironment::Public);
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
