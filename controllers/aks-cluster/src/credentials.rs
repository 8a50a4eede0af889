//! Credential and client resolution.
//!
//! An AKSClusterConfig names a Secret holding service principal credentials
//! (`azureCredentialSecret`, as `namespace:name` or `name`). The Secret is
//! read fresh on every pass and turned into typed Azure clients.

use crate::error::{ControllerError, CredentialsError};
use crate::store::{namespace_of, SecretStore};
use aks_client::{AzureClientFactory, AzureClients, AzureEnvironment, Credentials};
use crds::AKSClusterConfig;
use std::sync::Arc;

const SUBSCRIPTION_ID_KEY: &str = "azurecredentialConfig-subscriptionId";
const CLIENT_ID_KEY: &str = "azurecredentialConfig-clientId";
const CLIENT_SECRET_KEY: &str = "azurecredentialConfig-clientSecret";
const TENANT_ID_KEY: &str = "azurecredentialConfig-tenantId";
const ENVIRONMENT_KEY: &str = "azurecredentialConfig-environment";

/// Split a secret reference into namespace and name
pub fn parse_secret_reference(reference: &str, default_namespace: &str) -> Result<(String, String), CredentialsError> {
    let invalid = || CredentialsError::InvalidReference(reference.to_string());
    match reference.split_once(':') {
        Some((namespace, name)) => {
            if namespace.is_empty() || name.is_empty() || name.contains(':') {
                return Err(invalid());
            }
            Ok((namespace.to_string(), name.to_string()))
        }
        None if reference.is_empty() => Err(invalid()),
        None => Ok((default_namespace.to_string(), reference.to_string())),
    }
}

/// Resolves the credential Secret of a record into Azure clients
#[derive(Clone)]
pub struct ClientResolver {
    secrets: Arc<dyn SecretStore>,
    factory: Arc<dyn AzureClientFactory>,
}

impl ClientResolver {
    pub fn new(secrets: Arc<dyn SecretStore>, factory: Arc<dyn AzureClientFactory>) -> Self {
        Self { secrets, factory }
    }

    /// Credentials for `config`, with endpoint overrides from the spec applied
    pub async fn credentials(&self, config: &AKSClusterConfig) -> Result<Credentials, ControllerError> {
        let reference = &config.spec.azure_credential_secret;
        let (namespace, name) = parse_secret_reference(reference, &namespace_of(config))?;
        let secret = self
            .secrets
            .get(&namespace, &name)
            .await?
            .ok_or_else(|| CredentialsError::NotFound {
                namespace: namespace.clone(),
                name: name.clone(),
            })?;

        let data = secret.data.unwrap_or_default();
        let value = |key: &str, required: bool| -> Result<String, CredentialsError> {
            match data.get(key) {
                Some(bytes) => String::from_utf8(bytes.0.clone()).map_err(|_| CredentialsError::InvalidValue {
                    secret: reference.clone(),
                    key: key.to_string(),
                }),
                None if required => Err(CredentialsError::MissingKey {
                    secret: reference.clone(),
                    key: key.to_string(),
                }),
                None => Ok(String::new()),
            }
        };

        let environment: AzureEnvironment = value(ENVIRONMENT_KEY, false)?
            .parse()
            .map_err(|source| CredentialsError::Environment {
                secret: reference.clone(),
                source,
            })?;
        let mut credentials = Credentials::new(
            value(SUBSCRIPTION_ID_KEY, true)?,
            value(TENANT_ID_KEY, true)?,
            value(CLIENT_ID_KEY, true)?,
            value(CLIENT_SECRET_KEY, true)?,
            environment,
        );
        if let Some(base_url) = config.spec.base_url.as_deref().filter(|u| !u.is_empty()) {
            credentials = credentials.with_base_url(base_url);
        }
        if let Some(auth_base_url) = config.spec.auth_base_url.as_deref().filter(|u| !u.is_empty()) {
            credentials = credentials.with_auth_base_url(auth_base_url);
        }
        Ok(credentials)
    }

    /// Typed Azure clients for `config`
    pub async fn clients(&self, config: &AKSClusterConfig) -> Result<AzureClients, ControllerError> {
        let credentials = self.credentials(config).await?;
        Ok(self.factory.clients(&credentials).await?)
    }
}
