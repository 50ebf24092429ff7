//! Vault KV version 2 client

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use super::error::VaultError;

/// Address used when `VAULT_ADDR` is unset
pub const DEFAULT_VAULT_ADDR: &str = "https://127.0.0.1:8200";

const ADDR_ENV: &str = "VAULT_ADDR";
const TOKEN_ENV: &str = "VAULT_TOKEN";
const NAMESPACE_ENV: &str = "VAULT_NAMESPACE";

/// Key/value secret store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Latest version of the secret at `path`
    async fn read(&self, path: &str) -> Result<Map<String, Value>, VaultError>;

    /// Write `data` as a new version of the secret at `path`
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<(), VaultError>;
}

/// Where and how to reach Vault
#[derive(Clone)]
pub struct VaultConnection {
    pub address: String,
    pub token: String,
    pub namespace: Option<String>,
    pub timeout: Duration,
}

impl VaultConnection {
    /// Read `VAULT_ADDR`, `VAULT_TOKEN` and `VAULT_NAMESPACE`
    pub fn from_env(timeout: Duration) -> Result<Self, VaultError> {
        Self::from_lookup(|name| std::env::var(name).ok(), timeout)
    }

    /// Build a connection from any variable source
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        timeout: Duration,
    ) -> Result<Self, VaultError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let token = non_empty(TOKEN_ENV).ok_or_else(|| {
            VaultError::Configuration(format!("{} is not set", TOKEN_ENV))
        })?;

        Ok(Self {
            address: non_empty(ADDR_ENV).unwrap_or_else(|| DEFAULT_VAULT_ADDR.to_string()),
            token,
            namespace: non_empty(NAMESPACE_ENV),
            timeout,
        })
    }
}

impl fmt::Debug for VaultConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConnection")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// KV v2 client bound to one mount
pub struct VaultKvClient {
    http: Client,
    address: String,
    token: String,
    namespace: Option<String>,
    mount: String,
}

impl VaultKvClient {
    pub fn new(connection: VaultConnection, mount: impl Into<String>) -> Result<Self, VaultError> {
        let address = connection.address.trim_end_matches('/').to_string();
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(VaultError::Configuration(format!(
                "Vault address must be an http(s) URL, got '{}'",
                address
            )));
        }

        let mount = mount.into().trim_matches('/').to_string();
        if mount.is_empty() {
            return Err(VaultError::Configuration("KV mount is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(connection.timeout)
            .build()
            .map_err(|e| VaultError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            address,
            token: connection.token,
            namespace: connection.namespace,
            mount,
        })
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    fn data_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.address,
            self.mount,
            path.trim_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .http
            .request(method, self.data_url(path))
            .header("X-Vault-Token", &self.token);

        match &self.namespace {
            Some(namespace) => request.header("X-Vault-Namespace", namespace),
            None => request,
        }
    }

    /// Map the statuses every KV v2 call shares
    async fn check_status(&self, path: &str, response: Response) -> Result<Response, VaultError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let full_path = format!("{}/{}", self.mount, path.trim_matches('/'));
        match status {
            StatusCode::NOT_FOUND => Err(VaultError::NotFound { path: full_path }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(VaultError::PermissionDenied { path: full_path })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(VaultError::Api(format!(
                    "HTTP {} on '{}' - {}",
                    status, full_path, body
                )))
            }
        }
    }
}

impl fmt::Debug for VaultKvClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKvClient")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KvStore for VaultKvClient {
    async fn read(&self, path: &str) -> Result<Map<String, Value>, VaultError> {
        trace!(mount = %self.mount, path = %path, "Reading KV secret");

        let response = self.request(Method::GET, path).send().await?;
        let response = self.check_status(path, response).await?;

        let body: ReadResponse = response
            .json()
            .await
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))?;

        // A deleted or destroyed latest version reads back with null data
        body.data.data.ok_or_else(|| VaultError::NotFound {
            path: format!("{}/{}", self.mount, path.trim_matches('/')),
        })
    }

    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<(), VaultError> {
        let response = self
            .request(Method::POST, path)
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let response = self.check_status(path, response).await?;

        let version = response
            .json::<WriteResponse>()
            .await
            .ok()
            .and_then(|body| body.data)
            .map(|metadata| metadata.version);

        debug!(mount = %self.mount, path = %path, version = ?version, "KV secret written");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    data: ReadData,
}

#[derive(Debug, Deserialize)]
struct ReadData {
    data: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    data: Option<VersionMetadata>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn connection(address: &str) -> VaultConnection {
        VaultConnection {
            address: address.to_string(),
            token: "s.token".to_string(),
            namespace: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_connection_from_lookup() {
        let connection = VaultConnection::from_lookup(
            lookup(&[
                ("VAULT_ADDR", "https://vault.example.test:8200"),
                ("VAULT_TOKEN", "s.abc"),
                ("VAULT_NAMESPACE", "ops"),
            ]),
            Duration::from_secs(10),
        )
        .unwrap();

        assert_eq!(connection.address, "https://vault.example.test:8200");
        assert_eq!(connection.token, "s.abc");
        assert_eq!(connection.namespace.as_deref(), Some("ops"));
    }

    #[test]
    fn test_connection_defaults_address() {
        let connection =
            VaultConnection::from_lookup(lookup(&[("VAULT_TOKEN", "s.abc")]), Duration::from_secs(1))
                .unwrap();
        assert_eq!(connection.address, DEFAULT_VAULT_ADDR);
        assert!(connection.namespace.is_none());
    }

    #[test]
    fn test_connection_requires_token() {
        let result = VaultConnection::from_lookup(
            lookup(&[("VAULT_ADDR", "https://vault.example.test"), ("VAULT_TOKEN", " ")]),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(VaultError::Configuration(_))));
    }

    #[test]
    fn test_connection_debug_redacts_token() {
        let rendered = format!("{:?}", connection("https://vault.example.test"));
        assert!(!rendered.contains("s.token"));
    }

    #[test]
    fn test_data_url() {
        let client = VaultKvClient::new(connection("https://vault.example.test/"), "/kv/").unwrap();
        assert_eq!(
            client.data_url("/rsafe-ovh/tls/rsafe.ovh"),
            "https://vault.example.test/v1/kv/data/rsafe-ovh/tls/rsafe.ovh"
        );
    }

    #[test]
    fn test_client_rejects_bad_address() {
        let result = VaultKvClient::new(connection("vault.example.test"), "kv");
        assert!(matches!(result, Err(VaultError::Configuration(_))));

        let result = VaultKvClient::new(connection("https://vault.example.test"), "/");
        assert!(matches!(result, Err(VaultError::Configuration(_))));
    }
}
