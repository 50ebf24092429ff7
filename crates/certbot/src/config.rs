//! Issuer configuration
//!
//! Loaded from a TOML or JSON file named by `ZENTINEL_CERTBOT_CONFIG`, or
//! built from defaults when the variable is unset. Secret store connection
//! details come from the standard `VAULT_*` environment variables instead
//! (see [`crate::vault::VaultConnection::from_env`]).

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding the configuration file path
pub const CONFIG_ENV: &str = "ZENTINEL_CERTBOT_CONFIG";

/// Let's Encrypt production directory URL
pub const LETSENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt staging directory URL
pub const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Top-level issuer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// ACME account contact email
    pub email: String,
    /// Domains to put on the certificate (wildcards allowed)
    pub domains: Vec<String>,
    /// Concatenate intermediates after the leaf certificate
    pub bundle: bool,
    /// Agree to the CA's terms of service on registration
    pub terms_of_service_agreed: bool,
    /// Key algorithm for the certificate (not the account)
    pub key_type: CertificateKeyType,
    /// DNS provider used for DNS-01 challenges
    pub dns_provider: String,
    /// KV v2 mount holding both the provider secret and the certificate
    pub kv_mount: String,
    /// Path (under the mount) of the DNS provider API credential
    pub provider_secret_path: String,
    /// Field within the provider secret holding the API key
    pub provider_secret_field: String,
    /// Path (under the mount) the certificate record is written to
    pub certificate_path: String,
    pub directory: DirectoryConfig,
    pub acme: AcmeSettings,
    pub dns: DnsSettings,
    pub vault: VaultSettings,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            email: "me@ramadhantriyant.id".to_string(),
            domains: vec!["*.rsafe.ovh".to_string()],
            bundle: true,
            terms_of_service_agreed: true,
            key_type: CertificateKeyType::default(),
            dns_provider: "bunny".to_string(),
            kv_mount: "kv".to_string(),
            provider_secret_path: "rsafe-ovh/dns/bunny".to_string(),
            provider_secret_field: "BUNNY_API_KEY".to_string(),
            certificate_path: "rsafe-ovh/tls/rsafe.ovh".to_string(),
            directory: DirectoryConfig::default(),
            acme: AcmeSettings::default(),
            dns: DnsSettings::default(),
            vault: VaultSettings::default(),
        }
    }
}

impl IssuerConfig {
    /// Load from `ZENTINEL_CERTBOT_CONFIG` if set, defaults otherwise
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("toml");

        match extension {
            "toml" => Self::from_toml(&content),
            "json" => Self::from_json(&content),
            _ => Err(anyhow::anyhow!("Unsupported config format: {}", extension)),
        }
    }

    /// Parse configuration from TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Parse configuration from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse JSON configuration")
    }

    /// Check the configuration for values that cannot lead to a valid run
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            bail!("email must be a valid contact address, got '{}'", self.email);
        }

        if self.domains.is_empty() {
            bail!("at least one domain is required");
        }

        for domain in &self.domains {
            validate_domain(domain)?;
        }

        if self.dns_provider.trim().is_empty() {
            bail!("dns_provider must not be empty");
        }

        for (name, value) in [
            ("kv_mount", &self.kv_mount),
            ("provider_secret_path", &self.provider_secret_path),
            ("provider_secret_field", &self.provider_secret_field),
            ("certificate_path", &self.certificate_path),
        ] {
            if value.trim().trim_matches('/').is_empty() {
                bail!("{} must not be empty", name);
            }
        }

        if self.acme.poll_interval_secs == 0 {
            bail!("acme.poll_interval_secs must be greater than zero");
        }

        let propagation = &self.dns.propagation;
        if propagation.enabled && propagation.check_interval_secs == 0 {
            bail!("dns.propagation.check_interval_secs must be greater than zero");
        }

        Ok(())
    }

    /// Directory URL for the selected environment
    pub fn directory_url(&self, staging: bool) -> &str {
        if staging {
            &self.directory.staging
        } else {
            &self.directory.production
        }
    }
}

fn validate_domain(domain: &str) -> Result<()> {
    let name = domain.strip_prefix("*.").unwrap_or(domain);
    if name.is_empty() || name.contains('*') {
        bail!("invalid domain '{}': wildcards are only allowed as the leftmost label", domain);
    }
    if name
        .split('.')
        .any(|label| label.is_empty() || label.len() > 63)
    {
        bail!("invalid domain '{}'", domain);
    }
    Ok(())
}

/// Certificate key algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateKeyType {
    #[default]
    #[serde(rename = "rsa2048", alias = "rsa-2048")]
    Rsa2048,
    EcdsaP256,
    EcdsaP384,
}

/// ACME directory endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub production: String,
    pub staging: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            production: LETSENCRYPT_PRODUCTION.to_string(),
            staging: LETSENCRYPT_STAGING.to_string(),
        }
    }
}

/// Polling behaviour of the ACME client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeSettings {
    /// Maximum time to wait for the CA to validate challenges
    pub validation_timeout_secs: u64,
    /// Maximum time to wait for the certificate after finalization
    pub issuance_timeout_secs: u64,
    /// Delay between order status polls
    pub poll_interval_secs: u64,
    /// Timeout for individual HTTP requests to the CA
    pub request_timeout_secs: u64,
}

impl Default for AcmeSettings {
    fn default() -> Self {
        Self {
            validation_timeout_secs: 300,
            issuance_timeout_secs: 60,
            poll_interval_secs: 2,
            request_timeout_secs: 30,
        }
    }
}

impl AcmeSettings {
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    pub fn issuance_timeout(&self) -> Duration {
        Duration::from_secs(self.issuance_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// DNS provider and propagation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSettings {
    /// Timeout for DNS provider API requests
    pub api_timeout_secs: u64,
    pub propagation: PropagationSettings,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            api_timeout_secs: 30,
            propagation: PropagationSettings::default(),
        }
    }
}

impl DnsSettings {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// How to wait for challenge records to become visible
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationSettings {
    /// Query resolvers before telling the CA a challenge is ready
    pub enabled: bool,
    pub initial_delay_secs: u64,
    pub check_interval_secs: u64,
    pub timeout_secs: u64,
    /// Resolvers to query (empty = system defaults)
    pub nameservers: Vec<IpAddr>,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: 10,
            check_interval_secs: 5,
            timeout_secs: 120,
            nameservers: vec![
                IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
                IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
                IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
            ],
        }
    }
}

/// Secret store request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub timeout_secs: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl VaultSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
