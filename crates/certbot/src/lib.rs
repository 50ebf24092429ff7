//! Zentinel Certbot Library
//!
//! One-shot issuance of a wildcard TLS certificate from an ACME certificate
//! authority, validated with DNS-01 and stored in HashiCorp Vault KV.
//!
//! The run is assembled from narrow collaborators so every stage can be
//! exercised with fakes:
//!
//! - **Account**: a fresh ECDSA P-256 account key and identity per run
//! - **CA**: [`CertificateAuthority`], implemented by [`AcmeAuthority`]
//! - **DNS-01**: [`ChallengeSolver`] backed by a DNS provider API
//! - **Orchestration**: [`Issuer`] state machine
//! - **Metadata**: serial, validity and SANs of the issued certificate
//! - **Storage**: [`KvStore`], implemented by [`VaultKvClient`]
//!
//! # Example
//!
//! ```ignore
//! use zentinel_certbot::{pipeline, AcmeAuthority, IssuerConfig, VaultConnection, VaultKvClient};
//!
//! let config = IssuerConfig::load()?;
//! let ca = AcmeAuthority::new(config.directory_url(false), config.key_type, config.acme.clone())?;
//! let store = VaultKvClient::new(VaultConnection::from_env(config.vault.timeout())?, &config.kv_mount)?;
//! let report = pipeline::run(&config, ca, store).await?;
//! ```

pub mod account;
pub mod acme;
pub mod certificate;
pub mod config;
pub mod dns;
pub mod error;
pub mod issuer;
pub mod pipeline;
pub mod vault;

pub use account::{AccountIdentity, AccountKey, AcmeUser, Registration};
pub use acme::{
    AcmeAuthority, AcmeError, CertificateAuthority, CertificateBundle, IssuanceRequest,
    RegisterOptions,
};
pub use certificate::CertificateMetadata;
pub use config::{CertificateKeyType, IssuerConfig};
pub use dns::{resolve_solver, ChallengeSolver, Dns01Solver, DnsProvider, DnsProviderError};
pub use error::{IssuerError, IssuerResult};
pub use issuer::{IssuanceState, Issuer};
pub use pipeline::IssuanceReport;
pub use vault::{KvStore, SecretPersister, SecretRecord, VaultConnection, VaultError, VaultKvClient};
