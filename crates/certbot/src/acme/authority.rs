//! Certificate authority interface and the values exchanged with it

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::AcmeError;
use crate::account::{AcmeUser, Registration};
use crate::dns::ChallengeSolver;
use crate::error::{IssuerError, IssuerResult};

/// Options submitted with the account registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Fixed policy value; there is no interactive consent flow
    pub terms_of_service_agreed: bool,
}

/// A single certificate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    domains: Vec<String>,
    bundle: bool,
}

impl IssuanceRequest {
    /// Build a request. The domain list must not be empty.
    pub fn new(domains: Vec<String>, bundle: bool) -> IssuerResult<Self> {
        if domains.is_empty() {
            return Err(IssuerError::Configuration(
                "an issuance request needs at least one domain".to_string(),
            ));
        }
        Ok(Self { domains, bundle })
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Whether intermediates are appended after the leaf
    pub fn bundle(&self) -> bool {
        self.bundle
    }

    /// Primary domain (the first requested name)
    pub fn primary_domain(&self) -> &str {
        &self.domains[0]
    }
}

/// Issued certificate material
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    /// Primary domain of the request
    pub domain: String,
    /// Leaf certificate, followed by the chain when bundling was requested
    pub certificate_pem: String,
    /// Private key of the certificate
    pub private_key_pem: String,
    /// URL the CA serves the certificate from
    pub issuer_url: String,
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("domain", &self.domain)
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("private_key_pem", &"<redacted>")
            .field("issuer_url", &self.issuer_url)
            .finish()
    }
}

/// ACME certificate authority as seen by the issuance core
///
/// Implementations own the protocol details: nonce handling, polling,
/// challenge orchestration and finalization all happen behind `obtain`.
#[async_trait]
pub trait CertificateAuthority: Send {
    /// Register a new account for `user`
    async fn register(
        &mut self,
        user: &dyn AcmeUser,
        options: &RegisterOptions,
    ) -> Result<Registration, AcmeError>;

    /// Attach the solver used for DNS-01 challenges
    fn set_dns01_solver(&mut self, solver: Arc<dyn ChallengeSolver>) -> Result<(), AcmeError>;

    /// Order, validate and download a certificate
    async fn obtain(&mut self, request: &IssuanceRequest) -> Result<CertificateBundle, AcmeError>;
}
