//! Error taxonomy for a certificate issuance run
//!
//! Every variant is fatal for the run. Collaborator errors (CA, DNS provider,
//! secret store) keep their own types and travel along as the source.

use thiserror::Error;

use crate::acme::AcmeError;
use crate::dns::DnsProviderError;
use crate::vault::VaultError;

/// Errors that can end an issuance run
#[derive(Debug, Error)]
pub enum IssuerError {
    /// Account key generation failed
    #[error("Failed to generate account key: {0}")]
    Generation(String),

    /// The configured DNS provider name is not known
    #[error("Unknown DNS provider '{0}'")]
    UnknownProvider(String),

    /// A secret or one of its fields is missing from the store
    #[error("Secret field '{field}' not found at '{path}': {reason}")]
    SecretNotFound {
        path: String,
        field: String,
        reason: String,
    },

    /// ACME account registration failed
    #[error("ACME account registration failed: {0}")]
    Registration(#[source] AcmeError),

    /// The challenge solver could not be attached to the CA client
    #[error("Challenge configuration failed: {0}")]
    Configuration(String),

    /// The DNS provider could not be set up for DNS-01 provisioning
    #[error("DNS provisioning error: {0}")]
    Provision(#[from] DnsProviderError),

    /// Ordering, validating or finalizing the certificate failed
    #[error("Certificate issuance failed: {0}")]
    Issuance(#[source] AcmeError),

    /// Issued material could not be decoded or does not match the request
    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    /// Writing the certificate record to the secret store failed
    #[error("Failed to persist certificate to '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: VaultError,
    },

    /// The account already carries a registration
    #[error("Account is already registered")]
    AlreadyRegistered,

    /// An orchestrator step was invoked from the wrong state
    #[error("Cannot {operation} while {state}")]
    OutOfOrder {
        operation: &'static str,
        state: String,
    },
}

/// Result type for issuance operations
pub type IssuerResult<T> = Result<T, IssuerError>;
