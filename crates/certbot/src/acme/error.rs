//! ACME error types

use std::time::Duration;

use thiserror::Error;

use crate::dns::DnsProviderError;

/// Errors that can occur while talking to the CA
#[derive(Debug, Error)]
pub enum AcmeError {
    /// No ACME account has been registered yet
    #[error("ACME account not registered - call register() first")]
    NoAccount,

    /// Failed to create or restore the ACME account
    #[error("Failed to create ACME account: {0}")]
    AccountCreation(String),

    /// The CA directory could not be fetched or is incomplete
    #[error("Failed to load ACME directory '{url}': {message}")]
    Directory { url: String, message: String },

    /// Failed to create certificate order
    #[error("Failed to create certificate order: {0}")]
    OrderCreation(String),

    /// Challenge validation failed
    #[error("Challenge validation failed for domain '{domain}': {message}")]
    ChallengeValidation { domain: String, message: String },

    /// Certificate finalization failed
    #[error("Failed to finalize certificate: {0}")]
    Finalization(String),

    /// ACME protocol error from instant-acme
    #[error("ACME protocol error: {0}")]
    Protocol(String),

    /// Operation timed out
    #[error("Operation timed out after {elapsed:?}: {message}")]
    Timeout { message: String, elapsed: Duration },

    /// No DNS-01 challenge offered for a domain
    #[error("No DNS-01 challenge available for domain '{0}'")]
    NoDns01Challenge(String),

    /// Obtain was called before a solver was attached
    #[error("DNS-01 challenge requires a solver")]
    NoDnsSolver,

    /// A solver is already attached
    #[error("A DNS-01 solver is already attached")]
    SolverAlreadySet,

    /// Presenting or cleaning up a challenge record failed
    #[error("DNS provider error: {0}")]
    Provision(#[from] DnsProviderError),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<instant_acme::Error> for AcmeError {
    fn from(e: instant_acme::Error) -> Self {
        AcmeError::Protocol(e.to_string())
    }
}
