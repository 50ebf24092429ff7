//! DNS provider interface
//!
//! A provider only knows how to add and remove TXT records in the zones it
//! manages. Challenge values, propagation and bookkeeping live in the solver.

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for DNS operations
pub type DnsResult<T> = Result<T, DnsProviderError>;

/// Errors raised while provisioning challenge records
#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// The provider rejected the API credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No zone managed by the provider contains the domain
    #[error("Zone not found for domain '{domain}'")]
    ZoneNotFound { domain: String },

    #[error("Failed to create TXT record for '{record_name}': {message}")]
    RecordCreation { record_name: String, message: String },

    #[error("Failed to delete TXT record '{record_id}': {message}")]
    RecordDeletion { record_id: String, message: String },

    /// Transport failure or unexpected API response
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("Rate limited by DNS provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A request or the propagation wait ran out of time
    #[error("Timed out after {elapsed_secs}s: {operation}")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// DNS provider able to publish DNS-01 challenge records
#[async_trait]
pub trait DnsProvider: Send + Sync + Debug {
    /// Short provider name, as used in configuration
    fn name(&self) -> &'static str;

    /// Create `{record_name}.{domain}` TXT with `record_value`
    ///
    /// `domain` is already normalized (no wildcard prefix). Returns the
    /// provider's record id, used for deletion.
    async fn create_txt_record(
        &self,
        domain: &str,
        record_name: &str,
        record_value: &str,
    ) -> DnsResult<String>;

    /// Delete a record created by `create_txt_record`
    ///
    /// Deleting a record that no longer exists succeeds.
    async fn delete_txt_record(&self, domain: &str, record_id: &str) -> DnsResult<()>;
}

/// Label of the DNS-01 challenge record
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// TTL of challenge records, in seconds
pub const CHALLENGE_TTL: u32 = 60;

/// Strip the wildcard label: `*.example.com` validates at `example.com`
pub fn normalize_domain(domain: &str) -> &str {
    domain
        .strip_prefix("*.")
        .unwrap_or(domain)
        .trim_end_matches('.')
}

/// `_acme-challenge.<domain>` for a (possibly wildcard) domain
pub fn challenge_record_fqdn(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_RECORD, normalize_domain(domain))
}

/// Record name relative to `zone` (`@` for the apex)
pub(crate) fn relative_record_name(fqdn: &str, zone: &str) -> String {
    if fqdn == zone {
        "@".to_string()
    } else if let Some(stripped) = fqdn.strip_suffix(&format!(".{}", zone)) {
        stripped.to_string()
    } else {
        fqdn.to_string()
    }
}

/// Walk from `domain` up through its parents, most specific first
pub(crate) fn candidate_zones(domain: &str) -> impl Iterator<Item = &str> {
    let mut current = Some(normalize_domain(domain));
    std::iter::from_fn(move || {
        let zone = current?;
        current = zone.split_once('.').map(|(_, parent)| parent);
        Some(zone)
    })
    .filter(|zone| zone.contains('.'))
}
