//! DNS-01 challenge solver

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::propagation::PropagationChecker;
use super::provider::{
    challenge_record_fqdn, normalize_domain, DnsProvider, DnsResult, ACME_CHALLENGE_RECORD,
};
use crate::config::PropagationSettings;

/// Publishes and withdraws DNS-01 challenge responses
#[async_trait]
pub trait ChallengeSolver: Send + Sync + Debug {
    /// Make the response for `key_authorization` resolvable for `domain`
    async fn present(&self, domain: &str, token: &str, key_authorization: &str) -> DnsResult<()>;

    /// Remove what `present` published. Idempotent.
    async fn cleanup(&self, domain: &str, token: &str, key_authorization: &str) -> DnsResult<()>;
}

/// TXT value for a key authorization: base64url(SHA-256(key_authorization))
pub fn compute_challenge_value(key_authorization: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key_authorization.as_bytes()))
}

/// Solver backed by a DNS provider API
#[derive(Debug)]
pub struct Dns01Solver {
    provider: Arc<dyn DnsProvider>,
    propagation: Option<PropagationChecker>,
    /// (domain, token) -> provider record id
    records: Mutex<HashMap<(String, String), String>>,
}

impl Dns01Solver {
    /// Create a solver; propagation checks follow `propagation.enabled`
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        propagation: &PropagationSettings,
    ) -> DnsResult<Self> {
        let propagation = if propagation.enabled {
            Some(PropagationChecker::from_settings(propagation)?)
        } else {
            None
        };

        Ok(Self {
            provider,
            propagation,
            records: Mutex::new(HashMap::new()),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Number of records currently published by this solver
    pub fn pending_records(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl ChallengeSolver for Dns01Solver {
    async fn present(&self, domain: &str, token: &str, key_authorization: &str) -> DnsResult<()> {
        let value = compute_challenge_value(key_authorization);

        info!(
            domain = %domain,
            record = %challenge_record_fqdn(domain),
            provider = %self.provider.name(),
            "Creating DNS-01 challenge record"
        );

        let record_id = self
            .provider
            .create_txt_record(normalize_domain(domain), ACME_CHALLENGE_RECORD, &value)
            .await?;

        self.records
            .lock()
            .insert((domain.to_string(), token.to_string()), record_id.clone());

        debug!(domain = %domain, record_id = %record_id, "DNS record created");

        if let Some(checker) = &self.propagation {
            checker.wait_for_propagation(domain, &value).await?;
            info!(domain = %domain, "DNS-01 challenge record propagated");
        }

        Ok(())
    }

    async fn cleanup(&self, domain: &str, token: &str, _key_authorization: &str) -> DnsResult<()> {
        let key = (domain.to_string(), token.to_string());
        let existing = self.records.lock().get(&key).cloned();
        let record_id = match existing {
            Some(id) => id,
            None => {
                debug!(domain = %domain, "No challenge record to clean up");
                return Ok(());
            }
        };

        self.provider
            .delete_txt_record(normalize_domain(domain), &record_id)
            .await?;
        self.records.lock().remove(&key);

        info!(domain = %domain, record_id = %record_id, "DNS-01 challenge record cleaned up");
        Ok(())
    }
}
