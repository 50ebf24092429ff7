//! Challenge record propagation
//!
//! The CA resolves `_acme-challenge` records from the public internet, so a
//! challenge is only marked ready once public resolvers serve the value.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::provider::{challenge_record_fqdn, DnsProviderError, DnsResult};
use crate::config::PropagationSettings;

/// Polls resolvers until a challenge TXT value is visible
#[derive(Debug)]
pub struct PropagationChecker {
    initial_delay: Duration,
    check_interval: Duration,
    timeout: Duration,
    resolver: TokioResolver,
}

impl PropagationChecker {
    pub fn from_settings(settings: &PropagationSettings) -> DnsResult<Self> {
        if settings.check_interval_secs == 0 {
            return Err(DnsProviderError::Configuration(
                "propagation check interval must be positive".to_string(),
            ));
        }

        let resolver_config = if settings.nameservers.is_empty() {
            ResolverConfig::default()
        } else {
            let mut resolver_config = ResolverConfig::new();
            for ip in &settings.nameservers {
                resolver_config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(*ip, 53),
                    Protocol::Udp,
                ));
            }
            resolver_config
        };

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 3;
        // A cached negative answer would hide the new record
        opts.cache_size = 0;

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Ok(Self {
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            check_interval: Duration::from_secs(settings.check_interval_secs),
            timeout: Duration::from_secs(settings.timeout_secs),
            resolver,
        })
    }

    /// Wait until the challenge record of `domain` carries `expected_value`
    pub async fn wait_for_propagation(&self, domain: &str, expected_value: &str) -> DnsResult<()> {
        let record_name = challenge_record_fqdn(domain);
        let start = Instant::now();
        let deadline = start + self.timeout;

        debug!(
            record = %record_name,
            timeout_secs = self.timeout.as_secs(),
            "Waiting for DNS propagation"
        );

        tokio::time::sleep(self.initial_delay).await;

        loop {
            match self.record_visible(&record_name, expected_value).await {
                Ok(true) => {
                    debug!(
                        record = %record_name,
                        elapsed_secs = start.elapsed().as_secs(),
                        "DNS propagation confirmed"
                    );
                    return Ok(());
                }
                Ok(false) => trace!(record = %record_name, "Record not yet propagated"),
                Err(e) => warn!(record = %record_name, error = %e, "DNS lookup error"),
            }

            if Instant::now() > deadline {
                return Err(DnsProviderError::Timeout {
                    operation: format!("propagation of {}", record_name),
                    elapsed_secs: start.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(self.check_interval).await;
        }
    }

    async fn record_visible(&self, record_name: &str, expected_value: &str) -> DnsResult<bool> {
        match self.resolver.txt_lookup(record_name).await {
            Ok(records) => Ok(records.iter().any(|record| {
                // Long TXT values arrive split into character-strings
                let value: String = record
                    .txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect();
                value == expected_value
            })),
            Err(e) if is_transient(&e.to_string()) => Ok(false),
            Err(e) => Err(DnsProviderError::ApiRequest(format!(
                "DNS lookup failed for '{}': {}",
                record_name, e
            ))),
        }
    }
}

/// Lookup failures expected while a record is still propagating
fn is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    ["no records found", "nxdomain", "record not found", "no connections available"]
        .iter()
        .any(|needle| message.contains(needle))
}
