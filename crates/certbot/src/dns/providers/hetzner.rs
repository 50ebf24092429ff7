//! Hetzner DNS provider
//!
//! API documentation: <https://dns.hetzner.com/api-docs>

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dns::provider::{
    candidate_zones, normalize_domain, relative_record_name, DnsProvider, DnsProviderError,
    DnsResult, CHALLENGE_TTL,
};

const HETZNER_API_BASE: &str = "https://dns.hetzner.com/api/v1";

/// Hetzner DNS provider
#[derive(Debug)]
pub struct HetznerProvider {
    client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
    /// domain -> zone
    zone_cache: RwLock<HashMap<String, Zone>>,
}

impl HetznerProvider {
    pub fn new(token: &str, timeout: Duration) -> DnsResult<Self> {
        Self::with_base_url(token, timeout, HETZNER_API_BASE)
    }

    /// Provider talking to an alternative API endpoint
    pub fn with_base_url(
        token: &str,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> DnsResult<Self> {
        if token.trim().is_empty() {
            return Err(DnsProviderError::Configuration(
                "Hetzner API token is empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DnsProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout,
            zone_cache: RwLock::new(HashMap::new()),
        })
    }

    fn request_error(&self, action: &str, e: reqwest::Error) -> DnsProviderError {
        if e.is_timeout() {
            DnsProviderError::Timeout {
                operation: action.to_string(),
                elapsed_secs: self.timeout.as_secs(),
            }
        } else {
            DnsProviderError::ApiRequest(format!("Failed to {}: {}", action, e))
        }
    }

    async fn find_zone(&self, domain: &str) -> DnsResult<Zone> {
        let normalized = normalize_domain(domain);

        let cached = self.zone_cache.read().get(normalized).cloned();
        if let Some(zone) = cached {
            trace!(domain = %domain, zone_id = %zone.id, "Zone found in cache");
            return Ok(zone);
        }

        let zones = self.list_zones().await?;
        let zone = candidate_zones(normalized)
            .find_map(|candidate| zones.iter().find(|z| z.name == candidate))
            .cloned()
            .ok_or_else(|| DnsProviderError::ZoneNotFound {
                domain: normalized.to_string(),
            })?;

        debug!(domain = %domain, zone_id = %zone.id, zone_name = %zone.name, "Found zone for domain");
        self.zone_cache
            .write()
            .insert(normalized.to_string(), zone.clone());
        Ok(zone)
    }

    async fn list_zones(&self) -> DnsResult<Vec<Zone>> {
        let response = self
            .client
            .get(format!("{}/zones", self.base_url))
            .header("Auth-API-Token", &self.token)
            .send()
            .await
            .map_err(|e| self.request_error("list zones", e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(DnsProviderError::Authentication(
                "Invalid Hetzner API token".to_string(),
            ));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::ApiRequest(format!(
                "Failed to list zones: HTTP {} - {}",
                status, body
            )));
        }

        let zones: ZonesResponse = response.json().await.map_err(|e| {
            DnsProviderError::ApiRequest(format!("Failed to parse zones response: {}", e))
        })?;

        Ok(zones.zones)
    }
}

#[async_trait]
impl DnsProvider for HetznerProvider {
    fn name(&self) -> &'static str {
        "hetzner"
    }

    async fn create_txt_record(
        &self,
        domain: &str,
        record_name: &str,
        record_value: &str,
    ) -> DnsResult<String> {
        let zone = self.find_zone(domain).await?;
        let fqdn = format!("{}.{}", record_name, normalize_domain(domain));
        let relative_name = relative_record_name(&fqdn, &zone.name);

        debug!(
            domain = %domain,
            zone_id = %zone.id,
            record_name = %relative_name,
            "Creating TXT record"
        );

        let request = CreateRecordRequest {
            zone_id: zone.id.clone(),
            name: relative_name.clone(),
            r#type: "TXT",
            value: record_value.to_string(),
            ttl: CHALLENGE_TTL,
        };

        let response = self
            .client
            .post(format!("{}/records", self.base_url))
            .header("Auth-API-Token", &self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error("create record", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::RecordCreation {
                record_name: relative_name,
                message: format!("HTTP {} - {}", status, body),
            });
        }

        let created: RecordResponse =
            response
                .json()
                .await
                .map_err(|e| DnsProviderError::RecordCreation {
                    record_name: relative_name.clone(),
                    message: format!("Failed to parse response: {}", e),
                })?;

        debug!(record_id = %created.record.id, "TXT record created");
        Ok(created.record.id)
    }

    async fn delete_txt_record(&self, _domain: &str, record_id: &str) -> DnsResult<()> {
        debug!(record_id = %record_id, "Deleting TXT record");

        let response = self
            .client
            .delete(format!("{}/records/{}", self.base_url, record_id))
            .header("Auth-API-Token", &self.token)
            .send()
            .await
            .map_err(|e| self.request_error("delete record", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(record_id = %record_id, "Record already deleted");
            return Ok(());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::RecordDeletion {
                record_id: record_id.to_string(),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        Ok(())
    }
}

// Hetzner API types

#[derive(Debug, Deserialize)]
struct ZonesResponse {
    zones: Vec<Zone>,
}

#[derive(Debug, Clone, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest {
    zone_id: String,
    name: String,
    r#type: &'static str,
    value: String,
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: Record,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
}
