//! bunny.net DNS provider
//!
//! API documentation: <https://docs.bunny.net/reference/dnszonepublic_index>

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

const BUNNY_API_BASE: &str = "https://api.bunny.net";

/// Record type code bunny.net uses for TXT
const RECORD_TYPE_TXT: u8 = 3;

/// bunny.net DNS provider
#[derive(Debug)]
pub struct BunnyProvider {
    client: Client,
    base_url: String,
    access_key: String,
    timeout: Duration,
    /// domain -> zone
    zone_cache: RwLock<HashMap<String, Zone>>,
}

impl BunnyProvider {
    pub fn new(access_key: &str, timeout: Duration) -> DnsResult<Self> {
        Self::with_base_url(access_key, timeout, BUNNY_API_BASE)
    }

    /// Provider talking to an alternative API endpoint
    pub fn with_base_url(
        access_key: &str,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> DnsResult<Self> {
        if access_key.trim().is_empty() {
            return Err(DnsProviderError::Configuration(
                "bunny.net API key is empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            DnsProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
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

    /// Map the status codes shared by every endpoint
    fn check_common_status(&self, response: &reqwest::Response) -> DnsResult<()> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                DnsProviderError::Authentication("Invalid bunny.net API key".to_string()),
            ),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                Err(DnsProviderError::RateLimited { retry_after_secs })
            }
            _ => Ok(()),
        }
    }

    /// Find the most specific zone containing `domain`
    async fn find_zone(&self, domain: &str) -> DnsResult<Zone> {
        let normalized = normalize_domain(domain);

        let cached = self.zone_cache.read().get(normalized).cloned();
        if let Some(zone) = cached {
            trace!(domain = %domain, zone_id = zone.id, "Zone found in cache");
            return Ok(zone);
        }

        for candidate in candidate_zones(normalized) {
            if let Some(zone) = self.search_zone(candidate).await? {
                debug!(domain = %domain, zone_id = zone.id, zone_name = %zone.domain, "Found zone for domain");
                self.zone_cache
                    .write()
                    .insert(normalized.to_string(), zone.clone());
                return Ok(zone);
            }
        }

        Err(DnsProviderError::ZoneNotFound {
            domain: normalized.to_string(),
        })
    }

    async fn search_zone(&self, name: &str) -> DnsResult<Option<Zone>> {
        let response = self
            .client
            .get(format!("{}/dnszone", self.base_url))
            .header("AccessKey", &self.access_key)
            .query(&[("search", name)])
            .send()
            .await
            .map_err(|e| self.request_error("list zones", e))?;

        self.check_common_status(&response)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::ApiRequest(format!(
                "Failed to list zones: HTTP {} - {}",
                status, body
            )));
        }

        let zones: ZoneList = response.json().await.map_err(|e| {
            DnsProviderError::ApiRequest(format!("Failed to parse zones response: {}", e))
        })?;

        // `search` is a substring match
        Ok(zones
            .items
            .into_iter()
            .find(|zone| zone.domain.eq_ignore_ascii_case(name)))
    }
}

#[async_trait]
impl DnsProvider for BunnyProvider {
    fn name(&self) -> &'static str {
        "bunny"
    }

    async fn create_txt_record(
        &self,
        domain: &str,
        record_name: &str,
        record_value: &str,
    ) -> DnsResult<String> {
        let zone = self.find_zone(domain).await?;
        let fqdn = format!("{}.{}", record_name, normalize_domain(domain));
        let relative_name = relative_record_name(&fqdn, &zone.domain);

        debug!(
            domain = %domain,
            zone_id = zone.id,
            record_name = %relative_name,
            "Creating TXT record"
        );

        let request = AddRecordRequest {
            record_type: RECORD_TYPE_TXT,
            name: relative_name.clone(),
            value: record_value.to_string(),
            ttl: CHALLENGE_TTL,
        };

        let response = self
            .client
            .put(format!("{}/dnszone/{}/records", self.base_url, zone.id))
            .header("AccessKey", &self.access_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error("create record", e))?;

        self.check_common_status(&response)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DnsProviderError::RecordCreation {
                record_name: relative_name,
                message: format!("HTTP {} - {}", status, body),
            });
        }

        let record: RecordResponse =
            response
                .json()
                .await
                .map_err(|e| DnsProviderError::RecordCreation {
                    record_name: relative_name.clone(),
                    message: format!("Failed to parse response: {}", e),
                })?;

        debug!(record_id = record.id, "TXT record created");
        Ok(record.id.to_string())
    }

    async fn delete_txt_record(&self, domain: &str, record_id: &str) -> DnsResult<()> {
        let zone = self.find_zone(domain).await?;

        debug!(zone_id = zone.id, record_id = %record_id, "Deleting TXT record");

        let response = self
            .client
            .delete(format!(
                "{}/dnszone/{}/records/{}",
                self.base_url, zone.id, record_id
            ))
            .header("AccessKey", &self.access_key)
            .send()
            .await
            .map_err(|e| self.request_error("delete record", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(record_id = %record_id, "Record already deleted");
            return Ok(());
        }

        self.check_common_status(&response)?;

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

// bunny.net API types

#[derive(Debug, Deserialize)]
struct ZoneList {
    #[serde(rename = "Items", default)]
    items: Vec<Zone>,
}

#[derive(Debug, Clone, Deserialize)]
struct Zone {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "Domain")]
    domain: String,
}

#[derive(Debug, Serialize)]
struct AddRecordRequest {
    #[serde(rename = "Type")]
    record_type: u8,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Ttl")]
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    #[serde(rename = "Id")]
    id: i64,
}
