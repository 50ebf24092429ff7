//! Certificate metadata extraction
//!
//! Parses the first certificate of an issued chain and derives the values
//! stored next to it: serial number, validity window and DNS names.

use chrono::{DateTime, Utc};
use tracing::debug;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

use crate::error::{IssuerError, IssuerResult};

/// Timestamp layout used in stored records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// Metadata derived from an issued certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMetadata {
    /// Serial number as colon-separated uppercase hex
    pub serial_number: String,
    /// DNS subject alternative names, in certificate order
    pub subject_alt_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateMetadata {
    /// Extract metadata from the first PEM block of `certificate_pem`
    pub fn extract(certificate_pem: &str) -> IssuerResult<Self> {
        let (_, pem) = parse_x509_pem(certificate_pem.as_bytes()).map_err(|e| {
            IssuerError::MalformedCertificate(format!("failed to decode certificate PEM: {}", e))
        })?;

        if pem.label != "CERTIFICATE" {
            return Err(IssuerError::MalformedCertificate(format!(
                "first PEM block is '{}', expected 'CERTIFICATE'",
                pem.label
            )));
        }

        let cert = pem.parse_x509().map_err(|e| {
            IssuerError::MalformedCertificate(format!("failed to parse X.509 certificate: {}", e))
        })?;

        let serial_hex = cert.tbs_certificate.serial.to_str_radix(16).to_uppercase();
        let serial_number = format_serial(&serial_hex);

        let validity = cert.validity();
        let not_before = to_utc(validity.not_before.timestamp(), "notBefore")?;
        let not_after = to_utc(validity.not_after.timestamp(), "notAfter")?;

        if not_before >= not_after {
            return Err(IssuerError::MalformedCertificate(format!(
                "validity window is empty: notBefore {} is not before notAfter {}",
                not_before, not_after
            )));
        }

        let san = cert.subject_alternative_name().map_err(|e| {
            IssuerError::MalformedCertificate(format!(
                "failed to parse subject alternative names: {}",
                e
            ))
        })?;

        let subject_alt_names: Vec<String> = san
            .map(|ext| {
                ext.value
                    .general_names
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::DNSName(dns) => Some(dns.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if subject_alt_names.is_empty() {
            return Err(IssuerError::MalformedCertificate(
                "certificate has no DNS subject alternative names".to_string(),
            ));
        }

        debug!(
            serial = %serial_number,
            sans = ?subject_alt_names,
            not_after = %not_after,
            "Parsed certificate metadata"
        );

        Ok(Self {
            serial_number,
            subject_alt_names,
            not_before,
            not_after,
        })
    }

    /// Verify every requested name is covered by one of the SANs
    pub fn ensure_covers(&self, requested: &[String]) -> IssuerResult<()> {
        let missing: Vec<&str> = requested
            .iter()
            .filter(|name| {
                !self
                    .subject_alt_names
                    .iter()
                    .any(|san| san_matches(san, name))
            })
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IssuerError::MalformedCertificate(format!(
                "certificate does not cover requested names {:?} (SANs: {:?})",
                missing, self.subject_alt_names
            )))
        }
    }

    /// `notBefore` in storage format
    pub fn issued_at(&self) -> String {
        self.not_before.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `notAfter` in storage format
    pub fn expires_at(&self) -> String {
        self.not_after.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn to_utc(timestamp: i64, field: &str) -> IssuerResult<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        IssuerError::MalformedCertificate(format!("{} timestamp {} is out of range", field, timestamp))
    })
}

/// Group a hex string into byte pairs separated by `:`
///
/// `AB1234` becomes `AB:12:34`. Odd-length input keeps its trailing
/// nibble in a final group of one (`ABC` becomes `AB:C`).
pub fn format_serial(hex: &str) -> String {
    let mut formatted = String::with_capacity(hex.len() + hex.len() / 2);
    for (i, c) in hex.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            formatted.push(':');
        }
        formatted.push(c);
    }
    formatted
}

/// Whether a SAN entry covers a requested name
///
/// A wildcard SAN covers exactly one extra leftmost label and also covers
/// the identical wildcard name.
pub fn san_matches(san: &str, name: &str) -> bool {
    let san = san.trim_end_matches('.').to_ascii_lowercase();
    let name = name.trim_end_matches('.').to_ascii_lowercase();

    if san == name {
        return true;
    }

    match (san.strip_prefix("*."), name.split_once('.')) {
        (Some(san_base), Some((label, rest))) => {
            !label.is_empty() && label != "*" && rest == san_base
        }
        _ => false,
    }
}

/// First certificate block of a PEM chain, with a trailing newline
pub fn leaf_certificate(chain_pem: &str) -> Option<String> {
    let start = chain_pem.find(BEGIN_CERTIFICATE)?;
    let end = chain_pem[start..].find(END_CERTIFICATE)? + start + END_CERTIFICATE.len();
    Some(format!("{}\n", &chain_pem[start..end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{date_time_ymd, CertificateParams, KeyPair, SerialNumber};

    fn mint(names: &[&str], serial: &[u8]) -> String {
        let mut params =
            CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
                .unwrap();
        params.serial_number = Some(SerialNumber::from(serial.to_vec()));
        params.not_before = date_time_ymd(2026, 1, 1);
        params.not_after = date_time_ymd(2026, 4, 1);
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().pem()
    }

    #[test]
    fn test_format_serial() {
        assert_eq!(format_serial("AB1234"), "AB:12:34");
        assert_eq!(format_serial("ABC"), "AB:C");
        assert_eq!(format_serial("AB"), "AB");
        assert_eq!(format_serial(""), "");
    }

    #[test]
    fn test_format_serial_even_length_grouping() {
        let formatted = format_serial("0123456789ABCDEF");
        assert_eq!(formatted, "01:23:45:67:89:AB:CD:EF");
        assert!(!formatted.ends_with(':'));
        assert!(formatted.split(':').all(|group| group.len() == 2));
    }

    #[test]
    fn test_extract_metadata() {
        let pem = mint(&["*.example.test", "example.test"], &[0x1A, 0x2B, 0x3C]);
        let metadata = CertificateMetadata::extract(&pem).unwrap();

        assert_eq!(metadata.serial_number, "1A:2B:3C");
        assert_eq!(
            metadata.subject_alt_names,
            vec!["*.example.test".to_string(), "example.test".to_string()]
        );
        assert!(metadata.not_before < metadata.not_after);
        assert_eq!(metadata.issued_at(), "2026-01-01T00:00:00Z");
        assert_eq!(metadata.expires_at(), "2026-04-01T00:00:00Z");
    }

    #[test]
    fn test_extract_serial_without_leading_zero() {
        let pem = mint(&["example.test"], &[0x0A, 0xBC]);
        let metadata = CertificateMetadata::extract(&pem).unwrap();
        assert_eq!(metadata.serial_number, "AB:C");

        // Leading zero bytes vanish too, not just the high nibble
        let pem = mint(&["example.test"], &[0x01, 0x02]);
        let metadata = CertificateMetadata::extract(&pem).unwrap();
        assert_eq!(metadata.serial_number, "10:2");
    }

    #[test]
    fn test_extract_uses_first_block_of_chain() {
        let leaf = mint(&["*.example.test"], &[0x1A, 0x2B]);
        let intermediate = mint(&["intermediate.example.test"], &[0x3C, 0x4D]);
        let chain = format!("{}{}", leaf, intermediate);

        let metadata = CertificateMetadata::extract(&chain).unwrap();
        assert_eq!(metadata.serial_number, "1A:2B");
        assert_eq!(metadata.subject_alt_names, vec!["*.example.test".to_string()]);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let result = CertificateMetadata::extract("not a certificate");
        assert!(matches!(result, Err(IssuerError::MalformedCertificate(_))));
    }

    #[test]
    fn test_extract_rejects_non_certificate_block() {
        let key = KeyPair::generate().unwrap().serialize_pem();
        let result = CertificateMetadata::extract(&key);
        assert!(matches!(result, Err(IssuerError::MalformedCertificate(_))));
    }

    #[test]
    fn test_extract_rejects_corrupt_der() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let result = CertificateMetadata::extract(pem);
        assert!(matches!(result, Err(IssuerError::MalformedCertificate(_))));
    }

    #[test]
    fn test_san_matches() {
        assert!(san_matches("*.example.test", "*.example.test"));
        assert!(san_matches("*.example.test", "www.example.test"));
        assert!(san_matches("Example.Test", "example.test"));
        assert!(!san_matches("*.example.test", "example.test"));
        assert!(!san_matches("*.example.test", "a.b.example.test"));
        assert!(!san_matches("www.example.test", "*.example.test"));
    }

    #[test]
    fn test_ensure_covers() {
        let pem = mint(&["*.example.test"], &[0x01]);
        let metadata = CertificateMetadata::extract(&pem).unwrap();

        metadata
            .ensure_covers(&["*.example.test".to_string(), "api.example.test".to_string()])
            .unwrap();

        let err = metadata
            .ensure_covers(&["example.test".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("example.test"));
    }

    #[test]
    fn test_leaf_certificate() {
        let leaf = mint(&["*.example.test"], &[0x01]);
        let intermediate = mint(&["ca.example.test"], &[0x02]);
        let chain = format!("{}\n{}", leaf, intermediate);

        let extracted = leaf_certificate(&chain).unwrap();
        assert_eq!(extracted.trim_end(), leaf.trim_end());
        assert_eq!(extracted.matches(BEGIN_CERTIFICATE).count(), 1);

        assert!(leaf_certificate("no pem here").is_none());
    }
}
