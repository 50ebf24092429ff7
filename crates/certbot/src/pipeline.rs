//! One issuance run from start to stored record
//!
//! Stages run strictly in sequence: account key, identity, provider
//! credential, DNS-01 solver, registration, challenge configuration,
//! issuance, metadata extraction and finally the store write. The first
//! failing stage ends the run; nothing is written unless every earlier
//! stage succeeded.

use std::sync::Arc;

use tracing::info;

use crate::account::{AccountIdentity, AccountKey};
use crate::acme::{CertificateAuthority, IssuanceRequest, RegisterOptions};
use crate::certificate::CertificateMetadata;
use crate::config::{DnsSettings, IssuerConfig};
use crate::dns::{resolve_solver, ChallengeSolver};
use crate::error::IssuerResult;
use crate::issuer::{IssuanceState, Issuer};
use crate::vault::{KvStore, SecretPersister, SecretRecord};

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceReport {
    /// Store path the record was written to
    pub certificate_path: String,
    /// DNS names on the issued certificate
    pub domains: Vec<String>,
    pub serial: String,
    pub issued_at: String,
    pub expires_at: String,
    /// Certificate URL reported by the CA
    pub certificate_url: String,
    /// Orchestrator states visited during the run
    pub states: Vec<IssuanceState>,
}

/// Run with the providers known to [`resolve_solver`]
pub async fn run<C, S>(config: &IssuerConfig, ca: C, store: S) -> IssuerResult<IssuanceReport>
where
    C: CertificateAuthority,
    S: KvStore,
{
    run_with_solver(config, ca, store, resolve_solver).await
}

/// Run with a caller-supplied solver factory
pub async fn run_with_solver<C, S, R>(
    config: &IssuerConfig,
    ca: C,
    store: S,
    resolve: R,
) -> IssuerResult<IssuanceReport>
where
    C: CertificateAuthority,
    S: KvStore,
    R: FnOnce(&str, &str, &DnsSettings) -> IssuerResult<Arc<dyn ChallengeSolver>>,
{
    let request = IssuanceRequest::new(config.domains.clone(), config.bundle)?;

    let key = AccountKey::generate()?;
    let identity = AccountIdentity::new(config.email.clone(), key);

    let persister = SecretPersister::new(store);
    let credential = persister
        .fetch_credential(&config.provider_secret_path, &config.provider_secret_field)
        .await?;
    let solver = resolve(&config.dns_provider, &credential, &config.dns)?;
    drop(credential);

    let mut issuer = Issuer::new(
        ca,
        identity,
        RegisterOptions {
            terms_of_service_agreed: config.terms_of_service_agreed,
        },
    );
    issuer.register().await?;
    issuer.configure_challenge(solver)?;
    let bundle = issuer.obtain(&request).await?;

    let metadata = CertificateMetadata::extract(&bundle.certificate_pem)?;
    metadata.ensure_covers(request.domains())?;

    let record = SecretRecord::new(&bundle, &metadata);
    persister
        .store_record(&config.certificate_path, &record)
        .await?;

    info!(
        path = %config.certificate_path,
        serial = %record.serial,
        expires_at = %record.expires_at,
        "Issuance run complete"
    );

    Ok(IssuanceReport {
        certificate_path: config.certificate_path.clone(),
        domains: record.domains,
        serial: record.serial,
        issued_at: record.issued_at,
        expires_at: record.expires_at,
        certificate_url: bundle.issuer_url,
        states: issuer.history().to_vec(),
    })
}
