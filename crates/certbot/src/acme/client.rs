//! Certificate authority backed by instant-acme

use std::sync::Arc;

use async_trait::async_trait;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, HttpClient, Identifier, NewOrder, Order,
    OrderStatus,
};
use tracing::{debug, error, info, trace, warn};

use super::authority::{CertificateAuthority, CertificateBundle, IssuanceRequest, RegisterOptions};
use super::error::AcmeError;
use super::registration::{account_credentials, register_account};
use crate::account::{AcmeUser, Registration};
use crate::certificate::leaf_certificate;
use crate::config::{AcmeSettings, CertificateKeyType};
use crate::dns::ChallengeSolver;

/// A challenge record handed to the solver, kept for cleanup
#[derive(Debug, Clone)]
struct PresentedChallenge {
    domain: String,
    token: String,
    key_authorization: String,
}

/// ACME certificate authority
///
/// Registration is signed with the caller's account key; orders,
/// challenges and finalization go through `instant-acme` acting as the
/// registered account.
pub struct AcmeAuthority {
    http: reqwest::Client,
    directory_url: String,
    key_type: CertificateKeyType,
    settings: AcmeSettings,
    order_http: Option<Box<dyn HttpClient>>,
    account: Option<Account>,
    solver: Option<Arc<dyn ChallengeSolver>>,
}

impl AcmeAuthority {
    /// Create an authority for the CA at `directory_url`
    pub fn new(
        directory_url: impl Into<String>,
        key_type: CertificateKeyType,
        settings: AcmeSettings,
    ) -> Result<Self, AcmeError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(concat!("zentinel-certbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            directory_url: directory_url.into(),
            key_type,
            settings,
            order_http: None,
            account: None,
            solver: None,
        })
    }

    /// Send order traffic through `http` instead of the default HTTPS-only
    /// client. Consumed by `register`.
    pub fn with_http_client(mut self, http: Box<dyn HttpClient>) -> Self {
        self.order_http = Some(http);
        self
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    /// Present every pending DNS-01 challenge and wait for the order to
    /// become ready. Records handed to the solver are appended to
    /// `presented` even when a later step fails.
    async fn validate(
        &self,
        order: &mut Order,
        solver: &dyn ChallengeSolver,
        presented: &mut Vec<PresentedChallenge>,
    ) -> Result<(), AcmeError> {
        {
            let mut authorizations = order.authorizations();
            while let Some(result) = authorizations.next().await {
                let mut authz = result.map_err(|e| {
                    AcmeError::OrderCreation(format!("Failed to get authorization: {}", e))
                })?;

                let domain = match &authz.identifier().identifier {
                    Identifier::Dns(domain) => domain.clone(),
                    _ => continue,
                };

                debug!(domain = %domain, status = ?authz.status, "Processing DNS-01 authorization");

                if authz.status == AuthorizationStatus::Valid {
                    debug!(domain = %domain, "Authorization already valid");
                    continue;
                }

                let mut challenge = authz
                    .challenge(ChallengeType::Dns01)
                    .ok_or_else(|| AcmeError::NoDns01Challenge(domain.clone()))?;

                let key_authorization = challenge.key_authorization().as_str().to_string();
                let token = challenge.token.clone();

                solver.present(&domain, &token, &key_authorization).await?;
                presented.push(PresentedChallenge {
                    domain: domain.clone(),
                    token,
                    key_authorization,
                });

                challenge
                    .set_ready()
                    .await
                    .map_err(|e| AcmeError::ChallengeValidation {
                        domain: domain.clone(),
                        message: e.to_string(),
                    })?;
            }
        }

        self.wait_for_order_ready(order).await
    }

    async fn wait_for_order_ready(&self, order: &mut Order) -> Result<(), AcmeError> {
        let started = tokio::time::Instant::now();
        let timeout = self.settings.validation_timeout();

        loop {
            let state = order
                .refresh()
                .await
                .map_err(|e| AcmeError::OrderCreation(format!("Failed to refresh order: {}", e)))?;

            match state.status {
                OrderStatus::Ready | OrderStatus::Valid => {
                    info!("Order is ready for finalization");
                    return Ok(());
                }
                OrderStatus::Invalid => {
                    let message = state
                        .error
                        .as_ref()
                        .map(|problem| problem.to_string())
                        .unwrap_or_else(|| "order became invalid".to_string());
                    error!(error = %message, "Order became invalid");
                    return Err(AcmeError::ChallengeValidation {
                        domain: "order".to_string(),
                        message,
                    });
                }
                OrderStatus::Pending | OrderStatus::Processing => {
                    if started.elapsed() > timeout {
                        return Err(AcmeError::Timeout {
                            message: "waiting for order to become ready".to_string(),
                            elapsed: started.elapsed(),
                        });
                    }
                    trace!(status = ?state.status, "Order not ready yet, waiting...");
                    tokio::time::sleep(self.settings.poll_interval()).await;
                }
            }
        }
    }

    /// Submit a CSR for a fresh certificate key and download the chain
    async fn finalize(
        &self,
        order: &mut Order,
        request: &IssuanceRequest,
    ) -> Result<CertificateBundle, AcmeError> {
        info!(key_type = ?self.key_type, "Finalizing certificate order");

        let cert_key = generate_certificate_key(self.key_type)?;
        let params = rcgen::CertificateParams::new(request.domains().to_vec())
            .map_err(|e| AcmeError::Finalization(format!("Failed to create CSR params: {}", e)))?;
        let csr = params
            .serialize_request(&cert_key)
            .map_err(|e| AcmeError::Finalization(format!("Failed to serialize CSR: {}", e)))?
            .der()
            .to_vec();

        order
            .finalize_csr(&csr)
            .await
            .map_err(|e| AcmeError::Finalization(format!("Failed to finalize order: {}", e)))?;

        let started = tokio::time::Instant::now();
        let timeout = self.settings.issuance_timeout();
        let issuer_url = loop {
            let state = order
                .refresh()
                .await
                .map_err(|e| AcmeError::Finalization(format!("Failed to refresh order: {}", e)))?;

            match state.status {
                OrderStatus::Valid => break state.certificate.clone().unwrap_or_default(),
                OrderStatus::Invalid => {
                    return Err(AcmeError::Finalization("Order became invalid".to_string()));
                }
                _ => {
                    if started.elapsed() > timeout {
                        return Err(AcmeError::Timeout {
                            message: "waiting for certificate".to_string(),
                            elapsed: started.elapsed(),
                        });
                    }
                    tokio::time::sleep(self.settings.poll_interval()).await;
                }
            }
        };

        let chain = order
            .certificate()
            .await
            .map_err(|e| AcmeError::Finalization(format!("Failed to get certificate: {}", e)))?
            .ok_or_else(|| AcmeError::Finalization("No certificate in response".to_string()))?;

        let certificate_pem = if request.bundle() {
            chain
        } else {
            leaf_certificate(&chain).ok_or_else(|| {
                AcmeError::Finalization("Certificate chain has no PEM block".to_string())
            })?
        };

        Ok(CertificateBundle {
            domain: request.primary_domain().to_string(),
            certificate_pem,
            private_key_pem: cert_key.serialize_pem(),
            issuer_url,
        })
    }
}

#[async_trait]
impl CertificateAuthority for AcmeAuthority {
    async fn register(
        &mut self,
        user: &dyn AcmeUser,
        options: &RegisterOptions,
    ) -> Result<Registration, AcmeError> {
        if self.account.is_some() {
            return Err(AcmeError::AccountCreation(
                "An account is already registered with this authority".to_string(),
            ));
        }

        let registration = register_account(&self.http, &self.directory_url, user, options).await?;
        let credentials =
            account_credentials(&registration, user.account_key(), &self.directory_url)?;

        let builder = match self.order_http.take() {
            Some(http) => Account::builder_with_http(http),
            None => Account::builder().map_err(|e| AcmeError::AccountCreation(e.to_string()))?,
        };
        let account = builder
            .from_credentials(credentials)
            .await
            .map_err(|e| AcmeError::AccountCreation(e.to_string()))?;

        self.account = Some(account);
        info!(account_url = %registration.uri, "ACME account ready");

        Ok(registration)
    }

    fn set_dns01_solver(&mut self, solver: Arc<dyn ChallengeSolver>) -> Result<(), AcmeError> {
        if self.solver.is_some() {
            return Err(AcmeError::SolverAlreadySet);
        }
        debug!(solver = ?solver, "DNS-01 solver attached");
        self.solver = Some(solver);
        Ok(())
    }

    async fn obtain(&mut self, request: &IssuanceRequest) -> Result<CertificateBundle, AcmeError> {
        let solver = self.solver.clone().ok_or(AcmeError::NoDnsSolver)?;
        let account = self.account.as_ref().ok_or(AcmeError::NoAccount)?;

        let identifiers: Vec<Identifier> = request
            .domains()
            .iter()
            .map(|d| Identifier::Dns(d.clone()))
            .collect();

        info!(domains = ?request.domains(), "Creating certificate order with DNS-01 challenges");

        let mut order = account
            .new_order(&NewOrder::new(&identifiers))
            .await
            .map_err(|e| AcmeError::OrderCreation(e.to_string()))?;

        let mut presented = Vec::new();
        let validation = self.validate(&mut order, solver.as_ref(), &mut presented).await;

        // Records come down whatever the validation outcome
        cleanup_presented(solver.as_ref(), &presented).await;
        validation?;

        let bundle = self.finalize(&mut order, request).await?;
        info!(
            domain = %bundle.domain,
            certificate_url = %bundle.issuer_url,
            "Certificate issued"
        );

        Ok(bundle)
    }
}

impl std::fmt::Debug for AcmeAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeAuthority")
            .field("directory_url", &self.directory_url)
            .field("key_type", &self.key_type)
            .field("has_account", &self.account.is_some())
            .field("has_solver", &self.solver.is_some())
            .finish()
    }
}

async fn cleanup_presented(solver: &dyn ChallengeSolver, presented: &[PresentedChallenge]) {
    for challenge in presented {
        if let Err(e) = solver
            .cleanup(&challenge.domain, &challenge.token, &challenge.key_authorization)
            .await
        {
            warn!(
                domain = %challenge.domain,
                error = %e,
                "Failed to clean up challenge record"
            );
        }
    }
}

fn generate_certificate_key(key_type: CertificateKeyType) -> Result<rcgen::KeyPair, AcmeError> {
    let generated = match key_type {
        CertificateKeyType::Rsa2048 => {
            rcgen::KeyPair::generate_rsa_for(&rcgen::PKCS_RSA_SHA256, rcgen::RsaKeySize::_2048)
        }
        CertificateKeyType::EcdsaP256 => rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256),
        CertificateKeyType::EcdsaP384 => rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384),
    };

    generated.map_err(|e| AcmeError::Finalization(format!("Failed to generate key: {}", e)))
}
