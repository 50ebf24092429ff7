//! ACME certificate authority collaborator
//!
//! The issuance core talks to the CA through [`CertificateAuthority`]:
//! register an account, attach a DNS-01 solver, obtain a certificate.
//!
//! # Architecture
//!
//! - [`CertificateAuthority`] - narrow trait consumed by the orchestrator
//! - [`AcmeAuthority`] - production implementation on top of `instant-acme`
//! - account registration is signed with the caller's own account key, so
//!   the identity generated for the run is the one the CA knows
//!
//! # Challenge Flow (DNS-01)
//!
//! 1. A new order is created for the requested identifiers
//! 2. For each pending authorization the DNS-01 challenge is presented
//!    through the attached [`crate::dns::ChallengeSolver`]
//! 3. The challenge is marked ready and the order polled until `Ready`
//! 4. Presented records are cleaned up, whatever the validation outcome
//! 5. A CSR for a fresh certificate key finalizes the order
//! 6. The chain is downloaded once the order turns `Valid`

mod authority;
mod client;
mod error;
mod registration;

pub use authority::{CertificateAuthority, CertificateBundle, IssuanceRequest, RegisterOptions};
pub use client::AcmeAuthority;
pub use error::AcmeError;
