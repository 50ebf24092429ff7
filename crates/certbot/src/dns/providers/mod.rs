//! DNS provider implementations
//!
//! Available providers:
//! - [`BunnyProvider`] - bunny.net DNS API
//! - [`HetznerProvider`] - Hetzner DNS API

mod bunny;
mod hetzner;

pub use bunny::BunnyProvider;
pub use hetzner::HetznerProvider;

use std::sync::Arc;

use tracing::info;

use super::provider::DnsProvider;
use super::solver::{ChallengeSolver, Dns01Solver};
use crate::config::DnsSettings;
use crate::error::{IssuerError, IssuerResult};

/// Build the DNS-01 solver for a provider name
///
/// `credential` is the provider's API secret, handed over by the caller.
/// Names match case-insensitively.
pub fn resolve_solver(
    provider_name: &str,
    credential: &str,
    settings: &DnsSettings,
) -> IssuerResult<Arc<dyn ChallengeSolver>> {
    let timeout = settings.api_timeout();

    let provider: Arc<dyn DnsProvider> = match provider_name.to_ascii_lowercase().as_str() {
        "bunny" => Arc::new(BunnyProvider::new(credential, timeout)?),
        "hetzner" => Arc::new(HetznerProvider::new(credential, timeout)?),
        _ => return Err(IssuerError::UnknownProvider(provider_name.to_string())),
    };

    info!(
        provider = %provider.name(),
        propagation_check = settings.propagation.enabled,
        "DNS-01 solver configured"
    );

    Ok(Arc::new(Dns01Solver::new(provider, &settings.propagation)?))
}
