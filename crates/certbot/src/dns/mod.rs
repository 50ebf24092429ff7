//! DNS-01 challenge solving
//!
//! The CA collaborator hands every pending DNS-01 challenge to a
//! [`ChallengeSolver`]. The production solver, [`Dns01Solver`], publishes the
//! `_acme-challenge` TXT record through a [`DnsProvider`], waits until public
//! resolvers serve it and removes it again on cleanup.
//!
//! # Providers
//!
//! - `bunny` - bunny.net DNS API ([`BunnyProvider`])
//! - `hetzner` - Hetzner DNS API ([`HetznerProvider`])
//!
//! Providers are resolved by name with [`resolve_solver`]; the API
//! credential is passed in explicitly, never read from the environment.

mod propagation;
mod provider;
mod providers;
mod solver;

pub use propagation::PropagationChecker;
pub use provider::{
    challenge_record_fqdn, normalize_domain, DnsProvider, DnsProviderError, DnsResult,
    ACME_CHALLENGE_RECORD, CHALLENGE_TTL,
};
pub use providers::{resolve_solver, BunnyProvider, HetznerProvider};
pub use solver::{compute_challenge_value, ChallengeSolver, Dns01Solver};
