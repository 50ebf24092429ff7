//! Secret store access
//!
//! The run reads the DNS provider credential from, and writes the issued
//! certificate record to, a HashiCorp Vault KV version 2 mount.
//!
//! - [`KvStore`] - read / write a path, implemented by [`VaultKvClient`]
//! - [`SecretPersister`] - the two operations an issuance run needs, with
//!   errors mapped into [`crate::IssuerError`]

mod client;
mod error;
mod persister;

pub use client::{KvStore, VaultConnection, VaultKvClient, DEFAULT_VAULT_ADDR};
pub use error::VaultError;
pub use persister::{SecretPersister, SecretRecord};
