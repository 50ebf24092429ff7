//! ACME account identity
//!
//! The account key is the identity proof presented to the CA. It is an
//! ECDSA P-256 key generated fresh for every run and never persisted; the
//! certificate's own key is generated separately at finalization time.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde_json::{json, Value};

use crate::error::{IssuerError, IssuerResult};

/// JWS algorithm name for the account key
pub const ACCOUNT_KEY_ALG: &str = "ES256";

/// ECDSA P-256 account key pair
pub struct AccountKey {
    pkcs8: Vec<u8>,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl AccountKey {
    /// Generate a new account key from the system CSPRNG
    pub fn generate() -> IssuerResult<Self> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|e| IssuerError::Generation(format!("key generation failed: {e:?}")))?;

        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| IssuerError::Generation(format!("generated key rejected: {e}")))?;

        Ok(Self {
            pkcs8: pkcs8.as_ref().to_vec(),
            key_pair,
            rng,
        })
    }

    /// PKCS#8 DER encoding of the private key
    pub fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8
    }

    /// Uncompressed SEC1 public point (0x04 || x || y)
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// Public key as a JSON Web Key
    pub fn jwk(&self) -> Value {
        // 65 bytes: 0x04 prefix, 32 bytes x, 32 bytes y
        let point = self.public_key();
        json!({
            "crv": "P-256",
            "kty": "EC",
            "x": URL_SAFE_NO_PAD.encode(&point[1..33]),
            "y": URL_SAFE_NO_PAD.encode(&point[33..65]),
        })
    }

    /// Sign a JWS signing input, returning the fixed-length r||s signature
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, ring::error::Unspecified> {
        let signature = self.key_pair.sign(&self.rng, message)?;
        Ok(signature.as_ref().to_vec())
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("alg", &ACCOUNT_KEY_ALG)
            .finish_non_exhaustive()
    }
}

/// Account record returned by the CA after registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Account URL (the `kid` for subsequent requests)
    pub uri: String,
    /// Account status as reported by the CA
    pub status: String,
    /// Contact URIs registered with the account
    pub contact: Vec<String>,
}

/// What a CA client needs from the account holder
pub trait AcmeUser: Send + Sync {
    /// Contact email for the account
    fn email(&self) -> &str;

    /// Key used to sign account requests
    fn account_key(&self) -> &AccountKey;

    /// Registration, once the CA has accepted the account
    fn registration(&self) -> Option<&Registration>;
}

/// Process-local ACME account identity
#[derive(Debug)]
pub struct AccountIdentity {
    email: String,
    key: AccountKey,
    registration: Option<Registration>,
}

impl AccountIdentity {
    /// Bind an email to an account key. The identity starts unregistered.
    pub fn new(email: impl Into<String>, key: AccountKey) -> Self {
        Self {
            email: email.into(),
            key,
            registration: None,
        }
    }

    /// Record the CA registration. Only the first call succeeds.
    pub fn set_registration(&mut self, registration: Registration) -> IssuerResult<()> {
        if self.registration.is_some() {
            return Err(IssuerError::AlreadyRegistered);
        }
        self.registration = Some(registration);
        Ok(())
    }
}

impl AcmeUser for AccountIdentity {
    fn email(&self) -> &str {
        &self.email
    }

    fn account_key(&self) -> &AccountKey {
        &self.key
    }

    fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }
}
