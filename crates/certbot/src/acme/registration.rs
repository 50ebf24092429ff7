//! Account registration signed with the caller's account key
//!
//! `newAccount` is the one request that must carry the JWK of the account
//! key. It is sent here directly so the key generated for the run becomes
//! the account key; everything after it goes through `instant-acme` using
//! credentials rebuilt from the registration.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use instant_acme::AccountCredentials;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::authority::RegisterOptions;
use super::error::AcmeError;
use crate::account::{AccountKey, AcmeUser, Registration, ACCOUNT_KEY_ALG};

const JOSE_JSON: &str = "application/jose+json";
const REPLAY_NONCE: &str = "replay-nonce";

/// Subset of the ACME directory needed for registration
#[derive(Debug, Deserialize)]
struct Directory {
    #[serde(rename = "newNonce")]
    new_nonce: String,
    #[serde(rename = "newAccount")]
    new_account: String,
}

#[derive(Debug, Serialize)]
struct NewAccountPayload {
    contact: Vec<String>,
    #[serde(rename = "termsOfServiceAgreed")]
    terms_of_service_agreed: bool,
}

#[derive(Debug, Default, Deserialize)]
struct AccountResponse {
    status: Option<String>,
    contact: Option<Vec<String>>,
}

/// Register `user` with the CA behind `directory_url`
pub(super) async fn register_account(
    http: &Client,
    directory_url: &str,
    user: &dyn AcmeUser,
    options: &RegisterOptions,
) -> Result<Registration, AcmeError> {
    let directory = fetch_directory(http, directory_url).await?;
    let nonce = fetch_nonce(http, &directory.new_nonce).await?;

    info!(
        email = %user.email(),
        terms_of_service_agreed = options.terms_of_service_agreed,
        "Registering ACME account"
    );

    let payload = NewAccountPayload {
        contact: vec![format!("mailto:{}", user.email())],
        terms_of_service_agreed: options.terms_of_service_agreed,
    };
    let payload = serde_json::to_vec(&payload)
        .map_err(|e| AcmeError::AccountCreation(format!("Failed to encode payload: {}", e)))?;

    let key = user.account_key();
    let protected = protected_header(key, &directory.new_account, &nonce)?;
    let jws = sign_jws(key, &protected, &payload)?;
    let body = serde_json::to_vec(&jws)
        .map_err(|e| AcmeError::AccountCreation(format!("Failed to encode JWS: {}", e)))?;

    let response = http
        .post(&directory.new_account)
        .header(CONTENT_TYPE, JOSE_JSON)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(AcmeError::AccountCreation(format!(
            "CA rejected registration: HTTP {} - {}",
            status, error_text
        )));
    }

    let uri = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AcmeError::AccountCreation("No account URL in response".to_string()))?;

    let account: AccountResponse = response.json().await.unwrap_or_default();

    debug!(account_url = %uri, http_status = %status, "ACME account registered");

    Ok(Registration {
        uri,
        status: account.status.unwrap_or_else(|| "valid".to_string()),
        contact: account.contact.unwrap_or_default(),
    })
}

/// Credentials that let `instant-acme` act as the registered account
pub(super) fn account_credentials(
    registration: &Registration,
    key: &AccountKey,
    directory_url: &str,
) -> Result<AccountCredentials, AcmeError> {
    serde_json::from_value(json!({
        "id": registration.uri,
        "key_pkcs8": URL_SAFE_NO_PAD.encode(key.pkcs8_der()),
        "directory": directory_url,
    }))
    .map_err(|e| AcmeError::AccountCreation(format!("Failed to build account credentials: {}", e)))
}

async fn fetch_directory(http: &Client, url: &str) -> Result<Directory, AcmeError> {
    let directory_error = |message: String| AcmeError::Directory {
        url: url.to_string(),
        message,
    };

    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(directory_error(format!("HTTP {}", response.status())));
    }

    response
        .json()
        .await
        .map_err(|e| directory_error(format!("invalid directory document: {}", e)))
}

async fn fetch_nonce(http: &Client, new_nonce_url: &str) -> Result<String, AcmeError> {
    let response = http.head(new_nonce_url).send().await?;

    response
        .headers()
        .get(REPLAY_NONCE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AcmeError::AccountCreation("No nonce in response".to_string()))
}

fn protected_header(key: &AccountKey, url: &str, nonce: &str) -> Result<String, AcmeError> {
    let protected = json!({
        "alg": ACCOUNT_KEY_ALG,
        "jwk": key.jwk(),
        "nonce": nonce,
        "url": url,
    });

    let protected = serde_json::to_vec(&protected)
        .map_err(|e| AcmeError::AccountCreation(format!("Failed to encode header: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(protected))
}

fn sign_jws(key: &AccountKey, protected: &str, payload: &[u8]) -> Result<Value, AcmeError> {
    let payload = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{}.{}", protected, payload);

    let signature = key
        .sign(signing_input.as_bytes())
        .map_err(|e| AcmeError::AccountCreation(format!("Failed to sign JWS: {:?}", e)))?;

    Ok(json!({
        "protected": protected,
        "payload": payload,
        "signature": URL_SAFE_NO_PAD.encode(signature),
    }))
}
