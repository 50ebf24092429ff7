//! Zentinel Certbot - Main entry point
//!
//! Issues the configured wildcard certificate once and stores it in Vault.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use zentinel_certbot::config::CONFIG_ENV;
use zentinel_certbot::{pipeline, AcmeAuthority, IssuerConfig, VaultConnection, VaultKvClient};

/// Issue a wildcard certificate via ACME DNS-01 and store it in Vault KV
#[derive(Parser, Debug)]
#[command(name = "zentinel-certbot")]
#[command(author, version, about, long_about = None)]
#[command(after_help = concat!(
    "Configuration is read from the file named by ZENTINEL_CERTBOT_CONFIG (.toml or .json).\n",
    "Vault is reached through VAULT_ADDR, VAULT_TOKEN and VAULT_NAMESPACE."
))]
struct Cli {
    /// Use the Let's Encrypt staging directory
    #[arg(long)]
    staging: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(cli).await {
        error!("Certificate issuance failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let config = IssuerConfig::load()
        .with_context(|| format!("Failed to load configuration (see {})", CONFIG_ENV))?;
    config.validate().context("Invalid configuration")?;

    let directory_url = config.directory_url(cli.staging);
    info!(
        directory = %directory_url,
        staging = cli.staging,
        domains = ?config.domains,
        provider = %config.dns_provider,
        "Starting certificate issuance"
    );

    let connection = VaultConnection::from_env(config.vault.timeout())
        .context("Failed to configure Vault connection")?;
    let store = VaultKvClient::new(connection, config.kv_mount.clone())
        .context("Failed to create Vault client")?;
    let ca = AcmeAuthority::new(directory_url, config.key_type, config.acme.clone())
        .context("Failed to create ACME client")?;

    let report = pipeline::run(&config, ca, store).await?;

    info!(
        serial = %report.serial,
        domains = ?report.domains,
        "Certificate stored in Vault at {}/{} (expires: {})",
        config.kv_mount,
        report.certificate_path,
        report.expires_at
    );

    Ok(())
}
