//! `blobseal`: create the demo key, upload the demo text encrypted, read it
//! back and print it.
//!
//! Takes no arguments. Credentials come from `CLIENT_ID`, `CLIENT_SECRET`
//! and `TENANT_ID`; `BLOBSEAL_*` variables override the defaults and
//! `RUST_LOG` controls log output on stderr.

use anyhow::Context;
use blobseal_cloud::CloudConfig;
use blobseal_cloud::credential::ClientSecretCredential;
use blobseal_cloud::http::build_client;
use blobseal_cloud::workflow::{self, DEMO_PLAINTEXT};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

async fn run() -> anyhow::Result<String> {
    let config = CloudConfig::from_env().context("invalid configuration")?;
    let http = build_client(&config).context("failed to build HTTP client")?;
    let credential = ClientSecretCredential::from_env(http, &config)?;

    let result = workflow::run(&config, Arc::new(credential), DEMO_PLAINTEXT.as_bytes())
        .await
        .with_context(|| {
            format!("round trip of {}/{} failed", config.container, config.blob_name)
        })?;

    Ok(result.text())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    match run().await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
