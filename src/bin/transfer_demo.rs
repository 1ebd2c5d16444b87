//! End-to-end walkthrough against a live wallet backend: negotiate a
//! quote, commit it, poll the transfer to a terminal state, then show
//! the refreshed balances.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wallet_transfer_client::{
    ClientConfig, HttpBackend, IdempotencyKey, QuoteRequest, QuoteSide, TransferService,
};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ClientConfig::from_env()?;
    let backend = HttpBackend::new(&config).context("Failed to build HTTP backend")?;
    let service = TransferService::new(Arc::new(backend), &config);

    let balances = service.get_balances().await?;
    for balance in &balances {
        info!(
            asset = %balance.asset,
            native = balance.native_balance,
            usd = balance.usd_value,
            "Balance before transfer"
        );
    }

    let request = QuoteRequest::new("BTC", "USDT", 0.001, QuoteSide::SourceGiven);
    let quote = service.create_quote(&request).await?;
    info!(
        quote_id = %quote.id,
        rate = quote.rate,
        expires_at = %quote.expires_at,
        "Quote negotiated"
    );

    let key = IdempotencyKey::new();
    let transfer = service.accept_quote(&quote, &key).await?;
    info!(transaction_id = %transfer.transaction_id, status = %transfer.status, "Committed");

    let mut status = transfer.status;
    for _ in 0..MAX_POLLS {
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
        let current = service.get_status(&transfer.transaction_id).await?;
        if current.status != status {
            info!(status = %current.status, "Transfer progressed");
            status = current.status;
        }
    }
    if !status.is_terminal() {
        warn!(
            transaction_id = %transfer.transaction_id,
            "Transfer still settling; check again later"
        );
    }

    let balances = service.refresh_balances().await?;
    for balance in &balances {
        info!(
            asset = %balance.asset,
            native = balance.native_balance,
            usd = balance.usd_value,
            "Balance after transfer"
        );
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wallet_transfer_client=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
