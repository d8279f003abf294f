use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, Utc};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod walkthrough;

use shared_config::AppConfig;
use sync_cell::{ChangeBus, LocalChangeBus};
use portal_cell::PortalContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting care portal sync");

    let config = AppConfig::from_env();
    info!(
        "Using {} storage, flushing every {} ms",
        config.storage_backend, config.flush_interval_ms
    );

    // One bus for the process; every portal context joins it
    let bus: Arc<dyn ChangeBus> = Arc::new(LocalChangeBus::with_capacity(config.bus_capacity));

    let patient_tab = PortalContext::connect(&config, bus.clone()).await;
    let doctor_tab = PortalContext::connect(&config, bus).await;

    let today = Local::now().date_naive();
    walkthrough::run(&patient_tab, &doctor_tab, today, Utc::now())
        .await
        .context("portal walkthrough failed")?;

    // Give the periodic flush a chance to run once before shutting down
    tokio::time::sleep(config.flush_interval().min(Duration::from_secs(2))).await;

    patient_tab.close().await.context("closing patient portal")?;
    doctor_tab.close().await.context("closing doctor portal")?;

    info!("Care portal sync stopped");
    Ok(())
}
