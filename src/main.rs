use anyhow::Context;
use autarco_monitor::config::{InverterConfig, SCAN_INTERVAL};
use autarco_monitor::error::report_error;
use autarco_monitor::integration::InverterIntegration;
use autarco_monitor::inverter_client::InverterClient;
use autarco_monitor::sensor::SensorUpdate;
use std::env;
use tokio::sync::mpsc::{self, Receiver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting Autarco inverter monitor");
    let config = InverterConfig::from_env().context("Invalid AUTARCO_* configuration")?;
    let entry_id = env::var("AUTARCO_ENTRY_ID").unwrap_or_else(|_| config.name.clone());

    // Same check the setup form does, a failure here is not fatal since the
    // inverter is unreachable at night
    let client = InverterClient::new(&config)?;
    if let Err(e) = client.probe().await {
        tracing::warn!(url = %client.endpoint_url(), "Inverter did not answer the connection check: {e}");
    }

    let (update_tx, update_rx) = mpsc::channel::<SensorUpdate>(32);
    let mut integration = InverterIntegration::new();
    integration.setup_entry(&entry_id, config, Some(update_tx))?;
    integration.start_entry(&entry_id, SCAN_INTERVAL)?;

    tokio::select! {
        _ = log_updates(update_rx) => {},
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                report_error("waiting for shutdown", &e);
            }
            tracing::info!("Shutting down");
        }
    }

    integration.remove_entry(&entry_id);
    Ok(())
}

/// Stands in for the host's state machine: every published state is logged.
async fn log_updates(mut updates: Receiver<SensorUpdate>) {
    let mut last_published = std::collections::HashMap::new();
    while let Some(update) = updates.recv().await {
        // Skip identical writes, the power sensor republishes every scan
        if last_published.get(&update.entity_id) == Some(&update) {
            continue;
        }
        match serde_json::to_string(&update) {
            Ok(json) => tracing::info!(entity_id = %update.entity_id, state = %update.state, "{json}"),
            Err(e) => tracing::warn!("Could not serialise state of {}: {e}", update.entity_id),
        }
        last_published.insert(update.entity_id.clone(), update);
    }
}
