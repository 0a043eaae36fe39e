//! Gateway client binary
//!
//! Connects to the gateway, logs every notification and shuts down cleanly
//! on Ctrl+C or on a fatal gateway error.
//!
//! Usage:
//!   cargo run --bin gateway_client
//!
//! Required environment variables:
//!   DISCORD_TOKEN - Bot token
//!
//! Optional:
//!   GATEWAY_CONFIG_PATH - Settings file (default: config/gateway.yaml)
//!   RUST_LOG            - Overrides `log_level` from the settings file

use anyhow::{Context, Result};
use cordlink::bin_common::{init_tracing, load_config_from_env, BotSettings, ConfigType, ShutdownManager};
use cordlink::gatewire::{ChannelNotifier, GatewayClient, GatewayEvent, Notification};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// How often connection status is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = load_config_from_env(ConfigType::Gateway);
    let settings = BotSettings::load(&config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;

    init_tracing(&settings.log_level);

    info!("========================================");
    info!("Starting gateway client");
    info!("  Settings: {}", config_path.display());
    info!("  Gateway:  {}", settings.gateway.url);
    info!("  Intents:  {}", settings.gateway.intents.join(", "));
    info!("========================================");

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let (notifier, events) = ChannelNotifier::new();
    let client = GatewayClient::new(settings.to_gateway_config()?, Arc::new(notifier))?;
    let logger = spawn_event_logger(events, shutdown.clone());

    client.connect()?;

    while shutdown.is_running() {
        shutdown.interruptible_sleep(STATUS_INTERVAL).await;
        if !shutdown.is_running() {
            break;
        }

        let metrics = client.metrics();
        info!(
            state = %metrics.connection_state,
            latency = ?client.latency(),
            received = metrics.frames_received,
            sent = metrics.frames_sent,
            reconnects = metrics.reconnect_count,
            "Status"
        );
    }

    client.shutdown().await?;

    // The notifier channel closes once the client is gone
    if logger.join().is_err() {
        error!("Event logger thread panicked");
    }

    info!("Gateway client stopped");
    Ok(())
}

/// Log notifications on a dedicated thread; a fatal error stops the process
fn spawn_event_logger(
    events: Receiver<Notification>,
    shutdown: ShutdownManager,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for notification in events.iter() {
            match notification {
                Notification::Event(GatewayEvent::ClientReady(ready)) => {
                    info!(
                        session_id = %ready.session_id,
                        application_id = %ready.application_id,
                        user = %ready.user["username"],
                        "Client ready"
                    );
                }
                Notification::Event(GatewayEvent::Dispatch { name, frame }) => {
                    info!(event = %name, seq = ?frame.s, "Dispatch");
                }
                Notification::Event(GatewayEvent::Raw(frame)) => {
                    debug!(op = frame.op, seq = ?frame.s, "Frame");
                }
                Notification::Error(e) => {
                    error!("Gateway error: {}", e);
                    if e.is_fatal() {
                        shutdown.trigger();
                    }
                }
            }
        }
    })
}
