//! Bridge orchestration.
//!
//! Resolves the channel layer, opens the broker session with the inbound
//! relay attached, then runs the outbound loop in its own task until the
//! shutdown flag is set. The session is disconnected exactly once on the
//! way out, even when the outbound task panicked.

use std::sync::Arc;

use cmb_layers::LayerRegistry;
use cmb_mqtt::Connector;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::inbound::InboundRelay;
use crate::outbound;
use crate::shutdown::ShutdownFlag;
use crate::state::{BridgeState, Lifecycle};
use crate::stats::{RelayStats, StatsSnapshot};

/// Run the bridge until `shutdown` is triggered.
///
/// Returns the relay counters on a clean stop. Layer resolution happens
/// before any broker contact, so a bad reference never opens a session.
pub async fn run(
    config: &BridgeConfig,
    registry: &LayerRegistry,
    connector: &dyn Connector,
    shutdown: ShutdownFlag,
) -> Result<StatsSnapshot, BridgeError> {
    run_with_lifecycle(config, registry, connector, shutdown, &mut Lifecycle::new()).await
}

/// [`run`], recording every state the bridge passes through in `lifecycle`.
pub async fn run_with_lifecycle(
    config: &BridgeConfig,
    registry: &LayerRegistry,
    connector: &dyn Connector,
    shutdown: ShutdownFlag,
    lifecycle: &mut Lifecycle,
) -> Result<StatsSnapshot, BridgeError> {
    let layer = match registry.resolve(&config.channel_ref, &config.layer).await {
        Ok(layer) => layer,
        Err(e) => {
            lifecycle.advance(BridgeState::Stopped);
            return Err(BridgeError::Resolution(e));
        }
    };
    tracing::info!(layer = %config.channel_ref, "channel layer ready");

    let stats = Arc::new(RelayStats::default());
    let relay = Arc::new(InboundRelay::new(
        layer.clone(),
        config.mqtt.broker_host.clone(),
        config.mqtt.broker_port,
        stats.clone(),
    ));

    let channel = match connector.connect(&config.mqtt, relay).await {
        Ok(channel) => channel,
        Err(e) => {
            lifecycle.advance(BridgeState::Stopped);
            return Err(BridgeError::Connection(e));
        }
    };
    lifecycle.advance(BridgeState::Connected);

    let outbound = tokio::spawn(outbound::run(
        layer,
        channel.clone(),
        shutdown,
        stats.clone(),
    ));
    lifecycle.advance(BridgeState::Running);

    let joined = outbound.await;
    lifecycle.advance(BridgeState::Stopping);

    if let Err(e) = channel.disconnect().await {
        tracing::error!(error = %e, "broker disconnect failed");
    }
    lifecycle.advance(BridgeState::Stopped);

    let snapshot = stats.snapshot();
    tracing::info!(
        inbound_forwarded = snapshot.inbound_forwarded,
        inbound_dropped = snapshot.inbound_dropped,
        outbound_published = snapshot.outbound_published,
        outbound_dropped = snapshot.outbound_dropped,
        "bridge stopped"
    );

    joined.map_err(|e| BridgeError::Aborted(e.to_string()))?;
    Ok(snapshot)
}
