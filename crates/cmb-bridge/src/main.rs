//! cmb-bridge: relays between an MQTT broker and a channel layer.
//!
//! Every broker publish is forwarded to `mqtt.sub`; every message on
//! `mqtt.pub` is published to the broker. Runs until SIGINT or SIGTERM.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use cmb_bridge::{Args, ShutdownFlag, bridge, logging, shutdown};
use cmb_layers::LayerRegistry;
use cmb_mqtt::MqttConnector;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Args::parse().into_config();
    logging::init_tracing(config.verbosity, config.log_json);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting channel layer ({}) -> MQTT ({})",
        config.channel_ref,
        config.mqtt.broker_addr()
    );

    let stop = ShutdownFlag::new();
    shutdown::spawn_signal_listener(stop.clone()).context("failed to install signal handlers")?;

    let registry = LayerRegistry::with_defaults();
    match bridge::run(&config, &registry, &MqttConnector, stop).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "bridge failed");
            eprintln!("cmb-bridge: {e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
