//! Shared test harness for E2E tests.
//!
//! Runs the real bridge orchestration against a `MockConnector` and a
//! registered channel layer, so both relay directions go through the same
//! code paths as the binary.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use cmb_bridge::{BridgeConfig, BridgeError, ShutdownFlag, StatsSnapshot, bridge};
use cmb_layers::{ChannelLayer, LayerRegistry, LayerSettings, MemoryLayer, Message};
use cmb_mqtt::{MockConnector, QoS};
use cmb_protocol::INBOUND_CHANNEL;

/// Reference the harness registers its layer under.
pub const TEST_LAYER: &str = "tests.bridge:channel_layer";

/// Broker address the harness configures; appears in every envelope.
pub const BROKER_HOST: &str = "broker.test";
pub const BROKER_PORT: u16 = 1884;

/// Upper bound for any single wait in a test.
const WAIT: Duration = Duration::from_secs(3);

/// A running bridge wired to a mock broker.
pub struct TestHarness<L> {
    pub layer: Arc<L>,
    pub connector: Arc<MockConnector>,
    pub shutdown: ShutdownFlag,
    bridge: JoinHandle<Result<StatsSnapshot, BridgeError>>,
}

/// Default config: test broker address, short receive timeout.
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::new(TEST_LAYER.parse().unwrap());
    config.mqtt.broker_host = BROKER_HOST.to_string();
    config.mqtt.broker_port = BROKER_PORT;
    config.layer.receive_timeout_ms = 50;
    config
}

/// Memory layer matching `test_config`'s settings.
pub fn memory_layer() -> Arc<MemoryLayer> {
    Arc::new(MemoryLayer::new(&LayerSettings {
        receive_timeout_ms: 50,
        ..LayerSettings::default()
    }))
}

impl TestHarness<MemoryLayer> {
    /// Bridge over an in-process memory layer.
    pub async fn memory() -> Self {
        Self::start(memory_layer(), test_config()).await
    }
}

impl<L: ChannelLayer + 'static> TestHarness<L> {
    /// Start the bridge with `layer` registered as `TEST_LAYER` and wait
    /// until the mock broker session is up.
    pub async fn start(layer: Arc<L>, config: BridgeConfig) -> Self {
        let mut registry = LayerRegistry::new();
        registry
            .register_instance(TEST_LAYER, layer.clone())
            .unwrap();

        let connector = Arc::new(MockConnector::new());
        let shutdown = ShutdownFlag::new();

        let bridge = {
            let connector = connector.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { bridge::run(&config, &registry, connector.as_ref(), shutdown).await })
        };

        let harness = Self {
            layer,
            connector,
            shutdown,
            bridge,
        };
        let connector = harness.connector.clone();
        wait_for(move || connector.is_connected()).await;
        harness
    }

    /// Inject an inbound broker publish.
    pub async fn deliver(&self, topic: &str, payload: &[u8], qos: QoS) {
        assert!(
            self.connector.deliver(topic, payload, qos).await,
            "no broker session"
        );
    }

    /// Queue a message on the outbound channel.
    pub async fn send_outbound(&self, message: Message) {
        self.layer
            .send(cmb_protocol::OUTBOUND_CHANNEL, message)
            .await
            .unwrap();
    }

    /// Wait until the mock broker has seen `count` publishes.
    pub async fn wait_for_published(&self, count: usize) {
        let channel = self.connector.channel();
        wait_for(move || channel.published().len() >= count).await;
    }

    /// Trigger shutdown and wait for the bridge to finish.
    pub async fn stop(self) -> Result<StatsSnapshot, BridgeError> {
        self.shutdown.trigger();
        tokio::time::timeout(WAIT, self.bridge)
            .await
            .expect("bridge did not stop in time")
            .expect("bridge task panicked")
    }
}

impl TestHarness<MemoryLayer> {
    /// Take the next envelope from the inbound channel, if any.
    pub async fn next_inbound(&self) -> Option<Message> {
        self.layer
            .receive(&[INBOUND_CHANNEL], false)
            .await
            .unwrap()
            .map(|(_, message)| message)
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
