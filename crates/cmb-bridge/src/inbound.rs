//! Inbound relay: MQTT publish → `mqtt.sub`.

use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::{ConnectReturnCode, Publish};

use cmb_layers::{ChannelLayer, LayerResult};
use cmb_mqtt::{InboundHandler, envelope_from_publish};
use cmb_protocol::INBOUND_CHANNEL;

use crate::stats::RelayStats;

/// Forwards every broker publish onto the inbound channel.
///
/// Runs on the broker connector's task. A failed send is logged and the
/// message dropped; the session stays up.
pub struct InboundRelay {
    layer: Arc<dyn ChannelLayer>,
    host: String,
    port: u16,
    stats: Arc<RelayStats>,
}

impl InboundRelay {
    pub fn new(
        layer: Arc<dyn ChannelLayer>,
        host: impl Into<String>,
        port: u16,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            layer,
            host: host.into(),
            port,
            stats,
        }
    }

    /// Wrap `publish` in an envelope and send it to `mqtt.sub`.
    pub async fn forward(&self, publish: &Publish) -> LayerResult<()> {
        let envelope = envelope_from_publish(publish, &self.host, self.port);
        let message = envelope.to_message()?;
        self.layer.send(INBOUND_CHANNEL, message).await
    }
}

#[async_trait]
impl InboundHandler for InboundRelay {
    async fn on_connect(&self, code: ConnectReturnCode) {
        tracing::info!(
            broker = %format!("{}:{}", self.host, self.port),
            code = ?code,
            "broker session up, relaying all topics"
        );
    }

    async fn on_message(&self, publish: Publish) {
        match self.forward(&publish).await {
            Ok(()) => {
                self.stats.record_inbound_forwarded();
                tracing::debug!(topic = %publish.topic, bytes = publish.payload.len(), "relayed inbound message");
            }
            Err(e) => {
                self.stats.record_inbound_dropped();
                tracing::error!(
                    error = %e,
                    topic = %publish.topic,
                    "failed to relay inbound message, dropping"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmb_layers::MockLayer;
    use rumqttc::QoS;
    use serde_json::json;

    fn relay(layer: Arc<MockLayer>) -> (InboundRelay, Arc<RelayStats>) {
        let stats = Arc::new(RelayStats::default());
        let relay = InboundRelay::new(layer, "broker.local", 1883, stats.clone());
        (relay, stats)
    }

    #[tokio::test]
    async fn publish_becomes_envelope_on_inbound_channel() {
        let layer = Arc::new(MockLayer::new());
        let (relay, stats) = relay(layer.clone());

        relay
            .on_message(Publish::new("sensors/temp", QoS::AtLeastOnce, b"21.5".to_vec()))
            .await;

        let sent = layer.sent();
        assert_eq!(sent.len(), 1);
        let (channel, message) = &sent[0];
        assert_eq!(channel, "mqtt.sub");
        assert_eq!(
            *message,
            json!({
                "topic": "sensors/temp",
                "payload": [50, 49, 46, 53],
                "qos": 1,
                "host": "broker.local",
                "port": 1883,
                "reply_channel": "mqtt.pub",
            })
        );
        assert_eq!(stats.snapshot().inbound_forwarded, 1);
    }

    #[tokio::test]
    async fn failed_send_is_dropped_and_next_message_still_relayed() {
        let layer = Arc::new(MockLayer::new());
        let (relay, stats) = relay(layer.clone());
        layer.fail_next_sends(1);

        relay
            .on_message(Publish::new("a", QoS::AtMostOnce, b"1".to_vec()))
            .await;
        relay
            .on_message(Publish::new("b", QoS::AtMostOnce, b"2".to_vec()))
            .await;

        assert_eq!(layer.send_attempts(), 2);
        let sent = layer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1["topic"], "b");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.inbound_dropped, 1);
        assert_eq!(snapshot.inbound_forwarded, 1);
    }
}
