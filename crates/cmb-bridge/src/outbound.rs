//! Outbound relay: `mqtt.pub` → MQTT publish.
//!
//! Polls the layer with a bounded blocking receive and checks the shutdown
//! flag between receives.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::QoS;
use thiserror::Error;

use cmb_layers::{ChannelLayer, Message};
use cmb_mqtt::{Channel, MqttError};
use cmb_protocol::topics::validate_publish_topic;
use cmb_protocol::{OUTBOUND_CHANNEL, OutboundMessage};

use crate::shutdown::ShutdownFlag;
use crate::stats::RelayStats;

/// Pause after a failed receive before polling again.
pub const RECEIVE_BACKOFF: Duration = Duration::from_millis(250);

/// Why an outbound message was dropped.
#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("malformed outbound message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Mqtt(#[from] MqttError),
}

/// Decode one outbound message and publish it at QoS 0.
///
/// Returns the topic it was published on.
pub async fn forward_outbound(
    channel: &dyn Channel,
    message: Message,
) -> Result<String, OutboundError> {
    let outbound = OutboundMessage::from_message(message)?;
    validate_publish_topic(&outbound.topic).map_err(MqttError::from)?;
    channel
        .publish(&outbound.topic, &outbound.payload, QoS::AtMostOnce)
        .await?;
    Ok(outbound.topic)
}

/// Relay `mqtt.pub` to the broker until `shutdown` is triggered.
pub async fn run(
    layer: Arc<dyn ChannelLayer>,
    channel: Arc<dyn Channel>,
    shutdown: ShutdownFlag,
    stats: Arc<RelayStats>,
) {
    let channels = [OUTBOUND_CHANNEL];
    tracing::info!(channel = OUTBOUND_CHANNEL, "outbound loop started");

    while !shutdown.is_triggered() {
        match layer.receive(&channels, true).await {
            Ok(Some((_, message))) => match forward_outbound(channel.as_ref(), message).await {
                Ok(topic) => {
                    stats.record_outbound_published();
                    tracing::debug!(topic = %topic, "published outbound message");
                }
                Err(e) => {
                    stats.record_outbound_dropped();
                    tracing::error!(error = %e, "failed to publish outbound message, dropping");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "channel layer receive failed, backing off");
                tokio::time::sleep(RECEIVE_BACKOFF).await;
            }
        }
    }

    tracing::info!("outbound loop stopped");
}
