//! Inbound callbacks fired from the MQTT event loop.

use async_trait::async_trait;
use rumqttc::{ConnectReturnCode, Publish, QoS};

use cmb_protocol::Envelope;

/// Receives session events from the broker connector's background loop.
///
/// Callbacks run on the connector's task, concurrently with whatever the
/// rest of the process is doing.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Called once the session is established and again after every reconnect.
    async fn on_connect(&self, code: ConnectReturnCode);

    /// Called for every PUBLISH received from the broker.
    async fn on_message(&self, publish: Publish);
}

/// Numeric QoS level as it appears on the wire.
pub fn qos_level(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

/// Build the envelope relayed for an inbound publish.
pub fn envelope_from_publish(publish: &Publish, host: &str, port: u16) -> Envelope {
    Envelope::new(
        publish.topic.clone(),
        publish.payload.to_vec(),
        qos_level(publish.qos),
        host,
        port,
    )
}
