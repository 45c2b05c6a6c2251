use serde::{Deserialize, Deserializer, Serialize};

use crate::channels::OUTBOUND_CHANNEL;

/// An inbound MQTT publish, as delivered to the inbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload bytes (serialized as an array of byte values).
    pub payload: Vec<u8>,
    /// QoS level the message was received with (0-2).
    pub qos: u8,
    /// Broker host the bridge is connected to.
    pub host: String,
    /// Broker port the bridge is connected to.
    pub port: u16,
    /// Channel a consumer should send replies to.
    pub reply_channel: String,
}

impl Envelope {
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        qos: u8,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            host: host.into(),
            port,
            reply_channel: OUTBOUND_CHANNEL.to_string(),
        }
    }

    /// Convert into the message object sent over the channel layer.
    pub fn to_message(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// A message read from the outbound channel, to be published on MQTT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub topic: String,
    /// Accepts either a string (sent as UTF-8) or an array of byte values.
    #[serde(deserialize_with = "text_or_bytes")]
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Decode a channel-layer message object.
    pub fn from_message(message: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(message)
    }
}

fn text_or_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Text(String),
        Bytes(Vec<u8>),
    }

    Ok(match Payload::deserialize(deserializer)? {
        Payload::Text(text) => text.into_bytes(),
        Payload::Bytes(bytes) => bytes,
    })
}
