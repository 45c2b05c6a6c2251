//! MQTT broker connector for the channel-layer bridge.
//!
//! Provides the broker side of the relay:
//! - `Channel` trait for publish/subscribe/disconnect (mockable in tests)
//! - `Connector` + `InboundHandler` for session setup and inbound callbacks
//! - `MqttChannel` / `MqttConnector` backed by `rumqttc`
//! - `MockChannel` / `MockConnector` for testing without a broker

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;

// Re-exports for convenience.
pub use channel::{Channel, Connector, MqttChannel, MqttConnector};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use handler::{InboundHandler, envelope_from_publish, qos_level};
pub use mock::{MockChannel, MockConnector};
pub use rumqttc::{ConnectReturnCode, Publish, QoS};
