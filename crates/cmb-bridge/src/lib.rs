//! Channel-layer bridge runtime.
//!
//! Wires a broker connector and a channel layer together:
//! - inbound: every MQTT publish becomes an envelope on `mqtt.sub`
//! - outbound: every message on `mqtt.pub` becomes an MQTT publish
//!
//! The binary in `main.rs` only parses arguments and installs logging and
//! signal handling; everything else lives here so it can be tested with
//! the mock connector and mock layer.

pub mod bridge;
pub mod config;
pub mod error;
pub mod inbound;
pub mod logging;
pub mod outbound;
pub mod shutdown;
pub mod state;
pub mod stats;

pub use config::{Args, BridgeConfig};
pub use error::BridgeError;
pub use shutdown::ShutdownFlag;
pub use state::{BridgeState, Lifecycle};
pub use stats::{RelayStats, StatsSnapshot};
