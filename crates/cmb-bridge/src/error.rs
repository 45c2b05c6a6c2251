//! Fatal bridge errors and their process exit codes.

use cmb_layers::LayerError;
use cmb_mqtt::MqttError;
use thiserror::Error;

/// Exit code for a bridge that could not resolve its channel layer.
pub const EXIT_RESOLUTION: u8 = 3;

/// Exit code for a bridge that could not reach its broker.
pub const EXIT_CONNECTION: u8 = 4;

/// Exit code for any other fatal failure.
pub const EXIT_FAILURE: u8 = 1;

/// Errors that stop the bridge.
///
/// Per-message failures never surface here; they are logged and the
/// message is dropped.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("channel layer: {0}")]
    Resolution(#[source] LayerError),

    #[error("broker: {0}")]
    Connection(#[source] MqttError),

    #[error("outbound loop aborted: {0}")]
    Aborted(String),
}

impl BridgeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Resolution(_) => EXIT_RESOLUTION,
            Self::Connection(_) => EXIT_CONNECTION,
            Self::Aborted(_) => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let resolution = BridgeError::Resolution(LayerError::Resolution("gone".into()));
        let connection = BridgeError::Connection(MqttError::Connection("refused".into()));
        let aborted = BridgeError::Aborted("panicked".into());

        assert_eq!(resolution.exit_code(), 3);
        assert_eq!(connection.exit_code(), 4);
        assert_eq!(aborted.exit_code(), 1);
    }

    #[test]
    fn display_keeps_cause() {
        let err = BridgeError::Connection(MqttError::Connection("refused".into()));
        assert_eq!(err.to_string(), "broker: connection error: refused");
    }
}
