//! Channel layer error types.

use thiserror::Error;

/// Errors raised while resolving or using a channel layer.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("invalid layer reference '{0}': expected 'module.path:attribute.path'")]
    InvalidReference(String),

    #[error("cannot resolve channel layer: {0}")]
    Resolution(String),

    #[error("invalid channel name '{0}'")]
    InvalidChannelName(String),

    #[error("channel '{0}' is full")]
    ChannelFull(String),

    #[error("delivery to '{channel}' failed: {reason}")]
    Delivery { channel: String, reason: String },

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LayerError {
    pub(crate) fn delivery(channel: &str, reason: impl ToString) -> Self {
        Self::Delivery {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias for channel layer results.
pub type LayerResult<T> = Result<T, LayerError>;
