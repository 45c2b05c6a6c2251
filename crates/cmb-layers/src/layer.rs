use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use cmb_protocol::is_valid_channel_name;

use crate::error::{LayerError, LayerResult};

/// A channel layer message: a JSON object.
pub type Message = serde_json::Value;

/// Named-channel message transport shared with the web application.
///
/// Implementations must tolerate `send` and `receive` running concurrently
/// from different tasks.
#[async_trait]
pub trait ChannelLayer: Send + Sync {
    /// Deliver `message` onto `channel`.
    async fn send(&self, channel: &str, message: Message) -> LayerResult<()>;

    /// Take the next message addressed to any of `channels`.
    ///
    /// With `block` set, waits up to the layer's receive timeout before
    /// giving up; otherwise returns immediately. `None` means nothing was
    /// available.
    async fn receive(&self, channels: &[&str], block: bool)
    -> LayerResult<Option<(String, Message)>>;
}

/// Tunables shared by the built-in layers.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSettings {
    /// Redis connection URL (Redis layer only).
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Key prefix for channel lists (Redis layer only).
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Maximum queued messages per channel.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Seconds a queued message stays deliverable.
    #[serde(default = "default_expiry")]
    pub expiry_secs: u64,
    /// Upper bound on a single blocking receive, in milliseconds.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_prefix() -> String {
    "asgi:".to_string()
}

fn default_capacity() -> usize {
    100
}

fn default_expiry() -> u64 {
    60
}

fn default_receive_timeout() -> u64 {
    1000
}

impl LayerSettings {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            prefix: default_prefix(),
            capacity: default_capacity(),
            expiry_secs: default_expiry(),
            receive_timeout_ms: default_receive_timeout(),
        }
    }
}

pub(crate) fn check_channel_name(name: &str) -> LayerResult<()> {
    if is_valid_channel_name(name) {
        Ok(())
    } else {
        Err(LayerError::InvalidChannelName(name.to_string()))
    }
}

pub(crate) fn check_channel_names(names: &[&str]) -> LayerResult<()> {
    if names.is_empty() {
        return Err(LayerError::Receive("no channels to receive from".into()));
    }
    names.iter().try_for_each(|name| check_channel_name(name))
}
