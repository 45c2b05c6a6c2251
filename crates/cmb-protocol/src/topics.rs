//! MQTT topic constants and publish-topic validation.

use thiserror::Error;

/// Filter that matches every topic on the broker.
pub const SUBSCRIBE_ALL: &str = "#";

/// Largest topic the MQTT wire format can carry (two-byte length prefix).
pub const MAX_TOPIC_LEN: usize = 65_535;

/// Reasons a topic cannot be used for a PUBLISH.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,

    #[error("topic is {len} bytes, limit is {MAX_TOPIC_LEN}")]
    TooLong { len: usize },

    #[error("topic '{0}' contains a wildcard")]
    Wildcard(String),

    #[error("topic contains a NUL character")]
    Nul,
}

/// Validate a topic name for publishing.
///
/// Wildcards are only legal in subscription filters, never in the topic
/// of a PUBLISH packet.
pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(TopicError::TooLong { len: topic.len() });
    }
    if topic.contains(['+', '#']) {
        return Err(TopicError::Wildcard(topic.to_string()));
    }
    if topic.contains('\0') {
        return Err(TopicError::Nul);
    }
    Ok(())
}
