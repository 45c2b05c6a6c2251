//! Channel names used on the channel layer side of the bridge.

/// Channel that receives one envelope per inbound MQTT publish.
pub const INBOUND_CHANNEL: &str = "mqtt.sub";

/// Channel the bridge drains and publishes back to the broker.
pub const OUTBOUND_CHANNEL: &str = "mqtt.pub";

/// Longest channel name a layer accepts.
pub const MAX_CHANNEL_NAME_LEN: usize = 100;

/// Check a channel name against the layer naming rules.
///
/// A name is `[A-Za-z0-9._-]+`, optionally followed by `!` and a
/// process-local suffix drawn from the same alphabet, and is shorter
/// than [`MAX_CHANNEL_NAME_LEN`].
pub fn is_valid_channel_name(name: &str) -> bool {
    if name.is_empty() || name.len() >= MAX_CHANNEL_NAME_LEN {
        return false;
    }

    let (base, local) = match name.split_once('!') {
        Some((base, local)) => (base, Some(local)),
        None => (name, None),
    };

    !base.is_empty()
        && base.chars().all(is_name_char)
        && local.is_none_or(|l| l.chars().all(is_name_char))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_channels_are_valid() {
        assert!(is_valid_channel_name(INBOUND_CHANNEL));
        assert!(is_valid_channel_name(OUTBOUND_CHANNEL));
    }

    #[test]
    fn process_local_suffix() {
        assert!(is_valid_channel_name("http.response!abc123"));
        assert!(is_valid_channel_name("daphne.response!"));
        assert!(!is_valid_channel_name("!abc"));
        assert!(!is_valid_channel_name("a!b!c"));
    }

    #[test]
    fn rejects_bad_characters() {
        assert!(!is_valid_channel_name(""));
        assert!(!is_valid_channel_name("mqtt sub"));
        assert!(!is_valid_channel_name("mqtt/sub"));
        assert!(!is_valid_channel_name("mqtt:sub"));
    }

    #[test]
    fn rejects_long_names() {
        let name = "a".repeat(MAX_CHANNEL_NAME_LEN);
        assert!(!is_valid_channel_name(&name));
        let name = "a".repeat(MAX_CHANNEL_NAME_LEN - 1);
        assert!(is_valid_channel_name(&name));
    }
}
