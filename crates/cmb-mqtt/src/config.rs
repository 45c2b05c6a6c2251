use serde::Deserialize;

/// MQTT session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// MQTT broker hostname.
    #[serde(default = "default_host")]
    pub broker_host: String,
    /// MQTT broker port (plain TCP).
    #[serde(default = "default_port")]
    pub broker_port: u16,
    /// MQTT client ID. Generated when not configured.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Username for credential authentication. Auth is skipped when unset or empty.
    #[serde(default)]
    pub username: Option<String>,
    /// Password sent alongside `username`.
    #[serde(default)]
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// How long to wait for the broker's CONNACK at startup.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keepalive() -> u16 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

/// Generate a client ID that fits the 23-character MQTT 3.1.1 limit.
///
/// Uses the random tail of a UUIDv7 so that two bridges started in the
/// same millisecond still get distinct IDs.
pub fn default_client_id() -> String {
    let id = uuid::Uuid::now_v7().simple().to_string();
    format!("cmb-{}", &id[16..])
}

impl MqttConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            broker_host: host.into(),
            broker_port: port,
            ..Self::default()
        }
    }

    /// Credentials to present in CONNECT.
    ///
    /// A username without a password authenticates with an empty password,
    /// which the client encodes by leaving the password flag unset.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.password.clone().unwrap_or_default();
        Some((username.to_string(), password))
    }

    /// `host:port` for log lines and error messages.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: default_host(),
            broker_port: default_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}
