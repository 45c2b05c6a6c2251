//! Command-line configuration.

use clap::{ArgAction, Parser};

use cmb_layers::{LayerError, LayerRef, LayerSettings};
use cmb_mqtt::MqttConfig;
use cmb_mqtt::config::default_client_id;

/// Relay messages between an MQTT broker and a channel layer.
#[derive(Debug, Parser)]
#[command(name = "cmb-bridge", version, about)]
pub struct Args {
    /// MQTT broker host.
    #[arg(short = 'H', long, env = "CMB_MQTT_HOST", default_value = "localhost")]
    pub host: String,

    /// MQTT broker port.
    #[arg(short, long, env = "CMB_MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// MQTT username.
    #[arg(short, long, env = "CMB_MQTT_USERNAME")]
    pub username: Option<String>,

    /// MQTT password. Ignored without a username.
    #[arg(short = 'P', long, env = "CMB_MQTT_PASSWORD")]
    pub password: Option<String>,

    /// MQTT client ID [default: generated]
    #[arg(long)]
    pub client_id: Option<String>,

    /// Keep-alive interval in seconds (minimum 5).
    #[arg(long, default_value_t = 60)]
    pub keepalive: u16,

    /// Seconds to wait for the broker to accept the session.
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Redis URL for the `redis:channel_layer` layer.
    #[arg(long, env = "CMB_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Key prefix for channel lists in Redis.
    #[arg(long, default_value = "asgi:")]
    pub layer_prefix: String,

    /// Maximum queued messages per channel.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub capacity: u64,

    /// Seconds a queued message stays deliverable.
    #[arg(long, default_value_t = 60)]
    pub expiry: u64,

    /// Upper bound on one blocking receive, in milliseconds.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub receive_timeout_ms: u64,

    /// Emit JSON log lines.
    #[arg(long)]
    pub log_json: bool,

    /// Channel layer to bridge, as `module.path:attribute.path`.
    #[arg(value_name = "CHANNEL_REF", value_parser = parse_channel_ref)]
    pub channel_ref: LayerRef,
}

fn parse_channel_ref(s: &str) -> Result<LayerRef, LayerError> {
    s.parse()
}

/// Everything the bridge needs to start.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt: MqttConfig,
    pub layer: LayerSettings,
    pub channel_ref: LayerRef,
    pub verbosity: u8,
    pub log_json: bool,
}

impl Args {
    pub fn into_config(self) -> BridgeConfig {
        let mqtt = MqttConfig {
            broker_host: self.host,
            broker_port: self.port,
            client_id: self.client_id.unwrap_or_else(default_client_id),
            username: self.username,
            password: self.password,
            keepalive_secs: self.keepalive,
            connect_timeout_secs: self.connect_timeout,
        };

        let layer = LayerSettings {
            redis_url: self.redis_url,
            prefix: self.layer_prefix,
            capacity: usize::try_from(self.capacity).unwrap_or(usize::MAX),
            expiry_secs: self.expiry,
            receive_timeout_ms: self.receive_timeout_ms,
        };

        BridgeConfig {
            mqtt,
            layer,
            channel_ref: self.channel_ref,
            verbosity: self.verbose,
            log_json: self.log_json,
        }
    }
}

impl BridgeConfig {
    /// Config for `channel_ref` with every other setting at its default.
    pub fn new(channel_ref: LayerRef) -> Self {
        Self {
            mqtt: MqttConfig::default(),
            layer: LayerSettings::default(),
            channel_ref,
            verbosity: 0,
            log_json: false,
        }
    }
}
