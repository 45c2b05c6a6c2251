//! Redis-backed channel layer.
//!
//! Channel `c` is the list at `{prefix}{c}`. Senders `LPUSH` JSON text and
//! refresh the key's TTL in one server-side script, so the capacity check
//! holds against concurrent senders; receivers pop from the other end, so
//! each list is a FIFO. Sends and receives use separate connections: a
//! `BRPOP` parks its connection server-side and would otherwise stall every
//! send.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Script};

use crate::error::{LayerError, LayerResult};
use crate::layer::{ChannelLayer, LayerSettings, Message, check_channel_name, check_channel_names};

/// Upper bound on opening a connection at startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// `KEYS[1]` list, `ARGV` = payload, capacity, expiry seconds.
/// Returns 1 when pushed, 0 when the list is full.
const PUSH_BOUNDED: &str = r"
if redis.call('LLEN', KEYS[1]) >= tonumber(ARGV[2]) then
    return 0
end
redis.call('LPUSH', KEYS[1], ARGV[1])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
";

/// Channel layer stored in Redis lists.
pub struct RedisLayer {
    send_conn: ConnectionManager,
    recv_conn: ConnectionManager,
    push: Script,
    prefix: String,
    capacity: usize,
    expiry_secs: u64,
    receive_timeout: Duration,
}

impl RedisLayer {
    /// Open both connections; fails if Redis is unreachable.
    pub async fn connect(settings: &LayerSettings) -> LayerResult<Self> {
        let client = Client::open(settings.redis_url.as_str()).map_err(|e| {
            LayerError::Resolution(format!("invalid redis url '{}': {e}", settings.redis_url))
        })?;

        let send_conn = open_connection(client.clone(), settings).await?;
        let recv_conn = open_connection(client, settings).await?;

        tracing::info!(url = %settings.redis_url, prefix = %settings.prefix, "connected to redis channel layer");

        Ok(Self {
            send_conn,
            recv_conn,
            push: Script::new(PUSH_BOUNDED),
            prefix: settings.prefix.clone(),
            capacity: settings.capacity,
            expiry_secs: settings.expiry_secs.max(1),
            receive_timeout: settings.receive_timeout(),
        })
    }

    fn key(&self, channel: &str) -> String {
        channel_key(&self.prefix, channel)
    }

    fn decode(&self, key: &str, raw: &str) -> LayerResult<(String, Message)> {
        let message = serde_json::from_str(raw)?;
        Ok((channel_from_key(&self.prefix, key).to_string(), message))
    }

    /// `BRPOP` only takes whole seconds on older servers.
    fn block_secs(&self) -> u64 {
        self.receive_timeout.as_secs().max(1)
    }
}

fn channel_key(prefix: &str, channel: &str) -> String {
    format!("{prefix}{channel}")
}

fn channel_from_key<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

/// The manager retries failed connects with backoff; the outer timeout
/// keeps an unreachable host from stalling startup.
async fn open_connection(
    client: Client,
    settings: &LayerSettings,
) -> LayerResult<ConnectionManager> {
    let config = ConnectionManagerConfig::new().set_connection_timeout(CONNECT_TIMEOUT);
    let connecting = ConnectionManager::new_with_config(client, config);
    match tokio::time::timeout(CONNECT_TIMEOUT, connecting).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(unreachable_redis(settings, e)),
        Err(_) => Err(unreachable_redis(
            settings,
            format!("no connection within {}s", CONNECT_TIMEOUT.as_secs()),
        )),
    }
}

fn unreachable_redis(settings: &LayerSettings, e: impl std::fmt::Display) -> LayerError {
    LayerError::Resolution(format!("redis at '{}' unreachable: {e}", settings.redis_url))
}

#[async_trait]
impl ChannelLayer for RedisLayer {
    async fn send(&self, channel: &str, message: Message) -> LayerResult<()> {
        check_channel_name(channel)?;
        let key = self.key(channel);
        let payload = serde_json::to_string(&message)?;
        let mut conn = self.send_conn.clone();

        let pushed: i64 = self
            .push
            .key(&key)
            .arg(payload)
            .arg(self.capacity)
            .arg(self.expiry_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LayerError::delivery(channel, e))?;
        if pushed == 0 {
            return Err(LayerError::ChannelFull(channel.to_string()));
        }

        Ok(())
    }

    async fn receive(
        &self,
        channels: &[&str],
        block: bool,
    ) -> LayerResult<Option<(String, Message)>> {
        check_channel_names(channels)?;
        let keys: Vec<String> = channels.iter().map(|c| self.key(c)).collect();
        let mut conn = self.recv_conn.clone();

        if block {
            let popped: Option<(String, String)> = redis::cmd("BRPOP")
                .arg(&keys)
                .arg(self.block_secs())
                .query_async(&mut conn)
                .await
                .map_err(|e| LayerError::Receive(e.to_string()))?;
            return popped
                .map(|(key, raw)| self.decode(&key, &raw))
                .transpose();
        }

        for key in &keys {
            let popped: Option<String> = redis::cmd("RPOP")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(|e| LayerError::Receive(e.to_string()))?;
            if let Some(raw) = popped {
                return self.decode(key, &raw).map(Some);
            }
        }

        Ok(None)
    }
}
