//! In-process channel layer.
//!
//! Each channel is a FIFO queue bounded by `capacity`. Messages older than
//! `expiry` are dropped when the queue is next touched. Blocking receivers
//! park on a `Notify` that every send wakes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{LayerError, LayerResult};
use crate::layer::{ChannelLayer, LayerSettings, Message, check_channel_name, check_channel_names};

struct Queued {
    expires_at: Instant,
    message: Message,
}

/// Channel layer that lives inside the bridge process.
pub struct MemoryLayer {
    queues: Mutex<HashMap<String, VecDeque<Queued>>>,
    notify: Notify,
    capacity: usize,
    expiry: Duration,
    receive_timeout: Duration,
}

impl MemoryLayer {
    pub fn new(settings: &LayerSettings) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            capacity: settings.capacity,
            expiry: settings.expiry(),
            receive_timeout: settings.receive_timeout(),
        }
    }

    /// Number of live messages queued on `channel`.
    pub fn len(&self, channel: &str) -> usize {
        let now = Instant::now();
        self.lock()
            .get(channel)
            .map(|q| q.iter().filter(|m| m.expires_at > now).count())
            .unwrap_or(0)
    }

    /// Whether `channel` has no live messages.
    pub fn is_empty(&self, channel: &str) -> bool {
        self.len(channel) == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Queued>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, channel: &str, message: Message) -> LayerResult<()> {
        let now = Instant::now();
        let mut queues = self.lock();
        let queue = queues.entry(channel.to_string()).or_default();
        prune(queue, now);

        if queue.len() >= self.capacity {
            return Err(LayerError::ChannelFull(channel.to_string()));
        }

        queue.push_back(Queued {
            expires_at: now + self.expiry,
            message,
        });
        Ok(())
    }

    fn try_pop(&self, channels: &[&str]) -> Option<(String, Message)> {
        let now = Instant::now();
        let mut queues = self.lock();

        for &channel in channels {
            let Some(queue) = queues.get_mut(channel) else {
                continue;
            };
            prune(queue, now);
            let popped = queue.pop_front();
            if queue.is_empty() {
                queues.remove(channel);
            }
            if let Some(item) = popped {
                return Some((channel.to_string(), item.message));
            }
        }

        None
    }
}

impl Default for MemoryLayer {
    fn default() -> Self {
        Self::new(&LayerSettings::default())
    }
}

fn prune(queue: &mut VecDeque<Queued>, now: Instant) {
    while queue.front().is_some_and(|m| m.expires_at <= now) {
        queue.pop_front();
    }
}

#[async_trait]
impl ChannelLayer for MemoryLayer {
    async fn send(&self, channel: &str, message: Message) -> LayerResult<()> {
        check_channel_name(channel)?;
        self.push(channel, message)?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(
        &self,
        channels: &[&str],
        block: bool,
    ) -> LayerResult<Option<(String, Message)>> {
        check_channel_names(channels)?;

        if !block {
            return Ok(self.try_pop(channels));
        }

        let deadline = tokio::time::Instant::now() + self.receive_timeout;
        loop {
            // Register interest before checking so a send in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(hit) = self.try_pop(channels) {
                return Ok(Some(hit));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use serde_json::json;

    fn layer_with(capacity: usize, expiry_secs: u64, receive_timeout_ms: u64) -> MemoryLayer {
        MemoryLayer::new(&LayerSettings {
            capacity,
            expiry_secs,
            receive_timeout_ms,
            ..LayerSettings::default()
        })
    }

    #[tokio::test]
    async fn fifo_per_channel() {
        let layer = MemoryLayer::default();
        layer.send("a", json!({"n": 1})).await.unwrap();
        layer.send("a", json!({"n": 2})).await.unwrap();

        let (ch, first) = layer.receive(&["a"], false).await.unwrap().unwrap();
        assert_eq!(ch, "a");
        assert_eq!(first["n"], 1);
        let (_, second) = layer.receive(&["a"], false).await.unwrap().unwrap();
        assert_eq!(second["n"], 2);
        assert!(layer.receive(&["a"], false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn receive_from_any_channel() {
        let layer = MemoryLayer::default();
        layer.send("b", json!({"from": "b"})).await.unwrap();

        let (ch, msg) = layer.receive(&["a", "b"], false).await.unwrap().unwrap();
        assert_eq!(ch, "b");
        assert_eq!(msg["from"], "b");
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let layer = layer_with(2, 60, 50);
        layer.send("q", json!(1)).await.unwrap();
        layer.send("q", json!(2)).await.unwrap();

        let err = layer.send("q", json!(3)).await.unwrap_err();
        assert!(matches!(err, LayerError::ChannelFull(ref c) if c == "q"));
        assert_eq!(layer.len("q"), 2);
    }

    #[tokio::test]
    async fn expired_messages_are_dropped() {
        let layer = layer_with(10, 0, 50);
        layer.send("q", json!(1)).await.unwrap();

        assert!(layer.is_empty("q"));
        assert!(layer.receive(&["q"], false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blocking_receive_times_out() {
        let layer = layer_with(10, 60, 20);
        let started = Instant::now();
        assert!(layer.receive(&["idle"], true).await.unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn blocking_receive_wakes_on_send() {
        let layer = Arc::new(layer_with(10, 60, 5_000));

        let receiver = {
            let layer = layer.clone();
            tokio::spawn(async move { layer.receive(&["wake"], true).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        layer.send("wake", json!({"ok": true})).await.unwrap();

        let (ch, msg) = tokio::time::timeout(Duration::from_secs(2), receiver)
            .await
            .expect("receiver should wake")
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(ch, "wake");
        assert_eq!(msg["ok"], true);
    }

    #[tokio::test]
    async fn invalid_channel_names_rejected() {
        let layer = MemoryLayer::default();
        assert!(matches!(
            layer.send("no spaces", json!({})).await,
            Err(LayerError::InvalidChannelName(_))
        ));
        assert!(matches!(
            layer.receive(&["ok", "bad/name"], false).await,
            Err(LayerError::InvalidChannelName(_))
        ));
    }
}
