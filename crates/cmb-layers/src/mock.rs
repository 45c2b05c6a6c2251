//! Mock channel layer for testing the bridge without a real layer.
//!
//! Records every send, serves a queue of pre-loaded messages to
//! `receive`, and can be told to fail upcoming sends or receives.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LayerError, LayerResult};
use crate::layer::{ChannelLayer, Message};

/// Mock implementation of the `ChannelLayer` trait.
pub struct MockLayer {
    sent: Mutex<Vec<(String, Message)>>,
    inbox: Mutex<VecDeque<(String, Message)>>,
    failing_sends: AtomicUsize,
    failing_receives: AtomicUsize,
    send_attempts: AtomicUsize,
    receives: AtomicUsize,
    idle_wait: Duration,
}

impl MockLayer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(VecDeque::new()),
            failing_sends: AtomicUsize::new(0),
            failing_receives: AtomicUsize::new(0),
            send_attempts: AtomicUsize::new(0),
            receives: AtomicUsize::new(0),
            idle_wait: Duration::from_millis(10),
        }
    }

    /// Successfully delivered sends, in order.
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages delivered to `channel`.
    pub fn sent_to(&self, channel: &str) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Every `send` call, including failed ones.
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Number of `receive` calls so far.
    pub fn receive_count(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }

    /// Queue a message for a later `receive`.
    pub fn push(&self, channel: &str, message: Message) {
        self.inbox
            .lock()
            .unwrap()
            .push_back((channel.to_string(), message));
    }

    /// Messages still waiting to be received.
    pub fn pending(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    /// Fail the next `n` sends with a delivery error.
    pub fn fail_next_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` receives.
    pub fn fail_next_receives(&self, n: usize) {
        self.failing_receives.store(n, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn pop(&self, channels: &[&str]) -> Option<(String, Message)> {
        let mut inbox = self.inbox.lock().unwrap();
        let index = inbox
            .iter()
            .position(|(c, _)| channels.contains(&c.as_str()))?;
        inbox.remove(index)
    }
}

impl Default for MockLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelLayer for MockLayer {
    async fn send(&self, channel: &str, message: Message) -> LayerResult<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_sends) {
            return Err(LayerError::delivery(channel, "mock send failure"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), message));
        Ok(())
    }

    async fn receive(
        &self,
        channels: &[&str],
        block: bool,
    ) -> LayerResult<Option<(String, Message)>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_receives) {
            return Err(LayerError::Receive("mock receive failure".into()));
        }

        let popped = self.pop(channels);
        if popped.is_none() && block {
            tokio::time::sleep(self.idle_wait).await;
        }
        Ok(popped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_records_messages() {
        let mock = MockLayer::new();
        mock.send("mqtt.sub", json!({"n": 1})).await.unwrap();
        mock.send("other", json!({"n": 2})).await.unwrap();

        assert_eq!(mock.sent().len(), 2);
        assert_eq!(mock.sent_to("mqtt.sub"), vec![json!({"n": 1})]);
    }

    #[tokio::test]
    async fn failing_sends_are_counted_but_not_recorded() {
        let mock = MockLayer::new();
        mock.fail_next_sends(1);

        assert!(mock.send("mqtt.sub", json!({})).await.is_err());
        assert!(mock.send("mqtt.sub", json!({})).await.is_ok());

        assert_eq!(mock.send_attempts(), 2);
        assert_eq!(mock.sent().len(), 1);
    }

    #[tokio::test]
    async fn receive_filters_by_channel() {
        let mock = MockLayer::new();
        mock.push("elsewhere", json!({"skip": true}));
        mock.push("mqtt.pub", json!({"topic": "t"}));

        let (ch, msg) = mock.receive(&["mqtt.pub"], false).await.unwrap().unwrap();
        assert_eq!(ch, "mqtt.pub");
        assert_eq!(msg["topic"], "t");
        assert_eq!(mock.pending(), 1);
        assert!(mock.receive(&["mqtt.pub"], true).await.unwrap().is_none());
        assert_eq!(mock.receive_count(), 2);
    }

    #[tokio::test]
    async fn failing_receive() {
        let mock = MockLayer::new();
        mock.fail_next_receives(1);
        assert!(mock.receive(&["mqtt.pub"], false).await.is_err());
        assert!(mock.receive(&["mqtt.pub"], false).await.unwrap().is_none());
    }
}
