//! Mock broker session for testing without a real broker.
//!
//! `MockChannel` records all published messages, subscription filters and
//! disconnects. `MockConnector` hands out a shared `MockChannel` and keeps
//! the registered `InboundHandler` so tests can inject inbound publishes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rumqttc::{ConnectReturnCode, Publish, QoS};

use cmb_protocol::topics::SUBSCRIBE_ALL;

use crate::channel::{Channel, Connector};
use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::handler::InboundHandler;

/// A recorded publish call.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

/// Mock implementation of the `Channel` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    subscriptions: Mutex<Vec<(String, QoS)>>,
    disconnects: AtomicUsize,
    fail_publish: AtomicBool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Get all published messages.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Get all subscription filters.
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Get the last published message.
    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Get published messages for a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Check whether a subscription was made to the given filter.
    pub fn is_subscribed_to(&self, filter: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|(f, _)| f == filter)
    }

    /// Number of `disconnect` calls so far.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Make every following publish fail (or succeed again).
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Clear all recorded state.
    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
        self.disconnects.store(0, Ordering::SeqCst);
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(MqttError::Publish("mock publish failure".into()));
        }
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((filter.to_string(), qos));
        Ok(())
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock implementation of the `Connector` trait.
///
/// Mirrors the real connector's session behaviour: subscribe to every
/// topic, then fire `on_connect`.
pub struct MockConnector {
    channel: Arc<MockChannel>,
    refuse: Option<String>,
    attempts: AtomicUsize,
    last_config: Mutex<Option<MqttConfig>>,
    handler: Mutex<Option<Arc<dyn InboundHandler>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(MockChannel::new()),
            refuse: None,
            attempts: AtomicUsize::new(0),
            last_config: Mutex::new(None),
            handler: Mutex::new(None),
        }
    }

    /// A connector whose every attempt is refused with `reason`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            refuse: Some(reason.into()),
            ..Self::new()
        }
    }

    /// The session handed out by `connect`.
    pub fn channel(&self) -> Arc<MockChannel> {
        self.channel.clone()
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Configuration passed to the most recent `connect`.
    pub fn last_config(&self) -> Option<MqttConfig> {
        self.last_config.lock().unwrap().clone()
    }

    /// Whether a session is established.
    pub fn is_connected(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    /// Deliver an inbound publish through the registered handler.
    ///
    /// Returns `false` if no session is established.
    pub async fn deliver(&self, topic: &str, payload: &[u8], qos: QoS) -> bool {
        let Some(handler) = self.handler.lock().unwrap().clone() else {
            return false;
        };
        handler.on_message(Publish::new(topic, qos, payload)).await;
        true
    }

    /// Simulate an implicit reconnect: re-subscribe and fire `on_connect`.
    pub async fn reconnect(&self) -> bool {
        let Some(handler) = self.handler.lock().unwrap().clone() else {
            return false;
        };
        let _ = self.channel.subscribe(SUBSCRIBE_ALL, QoS::AtMostOnce).await;
        handler.on_connect(ConnectReturnCode::Success).await;
        true
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        config: &MqttConfig,
        handler: Arc<dyn InboundHandler>,
    ) -> MqttResult<Arc<dyn Channel>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(config.clone());

        if let Some(reason) = &self.refuse {
            return Err(MqttError::Connection(reason.clone()));
        }

        self.channel.subscribe(SUBSCRIBE_ALL, QoS::AtMostOnce).await?;
        handler.on_connect(ConnectReturnCode::Success).await;
        *self.handler.lock().unwrap() = Some(handler);

        Ok(self.channel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        connects: AtomicUsize,
        topics: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InboundHandler for Recorder {
        async fn on_connect(&self, _code: ConnectReturnCode) {
            self.connects.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_message(&self, publish: Publish) {
            self.topics.lock().unwrap().push(publish.topic);
        }
    }

    #[tokio::test]
    async fn publish_records_messages() {
        let mock = MockChannel::new();
        mock.publish("test/topic", b"hello", QoS::AtLeastOnce)
            .await
            .unwrap();
        mock.publish("test/other", b"world", QoS::AtMostOnce)
            .await
            .unwrap();

        let msgs = mock.published();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].topic, "test/topic");
        assert_eq!(msgs[0].payload, b"hello");
        assert_eq!(msgs[1].topic, "test/other");
        assert_eq!(mock.published_to("test/other").len(), 1);
        assert_eq!(mock.last_published().unwrap().payload, b"world");
    }

    #[tokio::test]
    async fn failing_publish_is_not_recorded() {
        let mock = MockChannel::new();
        mock.set_fail_publish(true);
        assert!(mock.publish("t", b"d", QoS::AtMostOnce).await.is_err());
        mock.set_fail_publish(false);
        assert!(mock.publish("t", b"d", QoS::AtMostOnce).await.is_ok());
        assert_eq!(mock.published().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_is_counted() {
        let mock = MockChannel::new();
        assert_eq!(mock.disconnect_count(), 0);
        mock.disconnect().await.unwrap();
        assert_eq!(mock.disconnect_count(), 1);

        mock.reset();
        assert_eq!(mock.disconnect_count(), 0);
        assert!(mock.published().is_empty());
    }

    #[tokio::test]
    async fn connect_subscribes_and_notifies() {
        let connector = MockConnector::new();
        let recorder = Arc::new(Recorder::default());

        connector
            .connect(&MqttConfig::default(), recorder.clone())
            .await
            .unwrap();

        assert_eq!(connector.attempts(), 1);
        assert!(connector.is_connected());
        assert!(connector.channel().is_subscribed_to("#"));
        assert_eq!(recorder.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconnect_resubscribes() {
        let connector = MockConnector::new();
        let recorder = Arc::new(Recorder::default());
        connector
            .connect(&MqttConfig::default(), recorder.clone())
            .await
            .unwrap();

        assert!(connector.reconnect().await);

        assert_eq!(connector.channel().subscriptions().len(), 2);
        assert_eq!(recorder.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deliver_reaches_handler() {
        let connector = MockConnector::new();
        let recorder = Arc::new(Recorder::default());
        assert!(!connector.deliver("early", b"x", QoS::AtMostOnce).await);

        connector
            .connect(&MqttConfig::default(), recorder.clone())
            .await
            .unwrap();
        assert!(connector.deliver("sensors/temp", b"21.5", QoS::AtMostOnce).await);

        assert_eq!(*recorder.topics.lock().unwrap(), vec!["sensors/temp"]);
    }

    #[tokio::test]
    async fn refusing_connector_records_attempt() {
        let connector = MockConnector::refusing("not authorized");
        let recorder = Arc::new(Recorder::default());

        let err = connector
            .connect(&MqttConfig::default(), recorder.clone())
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("not authorized"));
        assert_eq!(connector.attempts(), 1);
        assert!(!connector.is_connected());
        assert_eq!(recorder.connects.load(Ordering::SeqCst), 0);
    }
}
