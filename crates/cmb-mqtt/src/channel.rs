//! MQTT channel: async broker session backed by `rumqttc`.
//!
//! `MqttChannel::connect` blocks until the broker acknowledges the
//! session, then hands the event loop to a background task that fires
//! the `InboundHandler` callbacks and re-subscribes after reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use cmb_protocol::topics::SUBSCRIBE_ALL;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::handler::InboundHandler;

/// Pause between event loop polls after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long `disconnect` waits for the DISCONNECT packet to go out.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Requests buffered between the client handle and the event loop.
pub const REQUEST_QUEUE_CAPACITY: usize = 64;

/// rumqttc rejects keep-alive intervals below this.
const MIN_KEEPALIVE_SECS: u16 = 5;

// ── Traits ────────────────────────────────────────────────────

/// Abstraction for an established broker session.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;

    /// Close the session. Called once, at shutdown.
    async fn disconnect(&self) -> MqttResult<()>;
}

/// Opens broker sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and start the background receive loop.
    ///
    /// Returns only after the broker accepted the session; any refusal or
    /// network failure is reported as `MqttError::Connection`.
    async fn connect(
        &self,
        config: &MqttConfig,
        handler: Arc<dyn InboundHandler>,
    ) -> MqttResult<Arc<dyn Channel>>;
}

// ── MqttChannel ───────────────────────────────────────────────

/// Broker session over plain TCP.
pub struct MqttChannel {
    client: AsyncClient,
    closing: Arc<AtomicBool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttChannel {
    /// Connect to the broker and spawn the event loop driver.
    pub async fn connect(
        config: &MqttConfig,
        handler: Arc<dyn InboundHandler>,
    ) -> MqttResult<Self> {
        let options = build_options(config);
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

        tracing::debug!(broker = %config.broker_addr(), client_id = %config.client_id, "connecting to broker");

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let code = tokio::time::timeout(timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| {
                MqttError::Connection(format!(
                    "no CONNACK from {} within {}s",
                    config.broker_addr(),
                    config.connect_timeout_secs
                ))
            })??;

        tracing::info!(broker = %config.broker_addr(), code = ?code, "connected to broker");
        subscribe_all(&client).await?;
        handler.on_connect(code).await;

        let closing = Arc::new(AtomicBool::new(false));
        let driver = tokio::spawn(drive(eventloop, client.clone(), handler, closing.clone()));

        Ok(Self {
            client,
            closing,
            driver: Mutex::new(Some(driver)),
        })
    }
}

#[async_trait]
impl Channel for MqttChannel {
    /// Queues the publish without waiting. While the broker is unreachable
    /// the request queue stops draining; once it is full, publishes fail
    /// instead of blocking the caller.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .try_publish(topic, qos, false, payload)
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .try_subscribe(filter, qos)
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.closing.store(true, Ordering::Release);
        // A full request queue must not hold up shutdown; the driver is
        // aborted below if the DISCONNECT never goes out.
        let result = self
            .client
            .try_disconnect()
            .map_err(|e| MqttError::Connection(e.to_string()));

        if let Some(mut driver) = self.driver.lock().await.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut driver)
                .await
                .is_err()
            {
                tracing::warn!("MQTT event loop did not stop in time, aborting");
                driver.abort();
            }
        }

        result
    }
}

/// `Connector` that opens real `MqttChannel` sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttConnector;

#[async_trait]
impl Connector for MqttConnector {
    async fn connect(
        &self,
        config: &MqttConfig,
        handler: Arc<dyn InboundHandler>,
    ) -> MqttResult<Arc<dyn Channel>> {
        let channel = MqttChannel::connect(config, handler).await?;
        Ok(Arc::new(channel))
    }
}

// ── Internal helpers ──────────────────────────────────────────

/// Translate the session configuration into client options.
pub fn build_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    let keepalive = config.keepalive_secs.max(MIN_KEEPALIVE_SECS);
    options.set_keep_alive(Duration::from_secs(keepalive.into()));

    if let Some((username, password)) = config.credentials() {
        tracing::debug!(username = %username, "using credential authentication");
        options.set_credentials(username, password);
    }

    options
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> MqttResult<ConnectReturnCode> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(ConnectReturnCode::Success),
                    code => Err(MqttError::Connection(format!(
                        "broker refused connection: {code:?}"
                    ))),
                };
            }
            Ok(_) => {}
            Err(e) => return Err(MqttError::Connection(e.to_string())),
        }
    }
}

async fn subscribe_all(client: &AsyncClient) -> MqttResult<()> {
    client
        .subscribe(SUBSCRIBE_ALL, QoS::AtMostOnce)
        .await
        .map_err(|e| MqttError::Subscribe(e.to_string()))
}

/// Drive the event loop until the session is closed.
async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    handler: Arc<dyn InboundHandler>,
    closing: Arc<AtomicBool>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handler.on_message(publish).await;
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "reconnected to broker");
                // The request queue is drained by this loop, so never await on it here.
                if let Err(e) = client.try_subscribe(SUBSCRIBE_ALL, QoS::AtMostOnce) {
                    tracing::warn!(error = %e, "failed to re-subscribe after reconnect");
                }
                handler.on_connect(ack.code).await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("disconnect sent, stopping event loop");
                break;
            }
            Ok(_) => {} // SubAck, PingResp, PubAck, etc.
            Err(e) => {
                if closing.load(Ordering::Acquire) {
                    break;
                }
                tracing::error!(error = %e, "MQTT event loop error, reconnecting in 5s");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
