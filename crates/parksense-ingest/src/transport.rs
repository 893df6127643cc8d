//! Pub/sub transport seam and its MQTT implementation.

use crate::error::TransportError;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Capacity of the request channel between `AsyncClient` and its event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Upper bound for CONNACK and SUBACK round trips.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for flushing DISCONNECT on shutdown.
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT requires keep-alive of at least five seconds.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Something the transport observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An inbound publish.
    Message { topic: String, payload: Vec<u8> },
    /// The connection dropped for a reason other than a local disconnect.
    Disconnected { reason: String },
}

/// A connection to a publish/subscribe broker.
///
/// Owned exclusively by the ingestion worker, which drives the lifecycle:
/// `connect`, `subscribe`, then `next_event` until a
/// [`TransportEvent::Disconnected`], and `disconnect` on shutdown.
pub trait Transport: Send + 'static {
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn subscribe(
        &mut self,
        topic_filter: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next inbound message or a connection loss.
    fn next_event(&mut self) -> impl Future<Output = TransportEvent> + Send;

    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn is_connected(&self) -> bool;
}

/// Broker connection settings.
#[derive(Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub keep_alive: Duration,
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("use_tls", &self.use_tls)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// MQTT transport built on `rumqttc`.
///
/// Each `connect` builds a fresh client/event-loop pair so a reconnect
/// never inherits state from a dead connection.
pub struct MqttTransport {
    options: MqttOptions,
    session: Option<Session>,
}

impl MqttTransport {
    /// Builds the transport from settings without touching the network.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Options` for an empty host or a client id
    /// the MQTT library would refuse.
    pub fn new(settings: &MqttSettings) -> Result<Self, TransportError> {
        if settings.host.trim().is_empty() {
            return Err(TransportError::Options("broker host is empty".to_string()));
        }
        if settings.client_id.is_empty() || settings.client_id.starts_with(' ') {
            return Err(TransportError::Options(format!(
                "invalid client id {:?}",
                settings.client_id
            )));
        }

        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(settings.keep_alive.max(MIN_KEEP_ALIVE));
        options.set_clean_session(true);

        match (&settings.username, &settings.password) {
            (Some(username), password) => {
                options.set_credentials(username, password.clone().unwrap_or_default());
            }
            (None, Some(_)) => {
                return Err(TransportError::Options(
                    "password configured without a username".to_string(),
                ));
            }
            (None, None) => {}
        }

        if settings.use_tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        Ok(Self {
            options,
            session: None,
        })
    }

    async fn await_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(()),
                        code => Err(TransportError::Connect(format!(
                            "broker refused connection: {code:?}"
                        ))),
                    };
                }
                Ok(_) => continue,
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    }

    async fn await_suback(eventloop: &mut EventLoop) -> Result<(), TransportError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(TransportError::Subscribe(
                            "broker rejected topic filter".to_string(),
                        ));
                    }
                    return Ok(());
                }
                Ok(_) => continue,
                Err(e) => return Err(TransportError::Subscribe(e.to_string())),
            }
        }
    }
}

impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.session = None;
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CHANNEL_CAPACITY);

        tokio::time::timeout(HANDSHAKE_TIMEOUT, Self::await_connack(&mut eventloop))
            .await
            .map_err(|_| TransportError::Connect("timed out waiting for CONNACK".to_string()))??;

        self.session = Some(Session { client, eventloop });
        Ok(())
    }

    async fn subscribe(&mut self, topic_filter: &str) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        session
            .client
            .subscribe(topic_filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        let acked = tokio::time::timeout(HANDSHAKE_TIMEOUT, Self::await_suback(&mut session.eventloop))
            .await
            .map_err(|_| TransportError::Subscribe("timed out waiting for SUBACK".to_string()))
            .and_then(|result| result);

        if acked.is_err() {
            self.session = None;
        }
        acked
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            let polled = match self.session.as_mut() {
                Some(session) => session.eventloop.poll().await,
                None => {
                    return TransportEvent::Disconnected {
                        reason: "not connected".to_string(),
                    }
                }
            };

            match polled {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.session = None;
                    return TransportEvent::Disconnected {
                        reason: "broker sent DISCONNECT".to_string(),
                    };
                }
                Ok(_) => continue,
                Err(e) => {
                    self.session = None;
                    return TransportEvent::Disconnected {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session
            .client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()))?;

        // The request only reaches the broker once the event loop sends it.
        let flush = async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, flush).await.is_err() {
            tracing::debug!("timed out flushing MQTT DISCONNECT");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}
