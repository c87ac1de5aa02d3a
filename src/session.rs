//! The MQTT session: one state machine driving one established transport.
//!
//! A [`Session`] owns the handshake, the six operation entrypoints, and the
//! lifecycle of its worker tasks (ingress demultiplexer, keepalive pinger,
//! router dispatch). Writes are serialized through a single write lock;
//! reads happen only on the demultiplexer task.

pub(crate) mod incoming;
pub(crate) mod inflight;
pub(crate) mod pinger;

use crate::auth::{AuthResponse, Auther};
use crate::error::{Capability, MqttError, Result};
use crate::packet::auth::AuthPacket;
use crate::packet::connack::ConnAckPacket;
use crate::packet::connect::ConnectPacket;
use crate::packet::disconnect::DisconnectPacket;
use crate::packet::publish::PublishPacket;
use crate::packet::subscribe::SubscribePacket;
use crate::packet::suback::SubAckPacket;
use crate::packet::unsuback::UnsubAckPacket;
use crate::packet::unsubscribe::UnsubscribePacket;
use crate::packet::{MqttPacket, Packet};
use crate::packet_id::PacketIdRegistry;
use crate::persist::{NoopPersistence, Persistence};
use crate::protocol::v5::reason_codes::ReasonCode;
use crate::router::{NoopRouter, Router};
use crate::transport::PacketWriter;
use crate::types::{CommsProperties, ConnectOptions, PublishResponse};
use crate::QoS;
use inflight::InflightWindow;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

pub(crate) type PacketSource = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type PacketSink = Box<dyn AsyncWrite + Send + Unpin>;

type DisconnectCallback = Box<dyn Fn(DisconnectPacket) + Send + Sync>;

/// Connection phase of a session. Exactly one session exists per transport;
/// phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    Fresh = 0,
    Connecting = 1,
    Established = 2,
    ShuttingDown = 3,
    Closed = 4,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Fresh,
            1 => Self::Connecting,
            2 => Self::Established,
            3 => Self::ShuttingDown,
            _ => Self::Closed,
        }
    }
}

/// Session-level configuration: the operation deadline and the
/// collaborators that receive publications, persist inflight messages, and
/// answer authentication challenges.
pub struct SessionOptions {
    pub packet_timeout: Duration,
    pub router: Arc<dyn Router>,
    pub persistence: Arc<dyn Persistence>,
    pub auther: Option<Arc<dyn Auther>>,
    pub on_disconnect: Option<DisconnectCallback>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            packet_timeout: Duration::from_secs(10),
            router: Arc::new(NoopRouter),
            persistence: Arc::new(NoopPersistence),
            auther: None,
            on_disconnect: None,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_packet_timeout(mut self, timeout: Duration) -> Self {
        self.packet_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = persistence;
        self
    }

    #[must_use]
    pub fn with_auther(mut self, auther: Arc<dyn Auther>) -> Self {
        self.auther = Some(auther);
        self
    }

    #[must_use]
    pub fn with_on_disconnect(
        mut self,
        callback: impl Fn(DisconnectPacket) + Send + Sync + 'static,
    ) -> Self {
        self.on_disconnect = Some(Box::new(callback));
        self
    }
}

/// State shared between the session controller and its worker tasks.
pub(crate) struct Shared {
    packet_timeout: Duration,
    phase: AtomicU8,
    shutting_down: AtomicBool,
    client_id: RwLock<String>,
    client_caps: OnceLock<CommsProperties>,
    server_caps: OnceLock<CommsProperties>,
    writer: OnceLock<Arc<tokio::sync::Mutex<PacketSink>>>,
    pub(crate) registry: PacketIdRegistry,
    server_window: OnceLock<InflightWindow>,
    client_window: OnceLock<InflightWindow>,
    pub(crate) connack_slot: Mutex<Option<oneshot::Sender<ConnAckPacket>>>,
    pub(crate) reauth_slot: Mutex<Option<oneshot::Sender<Packet>>>,
    pub(crate) on_disconnect: Mutex<Option<DisconnectCallback>>,
    pub(crate) auther: Option<Arc<dyn Auther>>,
    persistence: Arc<dyn Persistence>,
    router_tx: OnceLock<mpsc::UnboundedSender<PublishPacket>>,
    shutdown_tx: watch::Sender<bool>,
    pub(crate) ping_outstanding: AtomicBool,
}

impl Shared {
    pub(crate) fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub(crate) fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Writes one packet under the session write lock, preserving framing.
    pub(crate) async fn write_packet(&self, packet: &Packet) -> Result<()> {
        let writer = self.writer.get().ok_or(MqttError::NotConnected)?;
        let mut sink = writer.lock().await;
        sink.write_packet(packet).await
    }

    /// Hands an inbound publication to the router dispatch queue.
    pub(crate) fn route(&self, publish: PublishPacket) {
        if let Some(tx) = self.router_tx.get() {
            let _ = tx.send(publish);
        }
    }

    /// The single error path. Idempotent: the first caller performs the
    /// teardown, later calls return immediately. Closes the shutdown
    /// signal, stops the pinger, closes the transport, and resolves every
    /// outstanding waiter so blocked callers observe `SessionClosed`.
    pub(crate) async fn shutdown(&self, reason: Option<&MqttError>) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        match reason {
            Some(err) => error!(%err, "session shutting down"),
            None => debug!("session shutting down"),
        }
        self.set_phase(SessionPhase::ShuttingDown);
        self.teardown().await;
    }

    async fn teardown(&self) {
        self.shutdown_tx.send_replace(true);

        self.connack_slot.lock().expect("slot poisoned").take();
        self.reauth_slot.lock().expect("slot poisoned").take();
        self.registry.cancel_all();
        if let Some(window) = self.server_window.get() {
            window.close();
        }
        if let Some(window) = self.client_window.get() {
            window.close();
        }

        if let Some(writer) = self.writer.get() {
            let mut sink = writer.lock().await;
            let _ = sink.shutdown().await;
        }

        self.set_phase(SessionPhase::Closed);
    }
}

/// An MQTT v5 client session over one already-established transport.
pub struct Session {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Session {
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            packet_timeout: options.packet_timeout,
            phase: AtomicU8::new(SessionPhase::Fresh as u8),
            shutting_down: AtomicBool::new(false),
            client_id: RwLock::new(String::new()),
            client_caps: OnceLock::new(),
            server_caps: OnceLock::new(),
            writer: OnceLock::new(),
            registry: PacketIdRegistry::new(),
            server_window: OnceLock::new(),
            client_window: OnceLock::new(),
            connack_slot: Mutex::new(None),
            reauth_slot: Mutex::new(None),
            on_disconnect: Mutex::new(options.on_disconnect),
            auther: options.auther,
            persistence: options.persistence,
            router_tx: OnceLock::new(),
            shutdown_tx,
            ping_outstanding: AtomicBool::new(false),
        });

        // The router dispatch worker outlives connect attempts; it drains
        // the queue until shutdown.
        let (router_tx, router_rx) = mpsc::unbounded_channel();
        shared
            .router_tx
            .set(router_tx)
            .unwrap_or_else(|_| unreachable!("router queue installed once"));
        let worker = tokio::spawn(router_worker(
            options.router,
            router_rx,
            shared.shutdown_rx(),
        ));

        Self {
            shared,
            workers: Mutex::new(vec![worker]),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.shared.phase()
    }

    /// The client identifier in effect: the one from `ConnectOptions`, or
    /// the server-assigned one adopted from CONNACK.
    #[must_use]
    pub fn client_id(&self) -> String {
        self.shared.client_id.read().expect("lock poisoned").clone()
    }

    /// Server capabilities frozen at CONNACK. `None` before the handshake
    /// completes.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<CommsProperties> {
        self.shared.server_caps.get().copied()
    }

    /// Client capabilities frozen at connect entry and declared to the
    /// broker in CONNECT.
    #[must_use]
    pub fn client_capabilities(&self) -> Option<CommsProperties> {
        self.shared.client_caps.get().copied()
    }

    /// Capacities of the server-facing and client-facing inflight windows,
    /// sized at CONNACK.
    #[must_use]
    pub fn inflight_capacities(&self) -> Option<(u16, u16)> {
        Some((
            self.shared.server_window.get()?.capacity(),
            self.shared.client_window.get()?.capacity(),
        ))
    }

    /// Currently free slots in the server-facing inflight window.
    #[must_use]
    pub fn server_inflight_available(&self) -> Option<usize> {
        Some(self.shared.server_window.get()?.available())
    }

    fn ensure_established(&self) -> Result<()> {
        match self.shared.phase() {
            SessionPhase::Established => Ok(()),
            SessionPhase::ShuttingDown | SessionPhase::Closed => Err(MqttError::SessionClosed),
            SessionPhase::Fresh | SessionPhase::Connecting => Err(MqttError::NotConnected),
        }
    }

    /// Drives the CONNECT/CONNACK handshake over `transport`, which must be
    /// an already-established full-duplex byte stream. On success the
    /// session is Established: server capabilities are frozen, both
    /// inflight windows are sized, and the keepalive pinger is running.
    ///
    /// # Errors
    ///
    /// * `AlreadyConnected` if the session is not Fresh.
    /// * `ConnectionRefused` when CONNACK carries an error reason; the
    ///   session is torn down.
    /// * `Timeout` when no CONNACK arrives within the packet timeout.
    /// * `Io` on transport failure.
    pub async fn connect<T>(
        &self,
        transport: T,
        options: ConnectOptions,
    ) -> Result<ConnAckPacket>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        if self
            .shared
            .phase
            .compare_exchange(
                SessionPhase::Fresh as u8,
                SessionPhase::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(match self.shared.phase() {
                SessionPhase::ShuttingDown | SessionPhase::Closed => MqttError::SessionClosed,
                _ => MqttError::AlreadyConnected,
            });
        }

        // Client capabilities freeze at connect entry.
        let client_caps = options.comms_properties();
        let _ = self.shared.client_caps.set(client_caps);
        *self.shared.client_id.write().expect("lock poisoned") = options.client_id.clone();

        let (read_half, write_half) = tokio::io::split(transport);
        let reader: PacketSource = Box::new(read_half);
        let sink: PacketSink = Box::new(write_half);
        let _ = self
            .shared
            .writer
            .set(Arc::new(tokio::sync::Mutex::new(sink)));

        let (connack_tx, connack_rx) = oneshot::channel();
        *self.shared.connack_slot.lock().expect("slot poisoned") = Some(connack_tx);

        let demux = tokio::spawn(incoming::run(self.shared.clone(), reader));
        self.workers.lock().expect("lock poisoned").push(demux);

        let connect = build_connect_packet(&options);
        debug!(client_id = %options.client_id, "sending CONNECT");
        if let Err(err) = self
            .shared
            .write_packet(&Packet::Connect(Box::new(connect)))
            .await
        {
            self.shared.shutdown(Some(&err)).await;
            return Err(err);
        }

        let connack = match timeout(self.shared.packet_timeout, connack_rx).await {
            Err(_) => {
                let err = MqttError::Timeout;
                self.shared.shutdown(Some(&err)).await;
                return Err(err);
            }
            Ok(Err(_)) => return Err(MqttError::SessionClosed),
            Ok(Ok(connack)) => connack,
        };

        if connack.reason_code.is_error() {
            let err = MqttError::ConnectionRefused {
                code: connack.reason_code,
                reason: connack
                    .properties
                    .reason_string()
                    .map(ToString::to_string),
            };
            self.shared.shutdown(Some(&err)).await;
            return Err(err);
        }

        let server_caps = CommsProperties::from_connack(&connack);
        let _ = self.shared.server_caps.set(server_caps);

        if let Some(assigned) = connack.properties.assigned_client_identifier() {
            *self.shared.client_id.write().expect("lock poisoned") = assigned.to_string();
        }

        let _ = self
            .shared
            .server_window
            .set(InflightWindow::new(server_caps.receive_maximum));
        let _ = self
            .shared
            .client_window
            .set(InflightWindow::new(client_caps.receive_maximum));

        let keep_alive_secs = connack
            .properties
            .server_keep_alive()
            .unwrap_or_else(|| options.keep_alive.as_secs().min(u64::from(u16::MAX)) as u16);
        if keep_alive_secs > 0 {
            let pinger = tokio::spawn(pinger::run(
                self.shared.clone(),
                Duration::from_secs(u64::from(keep_alive_secs)),
            ));
            self.workers.lock().expect("lock poisoned").push(pinger);
        }

        self.shared.set_phase(SessionPhase::Established);
        debug!(
            client_id = %self.client_id(),
            receive_maximum = server_caps.receive_maximum,
            keep_alive_secs,
            "session established"
        );
        Ok(connack)
    }

    /// Sends SUBSCRIBE and awaits the matching SUBACK.
    ///
    /// # Errors
    ///
    /// * `CapabilityDenied` before any wire activity when a filter needs a
    ///   capability the server did not advertise.
    /// * `SubscribeFailed` / `PartialSubscribeFailure` on rejecting SUBACKs.
    /// * `Timeout`, `SessionClosed`, `NotConnected` per session state.
    pub async fn subscribe(&self, mut packet: SubscribePacket) -> Result<SubAckPacket> {
        self.ensure_established()?;
        let caps = self.shared.server_caps.get().ok_or(MqttError::NotConnected)?;

        if !caps.wildcard_sub_available
            && packet
                .filters
                .iter()
                .any(|f| f.filter.contains(['#', '+']))
        {
            return Err(MqttError::CapabilityDenied(Capability::WildcardSubscription));
        }
        if !caps.sub_id_available && packet.properties.subscription_identifier().is_some() {
            return Err(MqttError::CapabilityDenied(Capability::SubscriptionIdentifier));
        }
        if !caps.shared_sub_available
            && packet.filters.iter().any(|f| f.filter.starts_with("$share"))
        {
            return Err(MqttError::CapabilityDenied(Capability::SharedSubscription));
        }

        let (tx, rx) = oneshot::channel();
        let id = timeout(self.shared.packet_timeout, self.shared.registry.reserve(tx))
            .await
            .map_err(|_| MqttError::Timeout)?;
        packet.packet_id = id;

        debug!(packet_id = id, filters = packet.filters.len(), "sending SUBSCRIBE");
        if let Err(err) = self.shared.write_packet(&Packet::Subscribe(packet)).await {
            self.shared.registry.release(id);
            self.shared.shutdown(Some(&err)).await;
            return Err(err);
        }

        match self.await_reply(rx).await? {
            Packet::SubAck(suback) => {
                if suback.reason_codes.len() == 1 {
                    let code = suback.reason_codes[0];
                    if code.is_error() {
                        return Err(MqttError::SubscribeFailed {
                            code,
                            reason: suback
                                .properties
                                .reason_string()
                                .map(ToString::to_string),
                        });
                    }
                } else if suback.reason_codes.iter().any(|code| code.is_error()) {
                    return Err(MqttError::PartialSubscribeFailure(
                        suback.reason_codes.clone(),
                    ));
                }
                Ok(suback)
            }
            other => Err(self.protocol_violation("SUBACK", &other).await),
        }
    }

    /// Sends UNSUBSCRIBE and awaits the matching UNSUBACK.
    ///
    /// # Errors
    ///
    /// Symmetric to [`Session::subscribe`].
    pub async fn unsubscribe(&self, mut packet: UnsubscribePacket) -> Result<UnsubAckPacket> {
        self.ensure_established()?;

        let (tx, rx) = oneshot::channel();
        let id = timeout(self.shared.packet_timeout, self.shared.registry.reserve(tx))
            .await
            .map_err(|_| MqttError::Timeout)?;
        packet.packet_id = id;

        debug!(packet_id = id, filters = packet.filters.len(), "sending UNSUBSCRIBE");
        if let Err(err) = self
            .shared
            .write_packet(&Packet::Unsubscribe(packet))
            .await
        {
            self.shared.registry.release(id);
            self.shared.shutdown(Some(&err)).await;
            return Err(err);
        }

        match self.await_reply(rx).await? {
            Packet::UnsubAck(unsuback) => {
                if unsuback.reason_codes.len() == 1 {
                    let code = unsuback.reason_codes[0];
                    if code.is_error() {
                        return Err(MqttError::UnsubscribeFailed {
                            code,
                            reason: unsuback
                                .properties
                                .reason_string()
                                .map(ToString::to_string),
                        });
                    }
                } else if unsuback.reason_codes.iter().any(|code| code.is_error()) {
                    return Err(MqttError::PartialUnsubscribeFailure(
                        unsuback.reason_codes.clone(),
                    ));
                }
                Ok(unsuback)
            }
            other => Err(self.protocol_violation("UNSUBACK", &other).await),
        }
    }

    /// Publishes a message at its requested QoS. QoS 0 returns `None` as
    /// soon as the packet is written; QoS 1 and 2 return the terminal
    /// response after the exchange completes.
    ///
    /// # Errors
    ///
    /// * `CapabilityDenied` before any wire activity when the publish
    ///   exceeds the server's advertised limits.
    /// * `PublishRejected` when the server acknowledges with an error code.
    /// * `Timeout`, `SessionClosed`, `NotConnected` per session state.
    pub async fn publish(&self, packet: PublishPacket) -> Result<Option<PublishResponse>> {
        self.ensure_established()?;
        let caps = self.shared.server_caps.get().ok_or(MqttError::NotConnected)?;

        if packet.qos as u8 > caps.maximum_qos {
            return Err(MqttError::CapabilityDenied(Capability::MaximumQoS));
        }
        if packet.retain && !caps.retain_available {
            return Err(MqttError::CapabilityDenied(Capability::Retain));
        }
        if let Some(alias) = packet.properties.topic_alias() {
            if caps.topic_alias_maximum > 0 && alias > caps.topic_alias_maximum {
                return Err(MqttError::CapabilityDenied(Capability::TopicAlias));
            }
        }
        if caps.maximum_packet_size > 0 {
            let mut probe = packet.clone();
            if probe.qos != QoS::AtMostOnce && probe.packet_id.is_none() {
                probe.packet_id = Some(1);
            }
            let mut buf = Vec::new();
            probe.encode(&mut buf)?;
            if buf.len() > caps.maximum_packet_size as usize {
                return Err(MqttError::CapabilityDenied(Capability::MaximumPacketSize));
            }
        }

        if packet.qos == QoS::AtMostOnce {
            debug!(topic = %packet.topic_name, "sending QoS 0 PUBLISH");
            if let Err(err) = self.shared.write_packet(&Packet::Publish(packet)).await {
                self.shared.shutdown(Some(&err)).await;
                return Err(err);
            }
            return Ok(None);
        }

        self.publish_qos12(packet).await.map(Some)
    }

    async fn publish_qos12(&self, mut packet: PublishPacket) -> Result<PublishResponse> {
        let window = self.shared.server_window.get().ok_or(MqttError::NotConnected)?;

        // Holding the permit for the whole exchange releases it exactly
        // once, on any exit path.
        let _permit = timeout(self.shared.packet_timeout, window.acquire())
            .await
            .map_err(|_| MqttError::Timeout)??;

        let (tx, rx) = oneshot::channel();
        let id = timeout(self.shared.packet_timeout, self.shared.registry.reserve(tx))
            .await
            .map_err(|_| MqttError::Timeout)?;
        packet.packet_id = Some(id);
        let qos = packet.qos;

        self.shared.persistence.put(id, &packet);
        debug!(packet_id = id, ?qos, topic = %packet.topic_name, "sending PUBLISH");
        if let Err(err) = self.shared.write_packet(&Packet::Publish(packet)).await {
            self.shared.registry.release(id);
            self.shared.persistence.delete(id);
            self.shared.shutdown(Some(&err)).await;
            return Err(err);
        }

        let reply = self.await_reply(rx).await?;
        match (qos, reply) {
            (QoS::AtLeastOnce, Packet::PubAck(puback)) => {
                self.shared.persistence.delete(id);
                if puback.reason_code.is_error() {
                    Err(MqttError::PublishRejected(puback.reason_code))
                } else {
                    Ok(PublishResponse::from(puback))
                }
            }
            // The demultiplexer answers a clean PUBREC with PUBREL itself
            // and keeps this waiter armed, so a PUBREC here is the error
            // shortcut terminating the exchange.
            (QoS::ExactlyOnce, Packet::PubRec(pubrec)) => {
                self.shared.persistence.delete(id);
                Err(MqttError::PublishRejected(pubrec.reason_code))
            }
            (QoS::ExactlyOnce, Packet::PubComp(pubcomp)) => {
                self.shared.persistence.delete(id);
                Ok(PublishResponse::from(pubcomp))
            }
            (_, other) => {
                let expected = if qos == QoS::AtLeastOnce {
                    "PUBACK"
                } else {
                    "PUBCOMP"
                };
                Err(self.protocol_violation(expected, &other).await)
            }
        }
    }

    /// Initiates re-authentication and awaits the terminal signal: a
    /// successful AUTH or a server DISCONNECT. Intermediate challenge
    /// rounds run on the demultiplexer through the configured `Auther`.
    ///
    /// # Errors
    ///
    /// * `ReauthInProgress` if a round is already outstanding.
    /// * `Timeout`, `SessionClosed`, `NotConnected` per session state.
    pub async fn authenticate(&self, auth: AuthPacket) -> Result<AuthResponse> {
        self.ensure_established()?;

        let (tx, rx) = oneshot::channel();
        {
            let mut slot = self.shared.reauth_slot.lock().expect("slot poisoned");
            if slot.is_some() {
                return Err(MqttError::ReauthInProgress);
            }
            *slot = Some(tx);
        }

        let mut packet = auth;
        packet.reason_code = ReasonCode::ContinueAuthentication;
        debug!("sending AUTH to start re-authentication");
        if let Err(err) = self.shared.write_packet(&Packet::Auth(packet)).await {
            self.shared.reauth_slot.lock().expect("slot poisoned").take();
            self.shared.shutdown(Some(&err)).await;
            return Err(err);
        }

        let reply = match timeout(self.shared.packet_timeout, rx).await {
            Err(_) => {
                self.shared.reauth_slot.lock().expect("slot poisoned").take();
                return Err(MqttError::Timeout);
            }
            Ok(Err(_)) => return Err(MqttError::SessionClosed),
            Ok(Ok(packet)) => packet,
        };

        match reply {
            Packet::Auth(auth) => Ok(AuthResponse::Ok(auth)),
            Packet::Disconnect(disconnect) => Ok(AuthResponse::from_disconnect(&disconnect)),
            other => Err(self.protocol_violation("AUTH or DISCONNECT", &other).await),
        }
    }

    /// Writes DISCONNECT best-effort, closes the transport unconditionally,
    /// and transitions to Closed.
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed` on every call after the first, and
    /// `NotConnected` before [`Session::connect`].
    pub async fn disconnect(&self, packet: DisconnectPacket) -> Result<()> {
        if self.shared.phase() == SessionPhase::Fresh {
            return Err(MqttError::NotConnected);
        }
        if self.shared.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(MqttError::SessionClosed);
        }

        debug!(reason = ?packet.reason_code, "disconnecting");
        self.shared.set_phase(SessionPhase::ShuttingDown);
        let _ = self.shared.write_packet(&Packet::Disconnect(packet)).await;
        self.shared.teardown().await;
        Ok(())
    }

    /// Worker barrier: resolves once the session has shut down and every
    /// worker task has drained.
    pub async fn closed(&self) {
        let mut shutdown_rx = self.shared.shutdown_rx();
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        let workers: Vec<_> = {
            let mut guard = self.workers.lock().expect("lock poisoned");
            guard.drain(..).collect()
        };
        for worker in workers {
            let _ = worker.await;
        }
    }

    async fn await_reply(&self, rx: oneshot::Receiver<Packet>) -> Result<Packet> {
        match timeout(self.shared.packet_timeout, rx).await {
            // The packet id stays live; the demultiplexer absorbs the late
            // response and frees it.
            Err(_) => Err(MqttError::Timeout),
            Ok(Err(_)) => Err(MqttError::SessionClosed),
            Ok(Ok(packet)) => Ok(packet),
        }
    }

    async fn protocol_violation(&self, expected: &str, received: &Packet) -> MqttError {
        let err = MqttError::ProtocolViolation(format!(
            "expected {expected}, received {:?}",
            received.packet_type()
        ));
        warn!(%err, "terminating session");
        self.shared.shutdown(Some(&err)).await;
        err
    }
}

fn build_connect_packet(options: &ConnectOptions) -> ConnectPacket {
    let mut packet = ConnectPacket::new(options.client_id.clone());
    packet.clean_start = options.clean_start;
    packet.keep_alive = options.keep_alive.as_secs().min(u64::from(u16::MAX)) as u16;
    packet.username = options.username.clone();
    packet.password = options.password.clone();
    packet.will = options.will.clone();

    let props = &options.properties;
    if let Some(v) = props.session_expiry_interval {
        packet.properties.set_session_expiry_interval(v);
    }
    if let Some(v) = props.receive_maximum {
        packet.properties.set_receive_maximum(v);
    }
    if let Some(v) = props.maximum_packet_size {
        packet.properties.set_maximum_packet_size(v);
    }
    if let Some(v) = props.topic_alias_maximum {
        packet.properties.set_topic_alias_maximum(v);
    }
    if let Some(method) = &props.authentication_method {
        packet.properties.set_authentication_method(method.clone());
    }
    if let Some(data) = &props.authentication_data {
        packet.properties.set_authentication_data(data.clone());
    }
    for (key, value) in &props.user_properties {
        packet.properties.add_user_property(key.clone(), value.clone());
    }
    packet
}

async fn router_worker(
    router: Arc<dyn Router>,
    mut queue: mpsc::UnboundedReceiver<PublishPacket>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            publish = queue.recv() => match publish {
                Some(publish) => router.route(&publish),
                None => break,
            }
        }
    }
    debug!("router dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_require_an_established_session() {
        let session = Session::default();
        assert_eq!(session.phase(), SessionPhase::Fresh);

        let subscribe = SubscribePacket::new(vec![]);
        assert!(matches!(
            session.subscribe(subscribe).await,
            Err(MqttError::NotConnected)
        ));

        let publish = PublishPacket::new("t", b"m".to_vec(), QoS::AtMostOnce);
        assert!(matches!(
            session.publish(publish).await,
            Err(MqttError::NotConnected)
        ));

        assert!(matches!(
            session.disconnect(DisconnectPacket::normal()).await,
            Err(MqttError::NotConnected)
        ));
    }

    #[test]
    fn connect_packet_reflects_options() {
        let options = ConnectOptions::new("c9")
            .with_keep_alive(Duration::from_secs(30))
            .with_clean_start(false)
            .with_credentials("user", b"pass".to_vec())
            .with_receive_maximum(7);

        let packet = build_connect_packet(&options);
        assert_eq!(packet.client_id, "c9");
        assert_eq!(packet.keep_alive, 30);
        assert!(!packet.clean_start);
        assert_eq!(packet.username.as_deref(), Some("user"));
        assert_eq!(packet.properties.receive_maximum(), Some(7));
    }

    #[test]
    fn phase_encoding_round_trips() {
        for phase in [
            SessionPhase::Fresh,
            SessionPhase::Connecting,
            SessionPhase::Established,
            SessionPhase::ShuttingDown,
            SessionPhase::Closed,
        ] {
            assert_eq!(SessionPhase::from_u8(phase as u8), phase);
        }
    }
}
