//! Shared helpers: tracing init and a scripted broker over an in-memory
//! duplex pipe.
#![allow(dead_code)]

use mqtt5_session::packet::connack::ConnAckPacket;
use mqtt5_session::session::Session;
use mqtt5_session::transport::{PacketReader, PacketWriter};
use mqtt5_session::{ConnectOptions, Packet, ReasonCode};
use std::sync::Once;
use std::time::Duration;
use tokio::io::DuplexStream;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
            .with_target(true)
            .with_test_writer()
            .init();
    });
}

#[must_use]
pub fn success_connack() -> ConnAckPacket {
    ConnAckPacket::new(ReasonCode::Success)
}

/// Completes the CONNECT/CONNACK handshake against a scripted peer and
/// returns the broker end of the pipe for further scripting.
pub async fn connect_session(
    session: &Session,
    options: ConnectOptions,
    connack: ConnAckPacket,
) -> DuplexStream {
    let (client, mut broker) = tokio::io::duplex(4096);

    let handshake = tokio::spawn(async move {
        let packet = broker.read_packet().await.expect("CONNECT on the wire");
        assert!(
            matches!(packet, Packet::Connect(_)),
            "expected CONNECT, got {packet:?}"
        );
        broker
            .write_packet(&Packet::ConnAck(connack))
            .await
            .expect("CONNACK written");
        broker
    });

    session
        .connect(client, options)
        .await
        .expect("handshake succeeds");
    handshake.await.expect("broker task")
}

/// Asserts that nothing lands on the wire within `window`.
pub async fn assert_silent(broker: &mut DuplexStream, window: Duration) {
    let mut byte = [0u8; 1];
    let read = tokio::time::timeout(
        window,
        tokio::io::AsyncReadExt::read(broker, &mut byte),
    )
    .await;
    assert!(read.is_err(), "unexpected bytes on the wire");
}
