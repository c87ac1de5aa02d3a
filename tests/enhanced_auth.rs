//! Enhanced authentication: client-initiated re-authentication, multi-round
//! challenges driven off the reader task, and server aborts.

mod common;

use mqtt5_session::packet::auth::AuthPacket;
use mqtt5_session::packet::disconnect::DisconnectPacket;
use mqtt5_session::session::{Session, SessionOptions};
use mqtt5_session::transport::{PacketReader, PacketWriter};
use mqtt5_session::{AuthResponse, Auther, ConnectOptions, MqttError, Packet, ReasonCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted SCRAM-like auther: echoes challenges, counts calls.
struct CountingAuther {
    challenges: AtomicUsize,
    successes: AtomicUsize,
}

impl CountingAuther {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            challenges: AtomicUsize::new(0),
            successes: AtomicUsize::new(0),
        })
    }
}

impl Auther for CountingAuther {
    fn authenticate(&self, auth: AuthPacket) -> AuthPacket {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        let method = auth
            .properties
            .authentication_method()
            .unwrap_or("TEST")
            .to_string();
        AuthPacket::continue_authentication()
            .with_method(method)
            .with_data(&b"client-final"[..])
    }

    fn authenticated(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn reauthentication_completes_on_success_auth() {
    common::init_tracing();

    let auther = CountingAuther::new();
    let session = Session::new(SessionOptions::new().with_auther(auther.clone()));
    let mut broker = common::connect_session(
        &session,
        ConnectOptions::new("auth1"),
        common::success_connack(),
    )
    .await;

    let broker_task = tokio::spawn(async move {
        match broker.read_packet().await.unwrap() {
            Packet::Auth(auth) => {
                assert_eq!(auth.reason_code, ReasonCode::ContinueAuthentication);
                assert_eq!(auth.properties.authentication_method(), Some("TEST"));
            }
            other => panic!("expected AUTH, got {other:?}"),
        }
        let success = AuthPacket::new(ReasonCode::Success).with_method("TEST");
        broker.write_packet(&Packet::Auth(success)).await.unwrap();
        broker
    });

    let request = AuthPacket::continue_authentication().with_method("TEST");
    let response = session.authenticate(request).await.unwrap();
    assert!(response.is_ok());
    broker_task.await.unwrap();

    // Give the spawned notification a chance to run.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(auther.successes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn challenge_rounds_run_on_the_reader_without_the_caller() {
    common::init_tracing();

    let auther = CountingAuther::new();
    let session = Session::new(SessionOptions::new().with_auther(auther.clone()));
    let mut broker = common::connect_session(
        &session,
        ConnectOptions::new("auth2"),
        common::success_connack(),
    )
    .await;

    let broker_task = tokio::spawn(async move {
        // Initial AUTH from the caller.
        match broker.read_packet().await.unwrap() {
            Packet::Auth(auth) => {
                assert_eq!(auth.reason_code, ReasonCode::ContinueAuthentication);
            }
            other => panic!("expected AUTH, got {other:?}"),
        }

        // One challenge round: the demultiplexer must answer with the
        // auther's next packet, not the blocked caller.
        let challenge = AuthPacket::continue_authentication()
            .with_method("TEST")
            .with_data(&b"server-first"[..]);
        broker.write_packet(&Packet::Auth(challenge)).await.unwrap();
        match broker.read_packet().await.unwrap() {
            Packet::Auth(reply) => {
                assert_eq!(reply.reason_code, ReasonCode::ContinueAuthentication);
                assert_eq!(
                    reply.properties.authentication_data().map(|b| &b[..]),
                    Some(&b"client-final"[..])
                );
            }
            other => panic!("expected AUTH, got {other:?}"),
        }

        let success = AuthPacket::new(ReasonCode::Success).with_method("TEST");
        broker.write_packet(&Packet::Auth(success)).await.unwrap();
    });

    let request = AuthPacket::continue_authentication().with_method("TEST");
    let response = session.authenticate(request).await.unwrap();
    assert!(response.is_ok());
    assert_eq!(auther.challenges.load(Ordering::SeqCst), 1);
    broker_task.await.unwrap();
}

#[tokio::test]
async fn server_disconnect_fails_the_reauthentication() {
    common::init_tracing();

    let session = Session::new(SessionOptions::new());
    let mut broker = common::connect_session(
        &session,
        ConnectOptions::new("auth3"),
        common::success_connack(),
    )
    .await;

    let broker_task = tokio::spawn(async move {
        let _auth = broker.read_packet().await.unwrap();
        let mut disconnect = DisconnectPacket::new(ReasonCode::NotAuthorized);
        disconnect.properties.set_reason_string("re-auth denied");
        broker
            .write_packet(&Packet::Disconnect(disconnect))
            .await
            .unwrap();
    });

    let request = AuthPacket::continue_authentication().with_method("TEST");
    let response = session.authenticate(request).await.unwrap();
    match response {
        AuthResponse::Failed { code, reason } => {
            assert_eq!(code, ReasonCode::NotAuthorized);
            assert_eq!(reason.as_deref(), Some("re-auth denied"));
        }
        AuthResponse::Ok(_) => panic!("expected failure"),
    }
    broker_task.await.unwrap();

    // A server DISCONNECT is fatal regardless of the auth outcome.
    session.closed().await;
    let err = session
        .authenticate(AuthPacket::continue_authentication())
        .await
        .unwrap_err();
    assert!(matches!(err, MqttError::SessionClosed));
}

#[tokio::test]
async fn overlapping_reauthentication_is_rejected() {
    common::init_tracing();

    let session = Arc::new(Session::new(
        SessionOptions::new().with_packet_timeout(Duration::from_millis(200)),
    ));
    let mut broker = common::connect_session(
        &session,
        ConnectOptions::new("auth4"),
        common::success_connack(),
    )
    .await;

    // The broker reads the first AUTH and stays silent until the caller's
    // deadline has passed.
    let broker_task = tokio::spawn(async move {
        let _auth = broker.read_packet().await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        drop(broker);
    });

    let first = {
        let session = session.clone();
        tokio::spawn(async move {
            session
                .authenticate(AuthPacket::continue_authentication())
                .await
        })
    };
    // Let the first round register its waiter.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = session
        .authenticate(AuthPacket::continue_authentication())
        .await
        .unwrap_err();
    assert!(matches!(err, MqttError::ReauthInProgress));

    let first = first.await.unwrap();
    assert!(matches!(first, Err(MqttError::Timeout)));
    broker_task.await.unwrap();
}
