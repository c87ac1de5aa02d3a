mod common;

use mqtt5_session::packet::connack::ConnAckPacket;
use mqtt5_session::session::{Session, SessionOptions, SessionPhase};
use mqtt5_session::transport::PacketReader;
use mqtt5_session::{ConnectOptions, MqttError, Packet, ReasonCode};
use std::time::Duration;

#[tokio::test]
async fn established_session_adopts_server_properties() {
    common::init_tracing();

    let mut connack = common::success_connack();
    connack.properties.set_receive_maximum(10);
    connack.properties.set_assigned_client_identifier("c17");

    let session = Session::new(SessionOptions::new());
    let options = ConnectOptions::new("provisional").with_receive_maximum(10);
    let _broker = common::connect_session(&session, options, connack).await;

    assert_eq!(session.phase(), SessionPhase::Established);
    assert_eq!(session.client_id(), "c17");
    assert_eq!(session.inflight_capacities(), Some((10, 10)));

    let caps = session.server_capabilities().unwrap();
    assert_eq!(caps.receive_maximum, 10);
    assert_eq!(caps.maximum_qos, 2);
}

#[tokio::test]
async fn connect_sends_protocol_name_and_level() {
    common::init_tracing();

    let (client, mut broker) = tokio::io::duplex(4096);
    let session = Session::new(SessionOptions::new());

    let broker_task = tokio::spawn(async move {
        let packet = broker.read_packet().await.unwrap();
        let connect = match packet {
            Packet::Connect(connect) => connect,
            other => panic!("expected CONNECT, got {other:?}"),
        };
        assert_eq!(connect.client_id, "c1");
        assert_eq!(connect.keep_alive, 25);
        assert!(connect.clean_start);

        use mqtt5_session::transport::PacketWriter;
        broker
            .write_packet(&Packet::ConnAck(common::success_connack()))
            .await
            .unwrap();
        broker
    });

    let options = ConnectOptions::new("c1").with_keep_alive(Duration::from_secs(25));
    let connack = session.connect(client, options).await.unwrap();
    assert_eq!(connack.reason_code, ReasonCode::Success);
    broker_task.await.unwrap();
}

#[tokio::test]
async fn refused_connack_tears_the_session_down() {
    common::init_tracing();

    let (client, mut broker) = tokio::io::duplex(4096);
    let session = Session::new(SessionOptions::new());

    let broker_task = tokio::spawn(async move {
        let _connect = broker.read_packet().await.unwrap();
        let mut connack = ConnAckPacket::new(ReasonCode::BadUsernameOrPassword);
        connack.properties.set_reason_string("bad credentials");
        use mqtt5_session::transport::PacketWriter;
        broker
            .write_packet(&Packet::ConnAck(connack))
            .await
            .unwrap();
        broker
    });

    let err = session
        .connect(client, ConnectOptions::new("c2"))
        .await
        .unwrap_err();
    match err {
        MqttError::ConnectionRefused { code, reason } => {
            assert_eq!(code, ReasonCode::BadUsernameOrPassword);
            assert_eq!(reason.as_deref(), Some("bad credentials"));
        }
        other => panic!("expected ConnectionRefused, got {other:?}"),
    }

    session.closed().await;
    assert_eq!(session.phase(), SessionPhase::Closed);
    broker_task.await.unwrap();
}

#[tokio::test]
async fn missing_connack_times_out() {
    common::init_tracing();

    let (client, mut broker) = tokio::io::duplex(4096);
    let session =
        Session::new(SessionOptions::new().with_packet_timeout(Duration::from_millis(50)));

    // The broker swallows CONNECT and never answers.
    let broker_task = tokio::spawn(async move {
        let _connect = broker.read_packet().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(broker);
    });

    let err = session
        .connect(client, ConnectOptions::new("c3"))
        .await
        .unwrap_err();
    assert!(matches!(err, MqttError::Timeout));
    assert_eq!(session.phase(), SessionPhase::Closed);
    broker_task.await.unwrap();
}

#[tokio::test]
async fn second_connect_is_rejected() {
    common::init_tracing();

    let session = Session::new(SessionOptions::new());
    let _broker =
        common::connect_session(&session, ConnectOptions::new("c4"), common::success_connack())
            .await;

    let (client, _server) = tokio::io::duplex(64);
    let err = session
        .connect(client, ConnectOptions::new("c4"))
        .await
        .unwrap_err();
    assert!(matches!(err, MqttError::AlreadyConnected));
}

#[tokio::test]
async fn transport_failure_during_handshake_is_fatal() {
    common::init_tracing();

    let (client, broker) = tokio::io::duplex(4096);
    drop(broker);

    let session = Session::new(SessionOptions::new());
    let err = session
        .connect(client, ConnectOptions::new("c5"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, MqttError::Io(_) | MqttError::SessionClosed),
        "got {err:?}"
    );
    session.closed().await;
    assert_eq!(session.phase(), SessionPhase::Closed);
}
