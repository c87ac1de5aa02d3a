//! # MQTT v5.0 Client Session Core
//!
//! The session state machine of an MQTT v5 client: it drives a single
//! already-established byte-duplex transport through the CONNECT/CONNACK
//! handshake, manages inflight publish/subscribe exchanges with QoS 0/1/2
//! delivery semantics, demultiplexes server-pushed publications to a
//! routing layer, handles the enhanced authentication exchange, honors
//! server-advertised capability limits, and terminates cleanly on local or
//! remote disconnect.
//!
//! Transport establishment, reconnection supervision, and topic matching
//! live outside this crate: the session accepts anything implementing the
//! tokio I/O traits and hands publications to a [`router::Router`].
//!
//! ```rust,no_run
//! use mqtt5_session::packet::publish::PublishPacket;
//! use mqtt5_session::session::{Session, SessionOptions};
//! use mqtt5_session::transport::connect_tcp;
//! use mqtt5_session::{ConnectOptions, QoS};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = connect_tcp("test.mosquitto.org:1883").await?;
//!
//!     let session = Session::new(SessionOptions::new());
//!     session
//!         .connect(stream, ConnectOptions::new("sensor-17"))
//!         .await?;
//!
//!     let publish = PublishPacket::new("sensors/17/temp", b"23.5".to_vec(), QoS::AtLeastOnce);
//!     let response = session.publish(publish).await?;
//!     println!("acknowledged: {response:?}");
//!
//!     session
//!         .disconnect(mqtt5_session::packet::disconnect::DisconnectPacket::normal())
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod encoding;
pub mod error;
pub mod packet;
pub mod packet_id;
pub mod persist;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;
pub mod types;

pub use auth::{AuthResponse, Auther};
pub use error::{Capability, MqttError, Result};
pub use packet::{FixedHeader, MqttPacket, Packet, PacketType};
pub use persist::{MemoryPersistence, NoopPersistence, Persistence};
pub use protocol::v5::properties::{Properties, PropertyId, PropertyValue};
pub use protocol::v5::reason_codes::ReasonCode;
pub use router::{FnRouter, NoopRouter, Router};
pub use session::{Session, SessionOptions, SessionPhase};
pub use types::{
    CommsProperties, ConnectOptions, ConnectProperties, PublishResponse, WillMessage,
};

/// Quality of service of a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_wire_values() {
        assert_eq!(u8::from(QoS::AtMostOnce), 0);
        assert_eq!(u8::from(QoS::AtLeastOnce), 1);
        assert_eq!(u8::from(QoS::ExactlyOnce), 2);
    }
}
