use crate::packet::connack::ConnAckPacket;
use crate::packet::puback::PubAckPacket;
use crate::packet::pubcomp::PubCompPacket;
use crate::packet::pubrec::PubRecPacket;
use crate::protocol::v5::properties::Properties;
use crate::QoS;
use std::time::Duration;

pub use crate::protocol::v5::reason_codes::ReasonCode;

/// Communication properties one side advertises to the other. The server's
/// instance is frozen when CONNACK arrives and validates every subsequent
/// outbound request; the client's instance is frozen at connect entry and
/// reflected to the broker in CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommsProperties {
    pub receive_maximum: u16,
    pub maximum_qos: u8,
    /// 0 means unlimited.
    pub maximum_packet_size: u32,
    pub topic_alias_maximum: u16,
    pub retain_available: bool,
    pub wildcard_sub_available: bool,
    pub sub_id_available: bool,
    pub shared_sub_available: bool,
}

impl Default for CommsProperties {
    fn default() -> Self {
        Self {
            receive_maximum: 65_535,
            maximum_qos: 2,
            maximum_packet_size: 0,
            topic_alias_maximum: 0,
            retain_available: true,
            wildcard_sub_available: true,
            sub_id_available: true,
            shared_sub_available: true,
        }
    }
}

impl CommsProperties {
    /// Adopts every capability the server advertised in CONNACK, keeping
    /// protocol defaults for the rest.
    #[must_use]
    pub fn from_connack(connack: &ConnAckPacket) -> Self {
        let props = &connack.properties;
        let mut caps = Self::default();
        if let Some(v) = props.receive_maximum() {
            caps.receive_maximum = v;
        }
        if let Some(v) = props.maximum_qos() {
            caps.maximum_qos = v;
        }
        if let Some(v) = props.maximum_packet_size() {
            caps.maximum_packet_size = v;
        }
        if let Some(v) = props.topic_alias_maximum() {
            caps.topic_alias_maximum = v;
        }
        if let Some(v) = props.retain_available() {
            caps.retain_available = v;
        }
        if let Some(v) = props.wildcard_subscription_available() {
            caps.wildcard_sub_available = v;
        }
        if let Some(v) = props.subscription_identifier_available() {
            caps.sub_id_available = v;
        }
        if let Some(v) = props.shared_subscription_available() {
            caps.shared_sub_available = v;
        }
        caps
    }
}

/// Properties the client declares in CONNECT.
#[derive(Debug, Clone, Default)]
pub struct ConnectProperties {
    pub session_expiry_interval: Option<u32>,
    pub receive_maximum: Option<u16>,
    pub maximum_packet_size: Option<u32>,
    pub topic_alias_maximum: Option<u16>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Vec<u8>>,
    pub user_properties: Vec<(String, String)>,
}

/// Parameters for the CONNECT handshake.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub keep_alive: Duration,
    pub clean_start: bool,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub will: Option<WillMessage>,
    pub properties: ConnectProperties,
}

impl ConnectOptions {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(60),
            clean_start: true,
            username: None,
            password: None,
            will: None,
            properties: ConnectProperties::default(),
        }
    }

    #[must_use]
    pub fn with_keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = duration;
        self
    }

    #[must_use]
    pub fn with_clean_start(mut self, clean: bool) -> Self {
        self.clean_start = clean;
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_will(mut self, will: WillMessage) -> Self {
        self.will = Some(will);
        self
    }

    #[must_use]
    pub fn with_receive_maximum(mut self, receive_maximum: u16) -> Self {
        self.properties.receive_maximum = Some(receive_maximum);
        self
    }

    #[must_use]
    pub fn with_session_expiry_interval(mut self, seconds: u32) -> Self {
        self.properties.session_expiry_interval = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_authentication(
        mut self,
        method: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.properties.authentication_method = Some(method.into());
        self.properties.authentication_data = Some(data.into());
        self
    }

    /// The communication properties this CONNECT declares, frozen at
    /// connect entry.
    #[must_use]
    pub fn comms_properties(&self) -> CommsProperties {
        let mut caps = CommsProperties::default();
        if let Some(v) = self.properties.receive_maximum {
            caps.receive_maximum = v;
        }
        if let Some(v) = self.properties.maximum_packet_size {
            caps.maximum_packet_size = v;
        }
        if let Some(v) = self.properties.topic_alias_maximum {
            caps.topic_alias_maximum = v;
        }
        caps
    }
}

/// Last Will and Testament attached to CONNECT.
#[derive(Debug, Clone)]
pub struct WillMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub properties: Properties,
}

impl WillMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub fn with_delay_interval(mut self, seconds: u32) -> Self {
        self.properties.set_will_delay_interval(seconds);
        self
    }
}

/// Terminal response of a QoS 1 or 2 publish: the PUBACK, the error PUBREC,
/// or the PUBCOMP that ended the exchange.
#[derive(Debug, Clone)]
pub struct PublishResponse {
    pub packet_id: u16,
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl From<PubAckPacket> for PublishResponse {
    fn from(packet: PubAckPacket) -> Self {
        Self {
            packet_id: packet.packet_id,
            reason_code: packet.reason_code,
            properties: packet.properties,
        }
    }
}

impl From<PubRecPacket> for PublishResponse {
    fn from(packet: PubRecPacket) -> Self {
        Self {
            packet_id: packet.packet_id,
            reason_code: packet.reason_code,
            properties: packet.properties,
        }
    }
}

impl From<PubCompPacket> for PublishResponse {
    fn from(packet: PubCompPacket) -> Self {
        Self {
            packet_id: packet.packet_id,
            reason_code: packet.reason_code,
            properties: packet.properties,
        }
    }
}
