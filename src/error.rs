use crate::protocol::v5::reason_codes::ReasonCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MqttError>;

/// Server capability a request was validated against before any wire
/// activity. Carried by [`MqttError::CapabilityDenied`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    WildcardSubscription,
    SubscriptionIdentifier,
    SharedSubscription,
    MaximumQoS,
    Retain,
    TopicAlias,
    MaximumPacketSize,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WildcardSubscription => "wildcard subscriptions",
            Self::SubscriptionIdentifier => "subscription identifiers",
            Self::SharedSubscription => "shared subscriptions",
            Self::MaximumQoS => "requested QoS",
            Self::Retain => "retained messages",
            Self::TopicAlias => "topic alias",
            Self::MaximumPacketSize => "packet size",
        };
        f.write_str(name)
    }
}

/// MQTT session and protocol errors
///
/// Fatal errors (`Io`, `ProtocolViolation`, `ConnectionRefused`,
/// `RemoteDisconnect`, `KeepAliveTimeout`) tear the session down through the
/// single error path; every blocked caller then observes `SessionClosed`.
/// Pre-flight rejections (`CapabilityDenied`) and per-request failures
/// (`PublishRejected`, `SubscribeFailed`, `Timeout`) leave the session live.
#[derive(Error, Debug, Clone)]
pub enum MqttError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Timeout")]
    Timeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Session closed")]
    SessionClosed,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Server does not support {0}")]
    CapabilityDenied(Capability),

    #[error("Connection refused: {code:?}")]
    ConnectionRefused {
        code: ReasonCode,
        reason: Option<String>,
    },

    #[error("Subscribe failed: {code:?}")]
    SubscribeFailed {
        code: ReasonCode,
        reason: Option<String>,
    },

    #[error("At least one requested subscription failed")]
    PartialSubscribeFailure(Vec<ReasonCode>),

    #[error("Unsubscribe failed: {code:?}")]
    UnsubscribeFailed {
        code: ReasonCode,
        reason: Option<String>,
    },

    #[error("At least one requested unsubscribe failed")]
    PartialUnsubscribeFailure(Vec<ReasonCode>),

    #[error("Publish rejected: {0:?}")]
    PublishRejected(ReasonCode),

    #[error("Server disconnected: {code:?}")]
    RemoteDisconnect {
        code: ReasonCode,
        reason: Option<String>,
    },

    #[error("Keep alive timeout")]
    KeepAliveTimeout,

    #[error("Re-authentication already in progress")]
    ReauthInProgress,

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Invalid packet type: {0}")]
    InvalidPacketType(u8),

    #[error("Invalid QoS: {0}")]
    InvalidQoS(u8),

    #[error("Invalid reason code: {0}")]
    InvalidReasonCode(u8),

    #[error("Invalid property ID: {0}")]
    InvalidPropertyId(u8),

    #[error("Duplicate property ID: {0}")]
    DuplicatePropertyId(u8),

    #[error("Packet too large: size {size} exceeds maximum {max}")]
    PacketTooLarge { size: usize, max: usize },
}

impl MqttError {
    /// Whether this error terminates the session when it reaches the error
    /// path. Non-fatal errors return to the calling operation only.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MqttError::Io(_)
                | MqttError::ProtocolViolation(_)
                | MqttError::ConnectionRefused { .. }
                | MqttError::RemoteDisconnect { .. }
                | MqttError::KeepAliveTimeout
        )
    }
}

impl From<std::io::Error> for MqttError {
    fn from(err: std::io::Error) -> Self {
        MqttError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = MqttError::CapabilityDenied(Capability::Retain);
        assert_eq!(err.to_string(), "Server does not support retained messages");

        let err = MqttError::PacketTooLarge { size: 900, max: 512 };
        assert_eq!(
            err.to_string(),
            "Packet too large: size 900 exceeds maximum 512"
        );
    }

    #[test]
    fn fatality_split() {
        assert!(MqttError::Io("broken pipe".into()).is_fatal());
        assert!(MqttError::RemoteDisconnect {
            code: ReasonCode::SessionTakenOver,
            reason: None
        }
        .is_fatal());
        assert!(!MqttError::Timeout.is_fatal());
        assert!(!MqttError::PublishRejected(ReasonCode::NotAuthorized).is_fatal());
        assert!(!MqttError::CapabilityDenied(Capability::TopicAlias).is_fatal());
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: MqttError = io.into();
        match err {
            MqttError::Io(msg) => assert!(msg.contains("reset by peer")),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
