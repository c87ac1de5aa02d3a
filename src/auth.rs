//! Enhanced authentication (MQTT v5 AUTH exchange).
//!
//! Multi-round challenges are driven by the reader task calling
//! [`Auther::authenticate`] for each CONTINUE round; the caller blocked in
//! `Session::authenticate` only sees the terminal outcome.

use crate::packet::auth::AuthPacket;
use crate::packet::disconnect::DisconnectPacket;
use crate::protocol::v5::reason_codes::ReasonCode;

pub trait Auther: Send + Sync {
    /// Produces the next AUTH packet for a server challenge.
    fn authenticate(&self, auth: AuthPacket) -> AuthPacket;

    /// Best-effort notification that the exchange completed successfully.
    fn authenticated(&self);
}

/// Terminal outcome of a re-authentication round.
#[derive(Debug, Clone)]
pub enum AuthResponse {
    /// The server accepted with an AUTH packet carrying reason SUCCESS.
    Ok(AuthPacket),
    /// The server aborted the exchange with DISCONNECT.
    Failed {
        code: ReasonCode,
        reason: Option<String>,
    },
}

impl AuthResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, AuthResponse::Ok(_))
    }

    pub(crate) fn from_disconnect(disconnect: &DisconnectPacket) -> Self {
        AuthResponse::Failed {
            code: disconnect.reason_code,
            reason: disconnect
                .properties
                .reason_string()
                .map(ToString::to_string),
        }
    }
}
