//! Ingress demultiplexer.
//!
//! The single reader of the transport. Pulls one control packet at a time
//! and dispatches by type: handshake and reauth waiters, the packet-id
//! waiter table, the QoS 2 auto-responder, the router queue, or the
//! disconnect path. Routing is handed to the dispatch worker so user code
//! can never stall acknowledgements.

use crate::error::MqttError;
use crate::packet::puback::PubAckPacket;
use crate::packet::pubcomp::PubCompPacket;
use crate::packet::pubrec::PubRecPacket;
use crate::packet::pubrel::PubRelPacket;
use crate::packet::Packet;
use crate::protocol::v5::reason_codes::ReasonCode;
use crate::session::{PacketSource, Shared};
use crate::transport::PacketReader;
use crate::QoS;
use std::ops::ControlFlow;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) async fn run(shared: Arc<Shared>, mut reader: PacketSource) {
    let mut shutdown_rx = shared.shutdown_rx();
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let packet = tokio::select! {
            _ = shutdown_rx.changed() => break,
            result = reader.read_packet() => match result {
                Ok(packet) => packet,
                Err(err) => {
                    shared.shutdown(Some(&err)).await;
                    break;
                }
            }
        };

        debug!(packet_type = ?packet.packet_type(), "received control packet");
        if dispatch(&shared, packet).await.is_break() {
            break;
        }
    }
    debug!("ingress demultiplexer stopped");
}

async fn dispatch(shared: &Arc<Shared>, packet: Packet) -> ControlFlow<()> {
    match packet {
        Packet::ConnAck(connack) => {
            let waiter = shared.connack_slot.lock().expect("slot poisoned").take();
            match waiter {
                Some(tx) => {
                    let _ = tx.send(connack);
                }
                None => {
                    let err =
                        MqttError::ProtocolViolation("CONNACK outside the handshake".to_string());
                    shared.shutdown(Some(&err)).await;
                    return ControlFlow::Break(());
                }
            }
        }

        Packet::Auth(auth) => match auth.reason_code {
            // Challenge rounds never involve the blocked caller.
            ReasonCode::ContinueAuthentication => match &shared.auther {
                Some(auther) => {
                    let next = auther.authenticate(auth);
                    if let Err(err) = shared.write_packet(&Packet::Auth(next)).await {
                        shared.shutdown(Some(&err)).await;
                        return ControlFlow::Break(());
                    }
                }
                None => warn!("AUTH challenge received but no auther is configured"),
            },
            ReasonCode::Success => {
                if let Some(auther) = shared.auther.clone() {
                    tokio::spawn(async move { auther.authenticated() });
                }
                if let Some(tx) = shared.reauth_slot.lock().expect("slot poisoned").take() {
                    let _ = tx.send(Packet::Auth(auth));
                }
            }
            other => warn!(reason = ?other, "ignoring AUTH with unexpected reason"),
        },

        Packet::Publish(publish) => {
            let qos = publish.qos;
            let packet_id = publish.packet_id;
            shared.route(publish);
            match (qos, packet_id) {
                (QoS::AtLeastOnce, Some(id)) => {
                    let ack = Packet::PubAck(PubAckPacket::new(id));
                    if let Err(err) = shared.write_packet(&ack).await {
                        shared.shutdown(Some(&err)).await;
                        return ControlFlow::Break(());
                    }
                }
                (QoS::ExactlyOnce, Some(id)) => {
                    // Duplicate delivery is possible; de-dup is the
                    // router's concern.
                    let ack = Packet::PubRec(PubRecPacket::new(id));
                    if let Err(err) = shared.write_packet(&ack).await {
                        shared.shutdown(Some(&err)).await;
                        return ControlFlow::Break(());
                    }
                }
                _ => {}
            }
        }

        Packet::PubAck(_) | Packet::PubComp(_) | Packet::SubAck(_) | Packet::UnsubAck(_) => {
            let id = packet.packet_id().expect("response packets carry an id");
            match shared.registry.take(id) {
                // A send failure means the caller stopped waiting; the late
                // response is absorbed and the id freed.
                Some(tx) => {
                    let _ = tx.send(packet);
                }
                None => debug!(packet_id = id, "response for unknown packet id dropped"),
            }
        }

        Packet::PubRec(pubrec) => {
            let id = pubrec.packet_id;
            if !shared.registry.contains(id) {
                warn!(packet_id = id, "PUBREC for unknown packet id");
                let release = PubRelPacket::new(id)
                    .with_reason(ReasonCode::PacketIdentifierNotFound);
                if let Err(err) = shared.write_packet(&Packet::PubRel(release)).await {
                    shared.shutdown(Some(&err)).await;
                    return ControlFlow::Break(());
                }
            } else if pubrec.reason_code.is_error() {
                // The exchange terminates early with the error.
                if let Some(tx) = shared.registry.take(id) {
                    let _ = tx.send(Packet::PubRec(pubrec));
                }
            } else {
                // Keep the waiter armed for PUBCOMP. A duplicate PUBREC
                // lands here again and re-sends PUBREL.
                let release = Packet::PubRel(PubRelPacket::new(id));
                if let Err(err) = shared.write_packet(&release).await {
                    shared.shutdown(Some(&err)).await;
                    return ControlFlow::Break(());
                }
            }
        }

        Packet::PubRel(pubrel) => {
            if pubrel.reason_code.is_error() {
                debug!(packet_id = pubrel.packet_id, "dropping failed PUBREL");
            } else {
                let complete = Packet::PubComp(PubCompPacket::new(pubrel.packet_id));
                if let Err(err) = shared.write_packet(&complete).await {
                    shared.shutdown(Some(&err)).await;
                    return ControlFlow::Break(());
                }
            }
        }

        Packet::PingResp => {
            shared.ping_outstanding.store(false, Ordering::SeqCst);
        }

        Packet::Disconnect(disconnect) => {
            if let Some(on_disconnect) = shared.on_disconnect.lock().expect("slot poisoned").take()
            {
                on_disconnect(disconnect.clone());
            }
            if let Some(tx) = shared.reauth_slot.lock().expect("slot poisoned").take() {
                let _ = tx.send(Packet::Disconnect(disconnect.clone()));
            }
            let err = MqttError::RemoteDisconnect {
                code: disconnect.reason_code,
                reason: disconnect
                    .properties
                    .reason_string()
                    .map(ToString::to_string),
            };
            shared.shutdown(Some(&err)).await;
            return ControlFlow::Break(());
        }

        other => {
            let err = MqttError::ProtocolViolation(format!(
                "unexpected {:?} from the server",
                other.packet_type()
            ));
            shared.shutdown(Some(&err)).await;
            return ControlFlow::Break(());
        }
    }

    ControlFlow::Continue(())
}
