//! Packet identifier registry.
//!
//! Binds each outbound request to a single-shot waiter before the packet is
//! written, so a response arriving on the reader task always finds its
//! caller. Identifiers are 1..=65535; reservation suspends when the space is
//! saturated instead of failing, and teardown resolves every outstanding
//! waiter by dropping its sender.

use crate::packet::Packet;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

struct Slots {
    waiters: HashMap<u16, oneshot::Sender<Packet>>,
    cursor: u16,
}

pub struct PacketIdRegistry {
    slots: Mutex<Slots>,
    released: Notify,
}

impl PacketIdRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                waiters: HashMap::new(),
                cursor: 1,
            }),
            released: Notify::new(),
        }
    }

    /// Reserves the next free identifier and binds `waiter` to it. Suspends
    /// while all 65535 identifiers are outstanding; the caller bounds the
    /// wait with its operation deadline.
    pub async fn reserve(&self, waiter: oneshot::Sender<Packet>) -> u16 {
        let mut waiter = waiter;
        loop {
            // Arm the permit before scanning so a release between the failed
            // scan and the await cannot be missed.
            let released = self.released.notified();
            match self.try_reserve(waiter) {
                Ok(id) => return id,
                Err(returned) => {
                    waiter = returned;
                    released.await;
                }
            }
        }
    }

    fn try_reserve(
        &self,
        waiter: oneshot::Sender<Packet>,
    ) -> std::result::Result<u16, oneshot::Sender<Packet>> {
        let mut slots = self.slots.lock().expect("packet id registry poisoned");
        if slots.waiters.len() == usize::from(u16::MAX) {
            return Err(waiter);
        }
        // Next-free scan from the cursor; id 0 is never assigned.
        let mut id = slots.cursor;
        loop {
            if !slots.waiters.contains_key(&id) {
                slots.waiters.insert(id, waiter);
                slots.cursor = if id == u16::MAX { 1 } else { id + 1 };
                return Ok(id);
            }
            id = if id == u16::MAX { 1 } else { id + 1 };
        }
    }

    /// Removes and returns the waiter bound to `id`, freeing the identifier.
    /// Returns `None` for identifiers this session never reserved or has
    /// already resolved.
    pub fn take(&self, id: u16) -> Option<oneshot::Sender<Packet>> {
        let waiter = self
            .slots
            .lock()
            .expect("packet id registry poisoned")
            .waiters
            .remove(&id);
        if waiter.is_some() {
            self.released.notify_one();
        }
        waiter
    }

    /// Whether `id` is currently bound to a waiter.
    #[must_use]
    pub fn contains(&self, id: u16) -> bool {
        self.slots
            .lock()
            .expect("packet id registry poisoned")
            .waiters
            .contains_key(&id)
    }

    /// Frees an identifier whose request never made it onto the wire.
    pub fn release(&self, id: u16) {
        if self
            .slots
            .lock()
            .expect("packet id registry poisoned")
            .waiters
            .remove(&id)
            .is_some()
        {
            self.released.notify_one();
        }
    }

    /// Resolves every outstanding waiter at session teardown. Dropping the
    /// senders wakes each blocked caller with a closed-channel error, which
    /// the session surfaces as `SessionClosed`.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock().expect("packet id registry poisoned");
            slots.waiters.drain().collect()
        };
        drop(drained);
        self.released.notify_waiters();
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.slots
            .lock()
            .expect("packet id registry poisoned")
            .waiters
            .len()
    }
}

impl Default for PacketIdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::puback::PubAckPacket;

    fn waiter() -> (oneshot::Sender<Packet>, oneshot::Receiver<Packet>) {
        oneshot::channel()
    }

    #[tokio::test]
    async fn ids_start_at_one_and_advance() {
        let registry = PacketIdRegistry::new();
        let (tx1, _rx1) = waiter();
        let (tx2, _rx2) = waiter();
        assert_eq!(registry.reserve(tx1).await, 1);
        assert_eq!(registry.reserve(tx2).await, 2);
        assert_eq!(registry.outstanding(), 2);
    }

    #[tokio::test]
    async fn released_id_is_reusable_but_not_preferred() {
        let registry = PacketIdRegistry::new();
        let (tx1, _rx1) = waiter();
        let (tx2, _rx2) = waiter();
        let id1 = registry.reserve(tx1).await;
        registry.release(id1);
        // The cursor has moved past id1, so the next reservation differs.
        let id2 = registry.reserve(tx2).await;
        assert_ne!(id1, id2);
        assert!(!registry.contains(id1));
        assert!(registry.contains(id2));
    }

    #[tokio::test]
    async fn take_delivers_to_the_bound_waiter() {
        let registry = PacketIdRegistry::new();
        let (tx, rx) = waiter();
        let id = registry.reserve(tx).await;

        let sender = registry.take(id).expect("waiter registered");
        sender
            .send(Packet::PubAck(PubAckPacket::new(id)))
            .expect("receiver alive");

        match rx.await.unwrap() {
            Packet::PubAck(p) => assert_eq!(p.packet_id, id),
            other => panic!("unexpected packet {other:?}"),
        }
        assert!(!registry.contains(id));
        assert!(registry.take(id).is_none());
    }

    #[tokio::test]
    async fn cancel_all_wakes_every_receiver() {
        let registry = PacketIdRegistry::new();
        let (tx1, rx1) = waiter();
        let (tx2, rx2) = waiter();
        registry.reserve(tx1).await;
        registry.reserve(tx2).await;

        registry.cancel_all();
        assert_eq!(registry.outstanding(), 0);
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }

    #[tokio::test]
    async fn late_delivery_to_a_gone_caller_is_absorbed() {
        let registry = PacketIdRegistry::new();
        let (tx, rx) = waiter();
        let id = registry.reserve(tx).await;
        drop(rx); // caller timed out

        let sender = registry.take(id).expect("id stays live until resolved");
        assert!(sender.send(Packet::PubAck(PubAckPacket::new(id))).is_err());
        assert_eq!(registry.outstanding(), 0);
    }
}
