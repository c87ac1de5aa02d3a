//! Storage of unacknowledged outbound QoS 1 and 2 publications.
//!
//! The session calls [`Persistence::put`] before a QoS above 0 PUBLISH first
//! reaches the wire and [`Persistence::delete`] on terminal completion. A
//! supervising layer can replay [`Persistence::list`] after reconnecting;
//! the core itself never retries.

use crate::packet::publish::PublishPacket;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait Persistence: Send + Sync {
    fn put(&self, packet_id: u16, publish: &PublishPacket);
    fn get(&self, packet_id: u16) -> Option<PublishPacket>;
    fn delete(&self, packet_id: u16);
    fn list(&self) -> Vec<u16>;
}

/// Stores nothing. The default.
#[derive(Debug, Default)]
pub struct NoopPersistence;

impl Persistence for NoopPersistence {
    fn put(&self, _packet_id: u16, _publish: &PublishPacket) {}

    fn get(&self, _packet_id: u16) -> Option<PublishPacket> {
        None
    }

    fn delete(&self, _packet_id: u16) {}

    fn list(&self) -> Vec<u16> {
        Vec::new()
    }
}

/// Keeps inflight publications in a map, for tests and for callers that
/// resume sessions within one process.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    packets: Mutex<HashMap<u16, PublishPacket>>,
}

impl Persistence for MemoryPersistence {
    fn put(&self, packet_id: u16, publish: &PublishPacket) {
        self.packets
            .lock()
            .expect("persistence lock poisoned")
            .insert(packet_id, publish.clone());
    }

    fn get(&self, packet_id: u16) -> Option<PublishPacket> {
        self.packets
            .lock()
            .expect("persistence lock poisoned")
            .get(&packet_id)
            .cloned()
    }

    fn delete(&self, packet_id: u16) {
        self.packets
            .lock()
            .expect("persistence lock poisoned")
            .remove(&packet_id);
    }

    fn list(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self
            .packets
            .lock()
            .expect("persistence lock poisoned")
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QoS;

    #[test]
    fn memory_persistence_tracks_inflight_ids() {
        let store = MemoryPersistence::default();
        let publish = PublishPacket::new("t", b"m".to_vec(), QoS::AtLeastOnce);

        store.put(3, &publish);
        store.put(1, &publish);
        assert_eq!(store.list(), vec![1, 3]);
        assert_eq!(store.get(3).unwrap().topic_name, "t");

        store.delete(3);
        assert_eq!(store.list(), vec![1]);
        assert!(store.get(3).is_none());
    }
}
