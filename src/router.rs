//! Routing of server-pushed publications.
//!
//! The session core does not match topics; it hands every inbound PUBLISH to
//! a [`Router`] and moves on. Routing runs on a dedicated dispatch worker fed
//! by a queue, never on the reader task, so a slow handler cannot stall
//! acknowledgements or PINGRESP processing. Duplicate QoS 2 deliveries are
//! possible; de-duplication is the router's concern.

use crate::packet::publish::PublishPacket;

pub trait Router: Send + Sync {
    /// Called once per inbound PUBLISH, off the reader task. Must not block
    /// the dispatch worker for long; queue internally if handling is slow.
    fn route(&self, publish: &PublishPacket);
}

/// Discards every publication. The default router, mirroring the default
/// no-op persistence.
#[derive(Debug, Default)]
pub struct NoopRouter;

impl Router for NoopRouter {
    fn route(&self, _publish: &PublishPacket) {}
}

/// Adapts a closure into a [`Router`].
pub struct FnRouter<F>(F);

impl<F> FnRouter<F>
where
    F: Fn(&PublishPacket) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Router for FnRouter<F>
where
    F: Fn(&PublishPacket) + Send + Sync,
{
    fn route(&self, publish: &PublishPacket) {
        (self.0)(publish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QoS;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fn_router_invokes_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let router = FnRouter::new(move |_p| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let publish = PublishPacket::new("a", b"x".to_vec(), QoS::AtMostOnce);
        router.route(&publish);
        router.route(&publish);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
