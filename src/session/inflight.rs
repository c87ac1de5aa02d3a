use crate::error::{MqttError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counted window over a peer's Receive Maximum.
///
/// A permit is acquired before a QoS 1 or 2 PUBLISH is written and released
/// when the exchange reaches its terminal packet. Permits are owned by the
/// acquiring task, so cancellation and timeouts release them structurally,
/// exactly once. Closing the window poisons it: pending and future acquires
/// fail with `SessionClosed` instead of deadlocking.
pub(crate) struct InflightWindow {
    semaphore: Arc<Semaphore>,
    capacity: u16,
}

impl InflightWindow {
    pub(crate) fn new(capacity: u16) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(usize::from(capacity))),
            capacity,
        }
    }

    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MqttError::SessionClosed)
    }

    pub(crate) fn close(&self) {
        self.semaphore.close();
    }

    pub(crate) fn capacity(&self) -> u16 {
        self.capacity
    }

    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
