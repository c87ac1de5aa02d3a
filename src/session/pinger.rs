use crate::error::MqttError;
use crate::packet::Packet;
use crate::session::Shared;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Keepalive pinger.
///
/// Fires at three quarters of the negotiated keep-alive so a PINGREQ always
/// reaches the peer strictly before the interval elapses since the last
/// write. The response deadline is the next tick: a PINGREQ still
/// outstanding when the tick fires means the peer went silent, and the
/// session error path runs with `KeepAliveTimeout`.
pub(crate) async fn run(shared: Arc<Shared>, keep_alive: Duration) {
    let period = keep_alive.mul_f64(0.75).max(Duration::from_millis(50));
    let mut shutdown_rx = shared.shutdown_rx();
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks.tick().await; // the first tick fires immediately

    debug!(period_ms = period.as_millis() as u64, "pinger started");
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticks.tick() => {
                if shared.ping_outstanding.swap(true, Ordering::SeqCst) {
                    warn!("no PINGRESP within the keep alive window");
                    shared.shutdown(Some(&MqttError::KeepAliveTimeout)).await;
                    break;
                }
                if let Err(err) = shared.write_packet(&Packet::PingReq).await {
                    shared.shutdown(Some(&err)).await;
                    break;
                }
            }
        }
    }
    debug!("pinger stopped");
}
