//! Background sweep driving eager eviction

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use crate::factory::ConsumerFactory;
use crate::pool::Shared;

/// Start sweeping `shared` every `period`.
///
/// The task holds only a weak reference to the pool. It stops when the
/// returned sender is used or dropped, or when the pool itself is gone. A
/// sweep that has already started runs to completion so that no destruction
/// is cut short.
pub(crate) fn spawn<F: ConsumerFactory>(shared: &Arc<Shared<F>>, period: Duration) -> oneshot::Sender<()> {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let pool = Arc::downgrade(shared);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    tracing::trace!("sweep stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            let Some(shared) = pool.upgrade() else {
                tracing::trace!("pool dropped, stopping sweep");
                return;
            };
            if shared.is_closed() {
                return;
            }
            tracing::trace!("sweeping for stale consumers");
            Shared::sweep(&shared).await;
        }
    });

    stop_tx
}
