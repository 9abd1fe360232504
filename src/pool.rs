//! Round-robin consumer pool

use crate::config::PoolConfiguration;
use crate::errors::{BoxError, PoolError, PoolResult, ReleaseError};
use crate::events::{DestroyReason, PoolEvent};
use crate::eviction::{EvictionPolicy, EvictionReason};
use crate::factory::ConsumerFactory;
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::notify::{Signal, Signals, Subscription};
use crate::record::ConsumerRecord;
use crate::sweeper;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Mutable pool state, only touched under [`Shared::state`]
struct PoolState<C> {
    live: Vec<ConsumerRecord<C>>,
    pending: usize,
    cursor: usize,
    closed: bool,
    next_id: u64,
}

impl<C> PoolState<C> {
    fn new() -> Self {
        Self {
            live: Vec::new(),
            pending: 0,
            cursor: 0,
            closed: false,
            next_id: 0,
        }
    }

    fn has_room(&self, max_up: usize) -> bool {
        self.live.len() + self.pending < max_up
    }

    fn busy_count(&self) -> usize {
        self.live.iter().filter(|record| record.busy).count()
    }

    /// First idle record at or after the cursor, wrapping around.
    fn next_idle(&self) -> Option<usize> {
        let len = self.live.len();
        (0..len)
            .map(|offset| (self.cursor + offset) % len)
            .find(|&idx| !self.live[idx].busy)
    }

    fn grant(&mut self, idx: usize) -> (u64, Arc<C>) {
        let record = &mut self.live[idx];
        let handle = record.grant();
        let id = record.id;
        self.cursor = (idx + 1) % self.live.len();
        (id, handle)
    }

    /// Remove a record, keeping the cursor on the same successor.
    fn remove(&mut self, idx: usize) -> ConsumerRecord<C> {
        let record = self.live.remove(idx);
        if idx < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.live.len() {
            self.cursor = 0;
        }
        record
    }

    fn take_stale(
        &mut self,
        policy: &EvictionPolicy,
        now: Instant,
    ) -> Vec<(ConsumerRecord<C>, EvictionReason)> {
        let mut stale = Vec::new();
        let mut idx = 0;
        while idx < self.live.len() {
            match policy.verdict(&self.live[idx], now) {
                Some(reason) => stale.push((self.remove(idx), reason)),
                None => idx += 1,
            }
        }
        stale
    }

    fn drain(&mut self) -> Vec<ConsumerRecord<C>> {
        self.cursor = 0;
        std::mem::take(&mut self.live)
    }
}

/// State shared between pool handles, creation tasks and the sweeper
pub(crate) struct Shared<F: ConsumerFactory> {
    factory: F,
    config: PoolConfiguration,
    policy: EvictionPolicy,
    state: Mutex<PoolState<F::Consumer>>,
    signals: Signals,
    metrics: MetricsTracker,
    events: broadcast::Sender<PoolEvent>,
    stop_sweeper: Mutex<Option<oneshot::Sender<()>>>,
}

impl<F: ConsumerFactory> Shared<F> {
    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn publish(&self, event: PoolEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Run the destruction function for a record that has already been
    /// removed from the live collection.
    async fn destroy(
        shared: Arc<Self>,
        record: ConsumerRecord<F::Consumer>,
        reason: DestroyReason,
    ) -> Result<(), BoxError> {
        let id = record.id;
        let age = record.created_at.elapsed();
        let result = shared.factory.destroy(record.handle).await;

        MetricsTracker::incr(&shared.metrics.consumers_destroyed);
        match &result {
            Ok(()) => {
                tracing::info!(consumer_id = id, ?reason, ?age, "consumer destroyed");
            }
            Err(err) => {
                MetricsTracker::incr(&shared.metrics.destruction_failures);
                tracing::warn!(consumer_id = id, ?reason, error = %err, "consumer destruction failed");
            }
        }
        shared.publish(PoolEvent::Destroyed {
            id,
            reason,
            success: result.is_ok(),
        });
        result
    }

    /// One pass of the background sweep.
    pub(crate) async fn sweep(shared: &Arc<Self>) {
        let stale = {
            let mut state = shared.state.lock();
            if state.closed {
                return;
            }
            state.take_stale(&shared.policy, Instant::now())
        };
        if stale.is_empty() {
            return;
        }

        tracing::debug!(count = stale.len(), "sweep evicting stale consumers");
        let mut destroys = JoinSet::new();
        for (record, reason) in stale {
            MetricsTracker::incr(&shared.metrics.eager_evictions);
            destroys.spawn(Self::destroy(Arc::clone(shared), record, reason.into()));
        }
        // Failures are already logged and counted by `destroy`
        while destroys.join_next().await.is_some() {}
    }

    /// Mark a granted consumer idle again.
    fn release(&self, handle: &Arc<F::Consumer>) -> Result<u64, ReleaseError> {
        let id = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(ReleaseError::Closed);
            }
            let record = state
                .live
                .iter_mut()
                .find(|record| record.owns(handle))
                .ok_or(ReleaseError::UnknownConsumer)?;
            if !record.busy {
                return Err(ReleaseError::NotGranted(record.id));
            }
            record.release();
            record.id
        };

        MetricsTracker::incr(&self.metrics.total_releases);
        self.signals.fire(Signal::Released);
        Ok(id)
    }
}

/// Capacity claimed for a creation in flight.
///
/// Dropping an uncommitted reservation gives the slot back, so a panicking
/// creation function cannot leak capacity.
struct Reservation<F: ConsumerFactory> {
    shared: Arc<Shared<F>>,
    armed: bool,
}

enum Commit<C> {
    Granted(Arc<C>),
    Failed(BoxError),
    Closed(ConsumerRecord<C>),
}

impl<F: ConsumerFactory> Reservation<F> {
    fn new(shared: Arc<Shared<F>>) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    fn commit(mut self, outcome: Result<F::Consumer, BoxError>) -> Commit<F::Consumer> {
        self.armed = false;
        let shared = &self.shared;

        let consumer = match outcome {
            Ok(consumer) => consumer,
            Err(err) => {
                shared.state.lock().pending -= 1;
                MetricsTracker::incr(&shared.metrics.creation_failures);
                tracing::warn!(error = %err, "consumer creation failed");
                shared.signals.fire(Signal::Created);
                return Commit::Failed(err);
            }
        };

        let handle = Arc::new(consumer);
        let now = Instant::now();
        let id = {
            let mut state = shared.state.lock();
            state.pending -= 1;
            let id = state.next_id;
            state.next_id += 1;
            let record =
                ConsumerRecord::granted(id, Arc::clone(&handle), now, shared.policy.expiry_for(now));
            if state.closed {
                return Commit::Closed(record);
            }
            state.live.push(record);
            id
        };

        MetricsTracker::incr(&shared.metrics.consumers_created);
        MetricsTracker::incr(&shared.metrics.total_grants);
        tracing::info!(consumer_id = id, "consumer created");
        shared.publish(PoolEvent::Created { id });
        shared.signals.fire(Signal::Created);
        Commit::Granted(handle)
    }
}

impl<F: ConsumerFactory> Drop for Reservation<F> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.state.lock().pending -= 1;
            tracing::warn!("consumer creation abandoned");
            self.shared.signals.fire(Signal::Created);
        }
    }
}

/// Caller side of a creation in flight.
///
/// Dropped before the result was read, it hands a consumer that was already
/// sent back to the pool instead of leaving it granted to nobody.
struct Creation<F: ConsumerFactory> {
    rx: oneshot::Receiver<PoolResult<Arc<F::Consumer>>>,
    shared: Arc<Shared<F>>,
}

impl<F: ConsumerFactory> Drop for Creation<F> {
    fn drop(&mut self) {
        // After close a later send fails and the creation task releases instead
        self.rx.close();
        if let Ok(Ok(handle)) = self.rx.try_recv()
            && let Ok(id) = self.shared.release(&handle)
        {
            tracing::debug!(consumer_id = id, "created consumer had no taker");
        }
    }
}

/// What one evaluation of the acquire algorithm decided
enum Step<'a, C> {
    Grow,
    Wait(Signal, Subscription<'a>),
    Evict(ConsumerRecord<C>, EvictionReason),
    Granted(u64, Arc<C>),
}

/// Bounded pool handing out consumers in round-robin order
///
/// Cloning the pool is cheap and yields another handle to the same consumers.
/// All operations must run inside a Tokio runtime.
///
/// # Examples
///
/// ```
/// use roundrobin_pool::{BoxError, FnFactory, PoolConfiguration, RoundRobinPool};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = RoundRobinPool::new(
///     FnFactory::new(|| async { Ok::<_, BoxError>(String::from("worker")) }),
///     PoolConfiguration::new()
///         .with_max_up(4)
///         .with_max_age(Duration::from_secs(300)),
/// )?;
///
/// let worker = pool.acquire().await?;
/// assert_eq!(worker.as_str(), "worker");
/// pool.release(&worker)?;
///
/// pool.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct RoundRobinPool<F: ConsumerFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ConsumerFactory> Clone for RoundRobinPool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ConsumerFactory> RoundRobinPool<F> {
    /// Create a pool around `factory`.
    ///
    /// With lazy eviction disabled this starts the background sweep.
    pub fn new(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        config.validate()?;

        let policy = config.eviction_policy();
        let (events, _) = broadcast::channel(config.event_capacity);
        let shared = Arc::new(Shared {
            factory,
            policy,
            state: Mutex::new(PoolState::new()),
            signals: Signals::new(),
            metrics: MetricsTracker::new(),
            events,
            stop_sweeper: Mutex::new(None),
            config,
        });

        if !shared.config.lazy_eviction && !policy.is_none() {
            let stop = sweeper::spawn(&shared, shared.config.sweep_interval);
            *shared.stop_sweeper.lock() = Some(stop);
        }

        tracing::debug!(
            max_up = shared.config.max_up,
            lazy_eviction = shared.config.lazy_eviction,
            ?policy,
            "pool created"
        );
        Ok(Self { shared })
    }

    /// Get the next consumer, creating one if there is room.
    ///
    /// Waits while every consumer is busy and the pool is at capacity. There
    /// is no built-in timeout; wrap the call in [`tokio::time::timeout`] if
    /// one is needed. A pool with `max_up == 0` never completes this call.
    pub async fn acquire(&self) -> PoolResult<Arc<F::Consumer>> {
        let shared = &self.shared;
        loop {
            let step = {
                let mut state = shared.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }

                if state.has_room(shared.config.max_up) {
                    state.pending += 1;
                    Step::Grow
                } else if state.live.is_empty() {
                    Step::Wait(Signal::Created, shared.signals.subscribe(Signal::Created))
                } else {
                    match state.next_idle() {
                        None => {
                            Step::Wait(Signal::Released, shared.signals.subscribe(Signal::Released))
                        }
                        Some(idx) => {
                            let verdict = if shared.config.lazy_eviction {
                                shared.policy.verdict(&state.live[idx], Instant::now())
                            } else {
                                None
                            };
                            match verdict {
                                Some(reason) => Step::Evict(state.remove(idx), reason),
                                None => {
                                    let (id, handle) = state.grant(idx);
                                    Step::Granted(id, handle)
                                }
                            }
                        }
                    }
                }
            };

            match step {
                Step::Granted(id, handle) => {
                    MetricsTracker::incr(&shared.metrics.total_grants);
                    tracing::trace!(consumer_id = id, "consumer granted");
                    return Ok(handle);
                }
                Step::Grow => return self.grow().await,
                Step::Wait(signal, subscription) => {
                    MetricsTracker::incr(&shared.metrics.wait_events);
                    tracing::trace!(?signal, "waiting for pool capacity");
                    subscription.await;
                }
                Step::Evict(record, reason) => {
                    MetricsTracker::incr(&shared.metrics.lazy_evictions);
                    tracing::debug!(consumer_id = record.id, ?reason, "evicting stale consumer");
                    let destroy = Shared::destroy(Arc::clone(shared), record, reason.into());
                    match tokio::spawn(destroy).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => return Err(PoolError::Destroy(err)),
                        Err(join) => return Err(PoolError::Destroy(Box::new(join))),
                    }
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but the consumer is released when the
    /// returned guard is dropped.
    pub async fn acquire_pooled(&self) -> PoolResult<PooledConsumer<F>> {
        let handle = self.acquire().await?;
        Ok(PooledConsumer {
            handle,
            pool: self.clone(),
            released: false,
        })
    }

    /// Create a consumer for a slot already reserved by the caller.
    async fn grow(&self) -> PoolResult<Arc<F::Consumer>> {
        let reservation = Reservation::new(Arc::clone(&self.shared));
        let (tx, rx) = oneshot::channel();

        // Runs to completion even if the caller stops waiting
        tokio::spawn(async move {
            let shared = Arc::clone(&reservation.shared);
            let outcome = shared.factory.create().await;
            let result = match reservation.commit(outcome) {
                Commit::Granted(handle) => Ok(handle),
                Commit::Failed(err) => Err(PoolError::Create(err)),
                Commit::Closed(record) => {
                    tracing::debug!(consumer_id = record.id, "pool closed during creation");
                    let _ = Shared::destroy(Arc::clone(&shared), record, DestroyReason::Shutdown).await;
                    Err(PoolError::Closed)
                }
            };

            if let Err(Ok(handle)) = tx.send(result) {
                // Nobody is waiting for this consumer any more; make it available
                if let Ok(id) = shared.release(&handle) {
                    tracing::debug!(consumer_id = id, "created consumer had no taker");
                }
            }
        });

        let mut creation = Creation {
            rx,
            shared: Arc::clone(&self.shared),
        };
        match (&mut creation.rx).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Create(
                "consumer creation task did not complete".into(),
            )),
        }
    }

    /// Return a granted consumer to the pool.
    ///
    /// Errors mean the caller misused the pool: the handle was never granted
    /// by this pool, was already released, or the pool was shut down.
    pub fn release(&self, handle: &Arc<F::Consumer>) -> Result<(), ReleaseError> {
        match self.shared.release(handle) {
            Ok(id) => {
                tracing::trace!(consumer_id = id, "consumer released");
                Ok(())
            }
            Err(ReleaseError::Closed) => {
                tracing::debug!("release after shutdown");
                Err(ReleaseError::Closed)
            }
            Err(err) => {
                tracing::error!(error = %err, "invalid consumer release");
                Err(err)
            }
        }
    }

    /// Destroy every consumer and stop the background sweep.
    ///
    /// Consumers are destroyed concurrently whether or not they are granted.
    /// Every destruction is attempted; failures are reported together once
    /// all of them have finished. The pool cannot be used afterwards and a
    /// second call does nothing.
    pub async fn shutdown(&self) -> PoolResult<()> {
        let shared = &self.shared;
        let records = {
            let mut state = shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.drain()
        };

        if let Some(stop) = shared.stop_sweeper.lock().take() {
            let _ = stop.send(());
        }
        // Blocked acquisitions observe the closed pool on wake
        shared.signals.fire_all();

        let attempted = records.len();
        tracing::info!(consumers = attempted, "shutting down pool");

        let mut destroys = JoinSet::new();
        for record in records {
            destroys.spawn(Shared::destroy(Arc::clone(shared), record, DestroyReason::Shutdown));
        }

        let mut errors: Vec<BoxError> = Vec::new();
        while let Some(joined) = destroys.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(join) => errors.push(Box::new(join)),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::error!(failed = errors.len(), attempted, "pool shutdown incomplete");
            Err(PoolError::Shutdown {
                failed: errors.len(),
                attempted,
                errors,
            })
        }
    }

    /// Subscribe to consumer lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.shared.events.subscribe()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let (live, busy, pending) = {
            let state = self.shared.state.lock();
            (state.live.len(), state.busy_count(), state.pending)
        };
        self.shared
            .metrics
            .get_metrics(live, busy, pending, self.shared.config.max_up)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.get_metrics(), self.is_closed())
    }

    /// Live consumers, busy or idle
    pub fn live_count(&self) -> usize {
        self.shared.state.lock().live.len()
    }

    /// Granted consumers
    pub fn busy_count(&self) -> usize {
        self.shared.state.lock().busy_count()
    }

    /// Creations in flight
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }
}

/// A granted consumer that is released back to the pool when dropped
pub struct PooledConsumer<F: ConsumerFactory> {
    handle: Arc<F::Consumer>,
    pool: RoundRobinPool<F>,
    released: bool,
}

impl<F: ConsumerFactory> PooledConsumer<F> {
    /// The underlying handle
    pub fn handle(&self) -> &Arc<F::Consumer> {
        &self.handle
    }

    /// Release now and observe misuse errors instead of logging them
    pub fn release(mut self) -> Result<(), ReleaseError> {
        self.released = true;
        self.pool.release(&self.handle)
    }
}

impl<F: ConsumerFactory> Deref for PooledConsumer<F> {
    type Target = F::Consumer;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<F: ConsumerFactory> Drop for PooledConsumer<F> {
    fn drop(&mut self) {
        if !self.released {
            // Misuse is already logged by `release`
            let _ = self.pool.release(&self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FnFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_factory(
        created: &Arc<AtomicUsize>,
        destroyed: &Arc<AtomicUsize>,
    ) -> FnFactory<usize> {
        let created = Arc::clone(created);
        let destroyed = Arc::clone(destroyed);
        FnFactory::new(move || {
            let id = created.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, BoxError>(id) }
        })
        .with_destroy(move |_| {
            let destroyed = Arc::clone(&destroyed);
            async move {
                destroyed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[test]
    fn test_cursor_revalidation() {
        let mut state = PoolState::new();
        let now = Instant::now();
        for id in 0..3 {
            let mut record = ConsumerRecord::granted(id, Arc::new(id), now, None);
            record.release();
            state.live.push(record);
        }

        state.cursor = 2;
        state.remove(2);
        assert_eq!(state.cursor, 0);

        state.cursor = 1;
        state.remove(0);
        assert_eq!(state.cursor, 0);
        assert_eq!(state.live[state.cursor].id, 1);
    }

    #[test]
    fn test_next_idle_wraps_and_skips_busy() {
        let mut state = PoolState::new();
        let now = Instant::now();
        for id in 0..3 {
            state.live.push(ConsumerRecord::granted(id, Arc::new(id), now, None));
        }
        assert_eq!(state.next_idle(), None);

        state.live[0].release();
        state.cursor = 1;
        assert_eq!(state.next_idle(), Some(0));

        let (id, _) = state.grant(0);
        assert_eq!(id, 0);
        assert_eq!(state.cursor, 1);
    }

    #[tokio::test]
    async fn test_acquire_creates_up_to_max_up() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let pool = RoundRobinPool::new(
            counting_factory(&created, &destroyed),
            PoolConfiguration::new().with_max_up(2),
        )
        .unwrap();

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_ne!(*first, *second);
        assert_eq!(pool.live_count(), 2);
        assert_eq!(pool.busy_count(), 2);

        pool.release(&first).unwrap();
        let third = pool.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_creation_task_lost() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async {
                if true {
                    panic!("factory crashed");
                }
                Ok::<_, BoxError>(1u8)
            }),
            PoolConfiguration::new().with_max_up(1),
        )
        .unwrap();

        match pool.acquire().await {
            Err(PoolError::Create(err)) => {
                assert_eq!(err.to_string(), "consumer creation task did not complete")
            }
            other => panic!("unexpected acquire result: {other:?}"),
        }
        assert_eq!(pool.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_release_misuse() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async { Ok::<_, BoxError>(1u8) }),
            PoolConfiguration::default(),
        )
        .unwrap();

        assert_eq!(pool.release(&Arc::new(1u8)), Err(ReleaseError::UnknownConsumer));

        let consumer = pool.acquire().await.unwrap();
        pool.release(&consumer).unwrap();
        assert_eq!(pool.release(&consumer), Err(ReleaseError::NotGranted(0)));
    }

    #[tokio::test]
    async fn test_creation_failure_frees_reservation() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let pool = RoundRobinPool::new(
            FnFactory::new(move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err::<usize, BoxError>("spawn failed".into())
                    } else {
                        Ok(attempt)
                    }
                }
            }),
            PoolConfiguration::new().with_max_up(1),
        )
        .unwrap();

        assert!(matches!(pool.acquire().await, Err(PoolError::Create(_))));
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.live_count(), 0);

        let consumer = pool.acquire().await.unwrap();
        assert_eq!(*consumer, 1);
        assert_eq!(pool.get_metrics().creation_failures, 1);
    }

    #[tokio::test]
    async fn test_lazy_destroy_failure_is_surfaced_once() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async { Ok::<_, BoxError>(()) })
                .with_destroy(|_| async { Err::<(), BoxError>("stuck".into()) }),
            PoolConfiguration::new().with_max_up(1).with_max_usage(1),
        )
        .unwrap();

        let consumer = pool.acquire().await.unwrap();
        pool.release(&consumer).unwrap();

        assert!(matches!(pool.acquire().await, Err(PoolError::Destroy(_))));
        assert_eq!(pool.live_count(), 0);

        // Caller retries explicitly
        let replacement = pool.acquire().await.unwrap();
        assert!(!Arc::ptr_eq(&consumer, &replacement));
    }

    #[tokio::test]
    async fn test_pooled_consumer_releases_on_drop() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async { Ok::<_, BoxError>(7) }),
            PoolConfiguration::new().with_max_up(1),
        )
        .unwrap();

        {
            let consumer = pool.acquire_pooled().await.unwrap();
            assert_eq!(*consumer, 7);
            assert_eq!(pool.busy_count(), 1);
        }
        assert_eq!(pool.busy_count(), 0);

        let consumer = pool.acquire_pooled().await.unwrap();
        consumer.release().unwrap();
        assert_eq!(pool.busy_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_creation_becomes_idle() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, BoxError>(())
            }),
            PoolConfiguration::new().with_max_up(1),
        )
        .unwrap();

        let attempt = tokio::time::timeout(Duration::from_millis(10), pool.acquire()).await;
        assert!(attempt.is_err());
        assert_eq!(pool.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.live_count(), 1);
        assert_eq!(pool.busy_count(), 0);

        pool.acquire().await.unwrap();
        assert_eq!(pool.get_metrics().consumers_created, 1);
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async { Ok::<_, BoxError>(()) }),
            PoolConfiguration::new().with_max_up(1),
        )
        .unwrap();

        let _held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::task::yield_now().await;

        pool.shutdown().await.unwrap();
        assert!(matches!(waiter.await.unwrap(), Err(PoolError::Closed)));
        assert!(pool.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_events() {
        let pool = RoundRobinPool::new(
            FnFactory::new(|| async { Ok::<_, BoxError>(()) }),
            PoolConfiguration::default(),
        )
        .unwrap();
        let mut events = pool.subscribe();

        let consumer = pool.acquire().await.unwrap();
        pool.release(&consumer).unwrap();
        pool.shutdown().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), PoolEvent::Created { id: 0 });
        assert_eq!(
            events.recv().await.unwrap(),
            PoolEvent::Destroyed {
                id: 0,
                reason: DestroyReason::Shutdown,
                success: true
            }
        );
    }
}
