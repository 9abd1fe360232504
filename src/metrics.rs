//! Metrics collection and export for consumer pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use roundrobin_pool::{BoxError, FnFactory, PoolConfiguration, RoundRobinPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = RoundRobinPool::new(
///     FnFactory::new(|| async { Ok::<_, BoxError>(1u32) }),
///     PoolConfiguration::default(),
/// )
/// .unwrap();
///
/// let consumer = pool.acquire().await.unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.consumers_created, 1);
/// assert_eq!(metrics.busy_consumers, 1);
/// pool.release(&consumer).unwrap();
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Consumers successfully created
    pub consumers_created: usize,

    /// Consumers handed to the destruction function
    pub consumers_destroyed: usize,

    /// Failed creation attempts
    pub creation_failures: usize,

    /// Failed destruction attempts
    pub destruction_failures: usize,

    /// Total grants, including grants of freshly created consumers
    pub total_grants: usize,

    /// Total releases
    pub total_releases: usize,

    /// Consumers evicted on access
    pub lazy_evictions: usize,

    /// Consumers evicted by the background sweep
    pub eager_evictions: usize,

    /// Times an acquisition had to wait for a signal
    pub wait_events: usize,

    /// Current live consumers
    pub live_consumers: usize,

    /// Current granted consumers
    pub busy_consumers: usize,

    /// Current creations in flight
    pub pending_creations: usize,

    /// Busy share of the capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Configured capacity
    pub max_up: usize,
}

impl PoolMetrics {
    /// Idle live consumers
    pub fn idle_consumers(&self) -> usize {
        self.live_consumers - self.busy_consumers
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("consumers_created".to_string(), self.consumers_created.to_string());
        metrics.insert("consumers_destroyed".to_string(), self.consumers_destroyed.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("destruction_failures".to_string(), self.destruction_failures.to_string());
        metrics.insert("total_grants".to_string(), self.total_grants.to_string());
        metrics.insert("total_releases".to_string(), self.total_releases.to_string());
        metrics.insert("lazy_evictions".to_string(), self.lazy_evictions.to_string());
        metrics.insert("eager_evictions".to_string(), self.eager_evictions.to_string());
        metrics.insert("wait_events".to_string(), self.wait_events.to_string());
        metrics.insert("live_consumers".to_string(), self.live_consumers.to_string());
        metrics.insert("busy_consumers".to_string(), self.busy_consumers.to_string());
        metrics.insert("idle_consumers".to_string(), self.idle_consumers().to_string());
        metrics.insert("pending_creations".to_string(), self.pending_creations.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_up".to_string(), self.max_up.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// Every series carries a `pool` label plus any extra `tags`.
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

        let mut labels = tags.cloned().unwrap_or_default();
        labels.insert("pool".to_string(), pool_name.to_string());
        let registry = Registry::new_custom(Some("rrpool".to_string()), Some(labels))
            .map_err(Self::error)?;

        let counters = [
            ("consumers_created_total", "Consumers created", metrics.consumers_created),
            ("consumers_destroyed_total", "Consumers destroyed", metrics.consumers_destroyed),
            ("creation_failures_total", "Failed consumer creations", metrics.creation_failures),
            ("destruction_failures_total", "Failed consumer destructions", metrics.destruction_failures),
            ("grants_total", "Consumers granted to callers", metrics.total_grants),
            ("releases_total", "Consumers released by callers", metrics.total_releases),
            ("lazy_evictions_total", "Consumers evicted on access", metrics.lazy_evictions),
            ("eager_evictions_total", "Consumers evicted by the sweep", metrics.eager_evictions),
            ("wait_events_total", "Acquisitions that had to wait", metrics.wait_events),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::new(name, help).map_err(Self::error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(Self::error)?;
        }

        let gauges = [
            ("consumers_live", "Current live consumers", metrics.live_consumers),
            ("consumers_busy", "Current granted consumers", metrics.busy_consumers),
            ("consumers_idle", "Current idle consumers", metrics.idle_consumers()),
            ("creations_pending", "Current creations in flight", metrics.pending_creations),
            ("max_up", "Configured capacity", metrics.max_up),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::new(name, help).map_err(Self::error)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(Self::error)?;
        }

        let utilization = Gauge::new("utilization", "Busy share of the capacity").map_err(Self::error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(Self::error)?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(Self::error)?;
        String::from_utf8(buffer).map_err(Self::error)
    }

    fn error(err: impl std::fmt::Display) -> PoolError {
        PoolError::Metrics(err.to_string())
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub consumers_created: AtomicUsize,
    pub consumers_destroyed: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub destruction_failures: AtomicUsize,
    pub total_grants: AtomicUsize,
    pub total_releases: AtomicUsize,
    pub lazy_evictions: AtomicUsize,
    pub eager_evictions: AtomicUsize,
    pub wait_events: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, live: usize, busy: usize, pending: usize, max_up: usize) -> PoolMetrics {
        let utilization = if max_up > 0 {
            busy as f64 / max_up as f64
        } else {
            0.0
        };

        PoolMetrics {
            consumers_created: self.consumers_created.load(Ordering::Relaxed),
            consumers_destroyed: self.consumers_destroyed.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            destruction_failures: self.destruction_failures.load(Ordering::Relaxed),
            total_grants: self.total_grants.load(Ordering::Relaxed),
            total_releases: self.total_releases.load(Ordering::Relaxed),
            lazy_evictions: self.lazy_evictions.load(Ordering::Relaxed),
            eager_evictions: self.eager_evictions.load(Ordering::Relaxed),
            wait_events: self.wait_events.load(Ordering::Relaxed),
            live_consumers: live,
            busy_consumers: busy,
            pending_creations: pending,
            utilization,
            max_up,
        }
    }
}
