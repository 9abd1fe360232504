//! Health monitoring for consumer pools

use crate::metrics::PoolMetrics;

/// Health status of a consumer pool
///
/// # Examples
///
/// ```
/// use roundrobin_pool::{BoxError, FnFactory, PoolConfiguration, RoundRobinPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = RoundRobinPool::new(
///     FnFactory::new(|| async { Ok::<_, BoxError>(()) }),
///     PoolConfiguration::default(),
/// )
/// .unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.live_consumers, 0);
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Busy share of the capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Live consumers
    pub live_consumers: usize,

    /// Granted consumers
    pub busy_consumers: usize,

    /// Creations in flight
    pub pending_creations: usize,

    /// Configured capacity
    pub max_up: usize,

    /// Whether the pool has been shut down
    pub closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive a health status from a metrics snapshot
    pub fn from_metrics(metrics: &PoolMetrics, closed: bool) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = !closed;

        if closed {
            warnings.push("Pool is shut down".to_string());
        }

        if metrics.max_up == 0 {
            warnings.push("Pool capacity is zero; acquisitions will never complete".to_string());
            is_healthy = false;
        } else if metrics.utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", metrics.utilization * 100.0));
            is_healthy = false;
        }

        if metrics.creation_failures > 0 {
            warnings.push(format!(
                "{} consumer creations have failed",
                metrics.creation_failures
            ));
        }

        if metrics.destruction_failures > 0 {
            warnings.push(format!(
                "{} consumer destructions have failed",
                metrics.destruction_failures
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            live_consumers: metrics.live_consumers,
            busy_consumers: metrics.busy_consumers,
            pending_creations: metrics.pending_creations,
            max_up: metrics.max_up,
            closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
