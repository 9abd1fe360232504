//! # Round-robin consumer pool
//!
//! A small, capped set of expensive-to-create consumers (worker processes,
//! connections, sandboxes) handed out in round-robin order and recycled once
//! they become stale by age or by usage count.
//!
//! ## Features
//!
//! - Capacity-bounded asynchronous creation: live plus in-flight creations
//!   never exceed `max_up`
//! - Round-robin selection that skips busy consumers
//! - Recycling by maximum age and/or usage quota
//! - Lazy (on access) or eager (background sweep) eviction
//! - Waiters are woken when a consumer is created or released
//! - Concurrent, exactly-once destruction on shutdown
//! - Lifecycle events, metrics, Prometheus export and health status
//!
//! ## Quick Start
//!
//! ```rust
//! use roundrobin_pool::{BoxError, FnFactory, PoolConfiguration, RoundRobinPool};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = RoundRobinPool::new(
//!     FnFactory::new(|| async { Ok::<_, BoxError>(42) }),
//!     PoolConfiguration::new().with_max_up(3).with_max_usage(100),
//! )?;
//!
//! {
//!     let consumer = pool.acquire_pooled().await?;
//!     println!("Got: {}", *consumer);
//!     // Released when `consumer` goes out of scope
//! }
//!
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod errors;
mod events;
mod eviction;
mod factory;
mod health;
mod metrics;
mod notify;
mod pool;
mod record;
mod sweeper;
pub mod telemetry;

pub use config::PoolConfiguration;
pub use errors::{BoxError, PoolError, PoolResult, ReleaseError};
pub use events::{DestroyReason, PoolEvent};
pub use eviction::{EvictionPolicy, EvictionReason};
pub use factory::{ConsumerFactory, FnFactory};
pub use health::HealthStatus;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{PooledConsumer, RoundRobinPool};
