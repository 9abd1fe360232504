//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};
use crate::eviction::EvictionPolicy;

/// Configuration for round-robin pool behavior
///
/// # Examples
///
/// ```
/// use roundrobin_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_up(4)
///     .with_max_usage(100)
///     .with_max_age(Duration::from_secs(3600));
///
/// assert_eq!(config.max_up, 4);
/// assert_eq!(config.max_usage, Some(100));
/// assert!(config.lazy_eviction);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Maximum number of consumers that can be live or being created at once
    pub max_up: usize,

    /// Number of grants after which a consumer is recycled
    pub max_usage: Option<usize>,

    /// Lifetime after which a consumer is recycled
    pub max_age: Option<Duration>,

    /// Check staleness when a consumer is picked instead of sweeping in the background
    pub lazy_eviction: bool,

    /// Period of the background sweep when lazy eviction is off
    pub sweep_interval: Duration,

    /// Number of lifecycle events buffered for each subscriber
    pub event_capacity: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_up: 2,
            max_usage: None,
            max_age: None,
            lazy_eviction: true,
            sweep_interval: Duration::from_secs(1),
            event_capacity: 64,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live plus pending consumers
    ///
    /// A value of zero is accepted, but every `acquire` will then wait forever.
    pub fn with_max_up(mut self, max_up: usize) -> Self {
        self.max_up = max_up;
        self
    }

    /// Set the usage quota
    pub fn with_max_usage(mut self, max_usage: usize) -> Self {
        self.max_usage = Some(max_usage);
        self
    }

    /// Set the maximum consumer age
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Choose between lazy (on access) and eager (background sweep) eviction
    pub fn with_lazy_eviction(mut self, lazy: bool) -> Self {
        self.lazy_eviction = lazy;
        self
    }

    /// Switch to eager eviction with the given sweep period
    ///
    /// # Examples
    ///
    /// ```
    /// use roundrobin_pool::PoolConfiguration;
    /// use std::time::Duration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_eager_eviction(Duration::from_millis(250));
    ///
    /// assert!(!config.lazy_eviction);
    /// assert_eq!(config.sweep_interval, Duration::from_millis(250));
    /// ```
    pub fn with_eager_eviction(mut self, interval: Duration) -> Self {
        self.lazy_eviction = false;
        self.sweep_interval = interval;
        self
    }

    /// Set the sweep period
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the per-subscriber event buffer
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Eviction policy derived from the configured limits
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy::from_limits(self.max_age, self.max_usage)
    }

    /// Validate configuration values
    pub fn validate(&self) -> PoolResult<()> {
        if !self.lazy_eviction && self.sweep_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "sweep_interval must be greater than 0 when lazy eviction is disabled".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "event_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_up, 2);
        assert_eq!(config.max_usage, None);
        assert_eq!(config.max_age, None);
        assert!(config.lazy_eviction);
        assert!(config.validate().is_ok());
        assert!(config.eviction_policy().is_none());
    }

    #[test]
    fn test_zero_sweep_interval_rejected_for_eager() {
        let config = PoolConfiguration::new().with_eager_eviction(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));

        // Irrelevant while eviction is lazy
        let config = PoolConfiguration::new().with_sweep_interval(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        let config = PoolConfiguration::new().with_event_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_up_is_accepted() {
        let config = PoolConfiguration::new().with_max_up(0);
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json() {
        let config: PoolConfiguration =
            serde_json::from_str(r#"{"max_up": 5, "max_usage": 10, "lazy_eviction": false}"#)
                .unwrap();
        assert_eq!(config.max_up, 5);
        assert_eq!(config.max_usage, Some(10));
        assert!(!config.lazy_eviction);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
    }
}
