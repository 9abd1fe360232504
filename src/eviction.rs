//! Eviction policies for recycling stale consumers

use std::time::Duration;

use tokio::time::Instant;

use crate::record::ConsumerRecord;

/// Eviction policy for pool consumers
///
/// # Examples
///
/// ```
/// use roundrobin_pool::{EvictionPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_age(Duration::from_secs(60))
///     .with_max_usage(1000);
///
/// assert!(matches!(config.eviction_policy(), EvictionPolicy::Combined { .. }));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Consumers live until shutdown
    #[default]
    None,

    /// Consumers expire a fixed duration after creation
    MaxAge(Duration),

    /// Consumers are recycled after a number of grants
    MaxUsage(usize),

    /// Whichever limit is reached first
    Combined { max_age: Duration, max_usage: usize },
}

/// Why a consumer was condemned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvictionReason {
    /// Older than the configured maximum age
    Expired,

    /// Granted as many times as the usage quota allows
    UsageExhausted,
}

impl EvictionPolicy {
    pub fn from_limits(max_age: Option<Duration>, max_usage: Option<usize>) -> Self {
        match (max_age, max_usage) {
            (Some(max_age), Some(max_usage)) => EvictionPolicy::Combined { max_age, max_usage },
            (Some(max_age), None) => EvictionPolicy::MaxAge(max_age),
            (None, Some(max_usage)) => EvictionPolicy::MaxUsage(max_usage),
            (None, None) => EvictionPolicy::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, EvictionPolicy::None)
    }

    fn max_age(&self) -> Option<Duration> {
        match self {
            EvictionPolicy::MaxAge(max_age) | EvictionPolicy::Combined { max_age, .. } => {
                Some(*max_age)
            }
            _ => None,
        }
    }

    fn max_usage(&self) -> Option<usize> {
        match self {
            EvictionPolicy::MaxUsage(max_usage) | EvictionPolicy::Combined { max_usage, .. } => {
                Some(*max_usage)
            }
            _ => None,
        }
    }

    /// Expiry instant for a consumer created at `created_at`.
    ///
    /// `None` means the consumer never expires, which also covers ages too
    /// large to represent.
    pub(crate) fn expiry_for(&self, created_at: Instant) -> Option<Instant> {
        self.max_age()
            .and_then(|max_age| created_at.checked_add(max_age))
    }

    /// Decide whether `record` must be destroyed at `now`.
    ///
    /// Busy records are never condemned.
    pub(crate) fn verdict<C>(&self, record: &ConsumerRecord<C>, now: Instant) -> Option<EvictionReason> {
        if record.busy {
            return None;
        }
        if let Some(expires_at) = record.expires_at
            && now >= expires_at
        {
            return Some(EvictionReason::Expired);
        }
        if let Some(max_usage) = self.max_usage()
            && record.usage_count >= max_usage
        {
            return Some(EvictionReason::UsageExhausted);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(policy: &EvictionPolicy, created_at: Instant) -> ConsumerRecord<()> {
        let mut record =
            ConsumerRecord::granted(1, Arc::new(()), created_at, policy.expiry_for(created_at));
        record.release();
        record
    }

    #[test]
    fn test_from_limits() {
        let age = Duration::from_secs(1);
        assert_eq!(EvictionPolicy::from_limits(None, None), EvictionPolicy::None);
        assert_eq!(EvictionPolicy::from_limits(Some(age), None), EvictionPolicy::MaxAge(age));
        assert_eq!(EvictionPolicy::from_limits(None, Some(3)), EvictionPolicy::MaxUsage(3));
        assert_eq!(
            EvictionPolicy::from_limits(Some(age), Some(3)),
            EvictionPolicy::Combined { max_age: age, max_usage: 3 }
        );
    }

    #[test]
    fn test_expiry() {
        let policy = EvictionPolicy::MaxAge(Duration::from_millis(500));
        let created = Instant::now();
        let record = record(&policy, created);

        assert_eq!(policy.verdict(&record, created + Duration::from_millis(499)), None);
        assert_eq!(
            policy.verdict(&record, created + Duration::from_millis(500)),
            Some(EvictionReason::Expired)
        );
    }

    #[test]
    fn test_usage_quota() {
        let policy = EvictionPolicy::MaxUsage(2);
        let now = Instant::now();
        let mut record = record(&policy, now);
        assert_eq!(policy.verdict(&record, now), None);

        record.grant();
        record.release();
        assert_eq!(policy.verdict(&record, now), Some(EvictionReason::UsageExhausted));
    }

    #[test]
    fn test_busy_is_never_condemned() {
        let policy = EvictionPolicy::Combined { max_age: Duration::ZERO, max_usage: 1 };
        let now = Instant::now();
        let mut record = record(&policy, now);
        assert!(policy.verdict(&record, now).is_some());

        record.grant();
        assert_eq!(policy.verdict(&record, now + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_none_never_expires() {
        let policy = EvictionPolicy::None;
        let now = Instant::now();
        let record = record(&policy, now);
        assert_eq!(record.expires_at, None);
        assert_eq!(policy.verdict(&record, now + Duration::from_secs(3600)), None);
    }
}
