//! Lifecycle events published for instrumentation

use crate::eviction::EvictionReason;

/// Why a consumer was handed to the destruction function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DestroyReason {
    /// Reached its maximum age
    Expired,
    /// Reached its usage quota
    UsageExhausted,
    /// The pool was shut down
    Shutdown,
}

impl From<EvictionReason> for DestroyReason {
    fn from(reason: EvictionReason) -> Self {
        match reason {
            EvictionReason::Expired => DestroyReason::Expired,
            EvictionReason::UsageExhausted => DestroyReason::UsageExhausted,
        }
    }
}

/// Consumer lifecycle event
///
/// Events are not needed for correct use of the pool. Subscribe with
/// [`RoundRobinPool::subscribe`](crate::RoundRobinPool::subscribe); slow
/// subscribers lose the oldest events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoolEvent {
    /// A consumer was created and added to the pool
    Created { id: u64 },

    /// A consumer was removed from the pool and its destruction has completed
    Destroyed {
        id: u64,
        reason: DestroyReason,
        success: bool,
    },
}
