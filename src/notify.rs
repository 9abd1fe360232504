//! Level-triggered wake-up signals for saturated acquisitions

use std::pin::Pin;

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Pool state changes an acquisition can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// A consumer was added to the live collection, or a creation
    /// reservation was given back
    Created,
    /// A granted consumer became idle
    Released,
}

/// A registered one-shot subscription
pub(crate) type Subscription<'a> = Pin<Box<Notified<'a>>>;

#[derive(Debug, Default)]
pub(crate) struct Signals {
    created: Notify,
    released: Notify,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify_for(&self, signal: Signal) -> &Notify {
        match signal {
            Signal::Created => &self.created,
            Signal::Released => &self.released,
        }
    }

    /// Register interest in the next occurrence of `signal`.
    ///
    /// Must be called while the pool state lock is held so that a
    /// notification fired after the caller inspected the state is not lost.
    pub fn subscribe(&self, signal: Signal) -> Subscription<'_> {
        let mut notified = Box::pin(self.notify_for(signal).notified());
        notified.as_mut().enable();
        notified
    }

    /// Wake every current subscriber of `signal`.
    pub fn fire(&self, signal: Signal) {
        self.notify_for(signal).notify_waiters();
    }

    pub fn fire_all(&self) {
        self.created.notify_waiters();
        self.released.notify_waiters();
    }
}
