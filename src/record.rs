//! Bookkeeping for a single live consumer

use std::sync::Arc;

use tokio::time::Instant;

/// One live consumer together with its lifecycle metadata
#[derive(Debug)]
pub(crate) struct ConsumerRecord<C> {
    pub id: u64,
    pub handle: Arc<C>,
    pub created_at: Instant,
    pub expires_at: Option<Instant>,
    pub usage_count: usize,
    pub busy: bool,
}

impl<C> ConsumerRecord<C> {
    /// Record for a consumer that has just been created and is handed
    /// straight to the caller that asked for it.
    pub fn granted(id: u64, handle: Arc<C>, created_at: Instant, expires_at: Option<Instant>) -> Self {
        Self {
            id,
            handle,
            created_at,
            expires_at,
            usage_count: 1,
            busy: true,
        }
    }

    pub fn owns(&self, handle: &Arc<C>) -> bool {
        Arc::ptr_eq(&self.handle, handle)
    }

    pub fn grant(&mut self) -> Arc<C> {
        self.usage_count += 1;
        self.busy = true;
        Arc::clone(&self.handle)
    }

    pub fn release(&mut self) {
        self.busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_and_release() {
        let mut record = ConsumerRecord::granted(7, Arc::new("worker"), Instant::now(), None);
        assert!(record.busy);
        assert_eq!(record.usage_count, 1);

        record.release();
        assert!(!record.busy);

        let handle = record.grant();
        assert!(record.owns(&handle));
        assert_eq!(record.usage_count, 2);
        assert!(record.busy);
    }

    #[test]
    fn test_identity_is_by_handle() {
        let record = ConsumerRecord::granted(1, Arc::new(5), Instant::now(), None);
        assert!(!record.owns(&Arc::new(5)));
        assert!(record.owns(&Arc::clone(&record.handle)));
    }
}
