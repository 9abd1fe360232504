//! Creation and destruction of pooled consumers

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::BoxError;

/// Creates and disposes of the consumers a pool hands out.
///
/// `create` must eventually complete: a creation that never finishes keeps
/// its capacity reservation forever. `destroy` is called at most once for
/// every consumer `create` produced, and never for a failed creation.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use roundrobin_pool::{BoxError, ConsumerFactory};
/// use std::sync::Arc;
///
/// struct Sandboxes;
///
/// #[async_trait]
/// impl ConsumerFactory for Sandboxes {
///     type Consumer = String;
///
///     async fn create(&self) -> Result<String, BoxError> {
///         Ok("sandbox".to_string())
///     }
///
///     async fn destroy(&self, sandbox: Arc<String>) -> Result<(), BoxError> {
///         println!("tearing down {sandbox}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ConsumerFactory: Send + Sync + 'static {
    /// The pooled resource
    type Consumer: Send + Sync + 'static;

    /// Create a new consumer
    async fn create(&self) -> Result<Self::Consumer, BoxError>;

    /// Dispose of a consumer. Defaults to doing nothing.
    async fn destroy(&self, _consumer: Arc<Self::Consumer>) -> Result<(), BoxError> {
        Ok(())
    }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
type CreateFn<C> = Box<dyn Fn() -> BoxFuture<Result<C, BoxError>> + Send + Sync>;
type DestroyFn<C> = Box<dyn Fn(Arc<C>) -> BoxFuture<Result<(), BoxError>> + Send + Sync>;

/// Factory assembled from async closures
///
/// # Examples
///
/// ```
/// use roundrobin_pool::{BoxError, FnFactory};
///
/// let factory = FnFactory::new(|| async { Ok::<_, BoxError>(vec![0u8; 16]) })
///     .with_destroy(|buffer| async move {
///         drop(buffer);
///         Ok(())
///     });
/// ```
pub struct FnFactory<C> {
    create: CreateFn<C>,
    destroy: Option<DestroyFn<C>>,
}

impl<C: Send + Sync + 'static> FnFactory<C> {
    /// Factory with the given creation function and a no-op destruction function
    pub fn new<F, Fut>(create: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, BoxError>> + Send + 'static,
    {
        Self {
            create: Box::new(move || Box::pin(create())),
            destroy: None,
        }
    }

    /// Set the destruction function
    pub fn with_destroy<F, Fut>(mut self, destroy: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.destroy = Some(Box::new(move |consumer| Box::pin(destroy(consumer))));
        self
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ConsumerFactory for FnFactory<C> {
    type Consumer = C;

    async fn create(&self) -> Result<C, BoxError> {
        (self.create)().await
    }

    async fn destroy(&self, consumer: Arc<C>) -> Result<(), BoxError> {
        match &self.destroy {
            Some(destroy) => destroy(consumer).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fn_factory_defaults_to_noop_destroy() {
        let factory = FnFactory::new(|| async { Ok::<_, BoxError>(42) });
        let consumer = factory.create().await.unwrap();
        assert_eq!(consumer, 42);
        assert!(factory.destroy(Arc::new(consumer)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fn_factory_destroy() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&destroyed);
        let factory = FnFactory::new(|| async { Ok::<_, BoxError>("conn") }).with_destroy(
            move |_conn| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        let conn = Arc::new(factory.create().await.unwrap());
        factory.destroy(conn).await.unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fn_factory_create_error() {
        let factory = FnFactory::<u32>::new(|| async { Err::<u32, BoxError>("no capacity".into()) });
        let err = factory.create().await.unwrap_err();
        assert_eq!(err.to_string(), "no capacity");
    }
}
