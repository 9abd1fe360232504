// Round-robin consumer pool demo
// Run with: RUST_LOG=roundrobin_pool=debug cargo run

use roundrobin_pool::{telemetry, BoxError, FnFactory, PoolConfiguration, RoundRobinPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    println!("=== Round-robin consumer pool ===");

    let spawned = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&spawned);
    let factory = FnFactory::new(move || {
        let worker = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            // Pretend starting a worker is expensive
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, BoxError>(format!("worker-{worker}"))
        }
    })
    .with_destroy(|worker| async move {
        println!("  Stopping {worker}");
        Ok(())
    });

    let pool = RoundRobinPool::new(
        factory,
        PoolConfiguration::new().with_max_up(3).with_max_usage(4),
    )?;

    for task in 0..10 {
        let worker = pool.acquire_pooled().await?;
        println!("  Task {task} ran on {}", *worker);
    }

    println!("  Workers started: {}", spawned.load(Ordering::SeqCst));
    println!("  Live after run: {}", pool.live_count());

    pool.shutdown().await?;
    println!("  Destroyed: {}", pool.get_metrics().consumers_destroyed);
    Ok(())
}
