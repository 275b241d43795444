//! Population floor and the two reaper sweeps.
//!
//! Idle time is refreshed by every release; absolute expiry is fixed at
//! creation and survives any amount of reuse.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use lendpool::{Pool, PoolConfig, ResourceFactory};

// ---------------------------------------------------------------------------
// Test factory
// ---------------------------------------------------------------------------

struct CountingFactory {
    counter: AtomicU32,
}

impl CountingFactory {
    fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ResourceFactory for CountingFactory {
    type Resource = u32;

    async fn create(&self) -> Result<u32, lendpool::BoxError> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

// ---------------------------------------------------------------------------
// min floor
// ---------------------------------------------------------------------------

/// With a floor configured and no acquires at all, the maintainer pre-warms
/// the pool to exactly `min` resources.
#[tokio::test(start_paused = true)]
async fn pool_warms_up_to_min() {
    let config = PoolConfig {
        min: 20,
        max: 1000,
        maintenance_latency: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = Pool::new(CountingFactory::new(), config).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = pool.stats();
    assert_eq!(stats.free, 20);
    assert_eq!(stats.total_created, 20);

    // Lending from the floor does not trigger extra creations.
    let value = pool.acquire().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.stats().total_created, 20);
    pool.release(&value);
}

// ---------------------------------------------------------------------------
// Idle sweep
// ---------------------------------------------------------------------------

/// Reuse refreshes the idle clock; a resource that keeps getting released
/// within the idle timeout survives, and one left alone is reaped and
/// replaced.
#[tokio::test(start_paused = true)]
async fn idle_clock_is_refreshed_by_release() {
    let config = PoolConfig {
        min: 1,
        idle_timeout: Some(Duration::from_millis(500)),
        idle_check_interval: Duration::from_millis(100),
        maintenance_latency: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = Pool::new(CountingFactory::new(), config).unwrap();

    let value = pool.acquire().await.unwrap();
    assert_eq!(value, 1);
    pool.release(&value);

    // Two reuse cycles, each inside the idle timeout: same resource, and
    // the combined wall time exceeds the timeout, proving the refresh.
    for _ in 0..2 {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let again = pool.acquire().await.unwrap();
        assert_eq!(again, 1, "released within idle_timeout, so it survives");
        pool.release(&again);
    }

    // Now leave it idle past the timeout: the sweep retires it and the
    // floor commissions a replacement.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let fresh = pool.acquire().await.unwrap();
    assert_eq!(fresh, 2, "idle resource was reaped; a new one serves");
    assert_eq!(pool.stats().total_destroyed, 1);
}

/// Lent resources have no idle clock; holding one arbitrarily long is safe.
#[tokio::test(start_paused = true)]
async fn idle_sweep_ignores_lent_resources() {
    let config = PoolConfig {
        idle_timeout: Some(Duration::from_millis(200)),
        idle_check_interval: Duration::from_millis(100),
        maintenance_latency: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = Pool::new(CountingFactory::new(), config).unwrap();

    let held = pool.acquire().await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert_eq!(pool.stats().total_destroyed, 0);
    pool.release(&held);

    let again = pool.acquire().await.unwrap();
    assert_eq!(again, held);
}

// ---------------------------------------------------------------------------
// Expiry sweep
// ---------------------------------------------------------------------------

/// Absolute expiry counts from the original creation; reuse does not extend
/// it.
#[tokio::test(start_paused = true)]
async fn expiry_is_not_refreshed_by_reuse() {
    let config = PoolConfig {
        min: 1,
        expire_timeout: Some(Duration::from_millis(500)),
        expire_check_interval: Duration::from_millis(100),
        maintenance_latency: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = Pool::new(CountingFactory::new(), config).unwrap();

    // Busy reuse inside the lifetime: always the same resource.
    let value = pool.acquire().await.unwrap();
    assert_eq!(value, 1);
    pool.release(&value);
    for _ in 0..2 {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let again = pool.acquire().await.unwrap();
        assert_eq!(again, 1, "still inside its absolute lifetime");
        pool.release(&again);
    }

    // Past the lifetime the sweep retires it despite the recent releases.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let fresh = pool.acquire().await.unwrap();
    assert_eq!(fresh, 2, "expired resource was replaced");
    assert_eq!(pool.stats().total_created, 2);
}

/// No expire timeout configured means resources live indefinitely.
#[tokio::test(start_paused = true)]
async fn without_expire_timeout_resources_live_on() {
    let config = PoolConfig {
        min: 1,
        expire_check_interval: Duration::from_millis(100),
        maintenance_latency: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = Pool::new(CountingFactory::new(), config).unwrap();

    let value = pool.acquire().await.unwrap();
    pool.release(&value);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let again = pool.acquire().await.unwrap();
    assert_eq!(again, value);
    assert_eq!(pool.stats().total_destroyed, 0);
}
