use crate::core::{JsonQlError, Result};
use log::{debug, warn};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Builds a fresh parser when the pool has no idle one and is below its size.
pub type ParserFactory<P> = Arc<dyn Fn() -> P + Send + Sync>;

/// Parser pool
///
/// Bounded set of reusable parsers. A parser is not safe for concurrent
/// use, so each checkout owns its instance exclusively until the guard is
/// dropped. Parsers are created lazily, never more than `max_parsers`.
/// Checkout waits at most `timeout` and then fails with
/// [`JsonQlError::ResourceExhausted`].
pub struct ParserPool<P> {
    /// Parsers not currently checked out
    idle: Arc<Mutex<VecDeque<P>>>,
    /// One permit per parser slot
    permits: Arc<Semaphore>,
    factory: ParserFactory<P>,
    /// Parsers created and not lost
    total_parsers: Arc<AtomicUsize>,
    max_parsers: usize,
    timeout: Duration,
}

impl<P: Send + 'static> ParserPool<P> {
    pub fn new(
        max_parsers: usize,
        timeout: Duration,
        factory: impl Fn() -> P + Send + Sync + 'static,
    ) -> Self {
        Self {
            idle: Arc::new(Mutex::new(VecDeque::with_capacity(max_parsers))),
            permits: Arc::new(Semaphore::new(max_parsers)),
            factory: Arc::new(factory),
            total_parsers: Arc::new(AtomicUsize::new(0)),
            max_parsers,
            timeout,
        }
    }

    /// Check out a parser, waiting up to the configured timeout
    pub async fn acquire(&self) -> Result<PoolGuard<P>> {
        let permit = match tokio::time::timeout(
            self.timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(JsonQlError::ResourceExhausted(self.timeout)),
            Err(_elapsed) => {
                warn!(
                    "Parser pool timeout: all {} parsers busy for {:?}",
                    self.max_parsers, self.timeout
                );
                return Err(JsonQlError::ResourceExhausted(self.timeout));
            }
        };

        let parser = self.idle.lock()?.pop_front();
        let parser = match parser {
            Some(parser) => parser,
            None => {
                let created = self.total_parsers.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Creating parser {}/{}", created, self.max_parsers);
                (self.factory)()
            }
        };

        Ok(PoolGuard {
            parser: Some(parser),
            idle: Arc::clone(&self.idle),
            total_parsers: Arc::clone(&self.total_parsers),
            _permit: permit,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().map(|idle| idle.len()).unwrap_or(0);
        let total = self.total_parsers.load(Ordering::SeqCst);

        PoolStats {
            total_parsers: total,
            idle_parsers: idle,
            active_parsers: self.max_parsers - self.permits.available_permits(),
            max_parsers: self.max_parsers,
        }
    }
}

/// Parser pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_parsers: usize,
    pub idle_parsers: usize,
    pub active_parsers: usize,
    pub max_parsers: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parser Pool: {}/{} active, {} idle, max {}",
            self.active_parsers, self.total_parsers, self.idle_parsers, self.max_parsers
        )
    }
}

/// RAII guard for a checked-out parser
///
/// Returns the parser to the idle set when dropped; the slot permit is
/// released afterwards, so a waiter always finds the parser idle.
pub struct PoolGuard<P> {
    parser: Option<P>,
    idle: Arc<Mutex<VecDeque<P>>>,
    total_parsers: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl<P> PoolGuard<P> {
    /// Return the parser to the pool now rather than at end of scope
    pub fn release(self) {}
}

impl<P> Deref for PoolGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.parser
            .as_ref()
            .expect("Parser already returned to pool")
    }
}

impl<P> DerefMut for PoolGuard<P> {
    fn deref_mut(&mut self) -> &mut P {
        self.parser
            .as_mut()
            .expect("Parser already returned to pool")
    }
}

impl<P> Drop for PoolGuard<P> {
    fn drop(&mut self) {
        if let Some(parser) = self.parser.take() {
            match self.idle.lock() {
                Ok(mut idle) => idle.push_back(parser),
                Err(_) => {
                    warn!("Parser pool lock poisoned, dropping parser");
                    self.total_parsers.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn counting_pool(size: usize, timeout: Duration) -> (ParserPool<usize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = ParserPool::new(size, timeout, move || counter.fetch_add(1, Ordering::SeqCst));
        (pool, created)
    }

    #[tokio::test]
    async fn test_parsers_created_lazily() {
        let (pool, created) = counting_pool(4, Duration::from_secs(1));
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().total_parsers, 0);

        let guard = pool.acquire().await.unwrap();
        assert_eq!(*guard, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parser_returned_and_reused() {
        let (pool, created) = counting_pool(4, Duration::from_secs(1));

        {
            let _guard = pool.acquire().await.unwrap();
            let stats = pool.stats();
            assert_eq!(stats.active_parsers, 1);
            assert_eq!(stats.idle_parsers, 0);
        }

        let stats = pool.stats();
        assert_eq!(stats.active_parsers, 0);
        assert_eq!(stats.idle_parsers, 1);

        let guard = pool.acquire().await.unwrap();
        assert_eq!(*guard, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_times_out() {
        let (pool, _) = counting_pool(1, Duration::from_millis(100));

        let _held = pool.acquire().await.unwrap();
        let start = Instant::now();
        let result = pool.acquire().await;

        assert!(matches!(result, Err(JsonQlError::ResourceExhausted(_))));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(pool.stats().total_parsers, 1);
    }

    #[tokio::test]
    async fn test_release_wakes_waiter() {
        let (pool, created) = counting_pool(1, Duration::from_secs(5));
        let pool = Arc::new(pool);

        let held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|guard| *guard) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        held.release();

        assert_eq!(waiter.await.unwrap().unwrap(), 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pool_stats_display() {
        let (pool, _) = counting_pool(3, Duration::from_secs(1));
        let _a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.max_parsers, 3);
        assert_eq!(stats.total_parsers, 2);
        assert_eq!(stats.to_string(), "Parser Pool: 2/2 active, 0 idle, max 3");
    }
}
