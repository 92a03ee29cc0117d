use crate::config::JsonQlConfig;
use crate::core::{JsonQlError, Result, SyntaxError};
use crate::parser::Grammar;
use crate::parser::ast::{PredicateExpr, ValueExpr};
use crate::pool::{ParserPool, PoolStats};
use log::debug;
use lru::LruCache;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Value,
    Predicate,
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Value => f.write_str("value"),
            ExprKind::Predicate => f.write_str("predicate"),
        }
    }
}

/// Result of the single parse of one expression text, handed to every
/// caller that joined the flight. Transient failures settle the flight
/// too but are never stored in a cache.
type Outcome<T> = Result<Arc<T>>;

type Flight<T> = Arc<OnceCell<Outcome<T>>>;

/// Top-level parse rule of a grammar.
type Rule<G, T> = fn(&mut G) -> Result<T>;

/// Positive cache for one expression kind, plus the parses currently running for it.
struct Tier<T> {
    kind: ExprKind,
    entries: Mutex<LruCache<String, Arc<T>>>,
    in_flight: Mutex<HashMap<String, Flight<T>>>,
}

impl<T> Tier<T> {
    fn new(kind: ExprKind, capacity: usize) -> Self {
        Self {
            kind,
            entries: Mutex::new(LruCache::new(JsonQlConfig::capacity(capacity))),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

enum Lookup<T> {
    Cached(Outcome<T>),
    Join(Flight<T>),
}

/// Expression cache
///
/// Parsed ASTs keyed by the raw expression text, with no normalisation:
/// `a=1` and `a = 1` are separate entries. Parse failures are remembered
/// in a negative cache so malformed text is never parsed twice while its
/// entry lives. Concurrent misses for the same text share one parse.
pub struct ExpressionCache<G> {
    pool: ParserPool<G>,
    values: Tier<ValueExpr>,
    predicates: Tier<PredicateExpr>,
    failures: Mutex<LruCache<(ExprKind, String), SyntaxError>>,
    hits: AtomicU64,
    negative_hits: AtomicU64,
    parses: AtomicU64,
}

impl<G: Grammar> ExpressionCache<G> {
    pub fn new(config: &JsonQlConfig, factory: impl Fn() -> G + Send + Sync + 'static) -> Self {
        Self {
            pool: ParserPool::new(
                config.parser_pool_size,
                config.parser_pool_timeout,
                factory,
            ),
            values: Tier::new(ExprKind::Value, config.value_cache_capacity),
            predicates: Tier::new(ExprKind::Predicate, config.predicate_cache_capacity),
            failures: Mutex::new(LruCache::new(JsonQlConfig::capacity(
                config.error_cache_capacity,
            ))),
            hits: AtomicU64::new(0),
            negative_hits: AtomicU64::new(0),
            parses: AtomicU64::new(0),
        }
    }

    /// Get or parse a value expression
    pub async fn value(&self, text: &str) -> Result<Arc<ValueExpr>> {
        self.resolve(&self.values, text, G::parse_value).await
    }

    /// Get or parse a predicate expression
    pub async fn predicate(&self, text: &str) -> Result<Arc<PredicateExpr>> {
        self.resolve(&self.predicates, text, G::parse_predicate).await
    }

    async fn resolve<T>(&self, tier: &Tier<T>, text: &str, rule: Rule<G, T>) -> Result<Arc<T>>
    where
        T: Send + Sync,
    {
        if let Some(outcome) = self.cached(tier, text)? {
            return outcome;
        }

        let flight = match self.join(tier, text)? {
            Lookup::Cached(outcome) => return outcome,
            Lookup::Join(flight) => flight,
        };

        let outcome = flight
            .get_or_init(|| self.parse(tier, text, rule))
            .await
            .clone();
        self.leave(tier, text, &flight)?;

        outcome
    }

    fn cached<T>(&self, tier: &Tier<T>, text: &str) -> Result<Option<Outcome<T>>> {
        if let Some(expr) = tier.entries.lock()?.get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(Ok(Arc::clone(expr))));
        }

        if let Some(error) = self.failures.lock()?.get(&(tier.kind, text.to_string())) {
            self.negative_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Known bad {} expression: {}", tier.kind, text);
            return Ok(Some(Err(JsonQlError::Syntax(error.clone()))));
        }

        Ok(None)
    }

    /// Find the running parse for `text`, or register a new one.
    ///
    /// The caches are consulted again under the in-flight lock: a parse
    /// stores its outcome before it deregisters, so a caller either sees
    /// the flight or the stored outcome.
    fn join<T>(&self, tier: &Tier<T>, text: &str) -> Result<Lookup<T>> {
        let mut in_flight = tier.in_flight.lock()?;
        if let Some(flight) = in_flight.get(text) {
            return Ok(Lookup::Join(Arc::clone(flight)));
        }
        if let Some(outcome) = self.cached(tier, text)? {
            return Ok(Lookup::Cached(outcome));
        }

        let flight = Arc::new(OnceCell::new());
        in_flight.insert(text.to_string(), Arc::clone(&flight));
        Ok(Lookup::Join(flight))
    }

    /// Deregister a settled flight. Later callers read the caches or start
    /// a new flight.
    fn leave<T>(&self, tier: &Tier<T>, text: &str, flight: &Flight<T>) -> Result<()> {
        let mut in_flight = tier.in_flight.lock()?;
        if in_flight
            .get(text)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            in_flight.remove(text);
        }
        Ok(())
    }

    async fn parse<T>(&self, tier: &Tier<T>, text: &str, rule: Rule<G, T>) -> Outcome<T> {
        let mut parser = self.pool.acquire().await?;
        self.parses.fetch_add(1, Ordering::Relaxed);
        debug!("Parsing {} expression: {}", tier.kind, text);

        parser.reinit(text);
        let parsed = rule(&mut parser);
        parser.release();

        match parsed {
            Ok(expr) => {
                let expr = Arc::new(expr);
                tier.entries.lock()?.put(text.to_string(), Arc::clone(&expr));
                Ok(expr)
            }
            Err(JsonQlError::Syntax(error)) => {
                self.failures
                    .lock()?
                    .put((tier.kind, text.to_string()), error.clone());
                Err(JsonQlError::Syntax(error))
            }
            Err(other) => Err(other),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            value_entries: self.values.len(),
            predicate_entries: self.predicates.len(),
            failure_entries: self.failures.lock().map(|f| f.len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Expression cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub value_entries: usize,
    pub predicate_entries: usize,
    pub failure_entries: usize,
    /// Lookups answered by a positive cache
    pub hits: u64,
    /// Lookups answered by the parse failure cache
    pub negative_hits: u64,
    /// Times a parser was actually invoked
    pub parses: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Expression Cache: {} values, {} predicates, {} failures; {} hits, {} negative hits, {} parses",
            self.value_entries,
            self.predicate_entries,
            self.failure_entries,
            self.hits,
            self.negative_hits,
            self.parses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JsonQlParser;
    use std::time::Duration;

    fn cache(config: JsonQlConfig) -> ExpressionCache<JsonQlParser> {
        ExpressionCache::new(&config, JsonQlParser::new)
    }

    /// Grammar whose engine always breaks down.
    struct BrokenGrammar;

    impl Grammar for BrokenGrammar {
        fn reinit(&mut self, _text: &str) {}

        fn parse_value(&mut self) -> Result<ValueExpr> {
            Err(JsonQlError::ParserFailure("engine state corrupted".into()))
        }

        fn parse_predicate(&mut self) -> Result<PredicateExpr> {
            Err(JsonQlError::ParserFailure("engine state corrupted".into()))
        }
    }

    #[tokio::test]
    async fn test_positive_hit_shares_ast() {
        let cache = cache(JsonQlConfig::new());

        let first = cache.value("a.b").await.unwrap();
        let second = cache.value("a.b").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.parses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.value_entries, 1);
    }

    #[tokio::test]
    async fn test_keys_are_not_normalised() {
        let cache = cache(JsonQlConfig::new());

        cache.predicate("a=1").await.unwrap();
        cache.predicate("a = 1").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.parses, 2);
        assert_eq!(stats.predicate_entries, 2);
    }

    #[tokio::test]
    async fn test_negative_cache() {
        let cache = cache(JsonQlConfig::new());

        let first = cache.predicate("a = ").await.unwrap_err();
        let second = cache.predicate("a = ").await.unwrap_err();

        match (first, second) {
            (JsonQlError::Syntax(a), JsonQlError::Syntax(b)) => assert_eq!(a, b),
            other => panic!("expected syntax errors, got {:?}", other),
        }
        let stats = cache.stats();
        assert_eq!(stats.parses, 1);
        assert_eq!(stats.negative_hits, 1);
        assert_eq!(stats.failure_entries, 1);
    }

    #[tokio::test]
    async fn test_failures_are_kept_per_kind() {
        let cache = cache(JsonQlConfig::new());

        assert!(cache.predicate("a.b").await.is_err());
        assert!(cache.value("a.b").await.is_ok());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = cache(JsonQlConfig::new().value_cache_capacity(2));

        cache.value("a").await.unwrap();
        cache.value("b").await.unwrap();
        cache.value("a").await.unwrap();
        cache.value("c").await.unwrap(); // evicts b
        cache.value("a").await.unwrap();
        cache.value("b").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.value_entries, 2);
        assert_eq!(stats.parses, 4);
    }

    #[tokio::test]
    async fn test_engine_failure_not_cached() {
        let config = JsonQlConfig::new();
        let cache = ExpressionCache::new(&config, || BrokenGrammar);

        for _ in 0..2 {
            let err = cache.value("a").await.unwrap_err();
            assert!(matches!(err, JsonQlError::ParserFailure(_)));
        }

        let stats = cache.stats();
        assert_eq!(stats.parses, 2);
        assert_eq!(stats.failure_entries, 0);
        assert_eq!(stats.value_entries, 0);
        assert_eq!(cache.pool_stats().idle_parsers, 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_not_cached() {
        let config = JsonQlConfig::new()
            .parser_pool_size(1)
            .parser_pool_timeout(Duration::from_millis(50));
        let cache = cache(config);

        let held = cache.pool.acquire().await.unwrap();
        let err = cache.value("a").await.unwrap_err();
        assert!(err.is_resource_exhausted());
        held.release();

        assert!(cache.value("a").await.is_ok());
        assert_eq!(cache.stats().parses, 1);
        assert!(cache.values.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_joined_callers_share_exhaustion() {
        let timeout = Duration::from_millis(200);
        let config = JsonQlConfig::new()
            .parser_pool_size(1)
            .parser_pool_timeout(timeout);
        let cache = Arc::new(cache(config));
        let held = cache.pool.acquire().await.unwrap();

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let started = std::time::Instant::now();
                    let result = cache.value("same").await;
                    (result, started.elapsed())
                })
            })
            .collect();

        for caller in callers {
            let (result, waited) = caller.await.unwrap();
            assert!(result.unwrap_err().is_resource_exhausted());
            assert!(waited < timeout * 2, "caller waited {:?}", waited);
        }
        held.release();

        assert!(cache.values.in_flight.lock().unwrap().is_empty());
        assert_eq!(cache.stats().failure_entries, 0);
        assert!(cache.value("same").await.is_ok());
    }
}
