use crate::core::{JsonQlError, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Service configuration
///
/// Sizes of the parser pool and of the three expression caches.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonQlConfig {
    /// Number of parser instances the pool may hold
    pub parser_pool_size: usize,

    /// How long a parse waits for an idle parser
    pub parser_pool_timeout: Duration,

    /// Capacity of the value expression cache
    pub value_cache_capacity: usize,

    /// Capacity of the predicate expression cache
    pub predicate_cache_capacity: usize,

    /// Capacity of the parse failure cache
    pub error_cache_capacity: usize,
}

impl JsonQlConfig {
    pub const DEFAULT_PARSER_POOL_SIZE: usize = 8;
    pub const DEFAULT_PARSER_POOL_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_VALUE_CACHE_CAPACITY: usize = 1000;
    pub const DEFAULT_PREDICATE_CACHE_CAPACITY: usize = 100;
    pub const DEFAULT_ERROR_CACHE_CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self {
            parser_pool_size: Self::DEFAULT_PARSER_POOL_SIZE,
            parser_pool_timeout: Duration::from_secs(Self::DEFAULT_PARSER_POOL_TIMEOUT_SECS),
            value_cache_capacity: Self::DEFAULT_VALUE_CACHE_CAPACITY,
            predicate_cache_capacity: Self::DEFAULT_PREDICATE_CACHE_CAPACITY,
            error_cache_capacity: Self::DEFAULT_ERROR_CACHE_CAPACITY,
        }
    }

    /// Set parser pool size
    pub fn parser_pool_size(mut self, size: usize) -> Self {
        self.parser_pool_size = size;
        self
    }

    /// Set parser checkout timeout
    pub fn parser_pool_timeout(mut self, timeout: Duration) -> Self {
        self.parser_pool_timeout = timeout;
        self
    }

    /// Set value expression cache capacity
    pub fn value_cache_capacity(mut self, capacity: usize) -> Self {
        self.value_cache_capacity = capacity;
        self
    }

    /// Set predicate expression cache capacity
    pub fn predicate_cache_capacity(mut self, capacity: usize) -> Self {
        self.predicate_cache_capacity = capacity;
        self
    }

    /// Set parse failure cache capacity
    pub fn error_cache_capacity(mut self, capacity: usize) -> Self {
        self.error_cache_capacity = capacity;
        self
    }

    /// Load from the nested component layout
    ///
    /// Every key is optional:
    ///
    /// ```json
    /// {
    ///   "parserPool": { "size": 8, "timeout": 5 },
    ///   "expressionCache": { "values": 1000, "predicates": 100 },
    ///   "errorCache": { "size": 100 }
    /// }
    /// ```
    ///
    /// `timeout` is in seconds.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| JsonQlError::Config(format!("Invalid configuration: {}", e)))?;

        let config = Self {
            parser_pool_size: file.parser_pool.size,
            parser_pool_timeout: Duration::from_secs(file.parser_pool.timeout),
            value_cache_capacity: file.expression_cache.values,
            predicate_cache_capacity: file.expression_cache.predicates,
            error_cache_capacity: file.error_cache.size,
        };
        config.validate().map_err(JsonQlError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.parser_pool_size == 0 {
            return Err("parser_pool_size must be > 0".to_string());
        }

        if self.value_cache_capacity == 0 {
            return Err("value_cache_capacity must be > 0".to_string());
        }

        if self.predicate_cache_capacity == 0 {
            return Err("predicate_cache_capacity must be > 0".to_string());
        }

        if self.error_cache_capacity == 0 {
            return Err("error_cache_capacity must be > 0".to_string());
        }

        Ok(())
    }

    pub(crate) fn capacity(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for JsonQlConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    parser_pool: ParserPoolSection,
    expression_cache: ExpressionCacheSection,
    error_cache: ErrorCacheSection,
}

#[derive(Deserialize)]
#[serde(default)]
struct ParserPoolSection {
    size: usize,
    timeout: u64,
}

impl Default for ParserPoolSection {
    fn default() -> Self {
        Self {
            size: JsonQlConfig::DEFAULT_PARSER_POOL_SIZE,
            timeout: JsonQlConfig::DEFAULT_PARSER_POOL_TIMEOUT_SECS,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ExpressionCacheSection {
    values: usize,
    predicates: usize,
}

impl Default for ExpressionCacheSection {
    fn default() -> Self {
        Self {
            values: JsonQlConfig::DEFAULT_VALUE_CACHE_CAPACITY,
            predicates: JsonQlConfig::DEFAULT_PREDICATE_CACHE_CAPACITY,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ErrorCacheSection {
    size: usize,
}

impl Default for ErrorCacheSection {
    fn default() -> Self {
        Self {
            size: JsonQlConfig::DEFAULT_ERROR_CACHE_CAPACITY,
        }
    }
}
