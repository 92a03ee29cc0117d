use lru::LruCache;
use regex::Regex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const REGEX_CACHE_CAPACITY: usize = 200;

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Mutex<LruCache<String, Arc<Regex>>> = Mutex::new(LruCache::new(
        NonZeroUsize::new(REGEX_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
    ));

    static ref UNSIGNED_INTEGER: Regex = Regex::new("^[0-9]+$").unwrap();
}

/// Regular expression of a match predicate.
///
/// Always applied as a full match: the source is compiled as `^(?:source)$`.
/// Expressions that differ only in surrounding text share one compiled
/// regex through a small process-wide LRU.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Arc<Regex>,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        if let Ok(mut cache) = REGEX_LRU_CACHE.lock() {
            if let Some(regex) = cache.get(source) {
                return Ok(Self {
                    source: source.to_string(),
                    regex: Arc::clone(regex),
                });
            }
        }

        let regex = Arc::new(Regex::new(&format!("^(?:{})$", source))?);

        if let Ok(mut cache) = REGEX_LRU_CACHE.lock() {
            cache.put(source.to_string(), Arc::clone(&regex));
        }

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// Operand accepted by numeric comparison: one or more ASCII digits, nothing else.
#[inline]
pub fn is_unsigned_integer(text: &str) -> bool {
    UNSIGNED_INTEGER.is_match(text)
}
