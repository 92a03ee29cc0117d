use crate::cache::{CacheStats, ExpressionCache};
use crate::config::JsonQlConfig;
use crate::core::{JsonQlError, Node, Result};
use crate::evaluator::{EvaluationContext, Evaluator};
use crate::parser::{Grammar, JsonQlParser};
use crate::pool::PoolStats;
use lazy_static::lazy_static;
use serde_json::Value;

// Process-wide service with the default configuration
lazy_static! {
    static ref GLOBAL_JSONQL: JsonQl = JsonQl::new();
}

/// JSONQL service
///
/// Parses expressions through the shared cache and evaluates them against
/// evaluation contexts. Parse problems are returned as errors; evaluation
/// problems are collected in the context and never fail the call.
pub struct JsonQl<G = JsonQlParser> {
    cache: ExpressionCache<G>,
    evaluator: Evaluator,
}

impl JsonQl<JsonQlParser> {
    /// Get the global JsonQl instance
    pub fn global() -> &'static JsonQl {
        &GLOBAL_JSONQL
    }

    pub fn new() -> Self {
        Self::build(&JsonQlConfig::default(), JsonQlParser::new)
    }

    pub fn with_config(config: JsonQlConfig) -> Result<Self> {
        Self::with_grammar(config, JsonQlParser::new)
    }
}

impl Default for JsonQl<JsonQlParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Grammar> JsonQl<G> {
    /// Create a service whose pool builds parsers with `factory`
    pub fn with_grammar(
        config: JsonQlConfig,
        factory: impl Fn() -> G + Send + Sync + 'static,
    ) -> Result<Self> {
        config.validate().map_err(JsonQlError::Config)?;
        Ok(Self::build(&config, factory))
    }

    fn build(config: &JsonQlConfig, factory: impl Fn() -> G + Send + Sync + 'static) -> Self {
        Self {
            cache: ExpressionCache::new(config, factory),
            evaluator: Evaluator,
        }
    }

    /// Parse a value expression without evaluating it
    pub async fn check_value(&self, expr: &str) -> Result<()> {
        self.cache.value(expr).await.map(|_| ())
    }

    /// Parse a predicate expression without evaluating it
    pub async fn check_predicate(&self, expr: &str) -> Result<()> {
        self.cache.predicate(expr).await.map(|_| ())
    }

    /// Select the node a value expression points at, possibly missing
    pub async fn evaluate<'a>(
        &self,
        expr: &str,
        context: &mut EvaluationContext<'a>,
    ) -> Result<Node<'a>> {
        let expr = self.cache.value(expr).await?;
        let scope = context.scope();
        Ok(self.evaluator.select(&expr, scope).node())
    }

    /// Test a predicate expression
    pub async fn satisfies(&self, expr: &str, context: &mut EvaluationContext<'_>) -> Result<bool> {
        let expr = self.cache.predicate(expr).await?;
        Ok(self.evaluator.satisfies(&expr, &context.scope()))
    }

    /// Fresh top-level context with an empty path and error set
    pub fn context_of<'a>(&self, root: &'a Value) -> EvaluationContext<'a> {
        EvaluationContext::new(root)
    }

    pub fn cache(&self) -> &ExpressionCache<G> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.cache.pool_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_evaluate_returns_document_node() {
        let jq = JsonQl::new();
        let doc = json!({"a": {"b": [1, 2, 3]}});
        let mut context = jq.context_of(&doc);

        let node = jq.evaluate("a.b[2]", &mut context).await.unwrap();
        assert_eq!(node, Node::Present(&doc["a"]["b"][2]));
        assert!(context.take_errors().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = JsonQl::with_config(JsonQlConfig::new().parser_pool_size(0));
        assert!(matches!(result, Err(JsonQlError::Config(_))));
    }

    #[tokio::test]
    async fn test_global_instance() {
        let doc = json!({"x": "1"});
        let mut context = JsonQl::global().context_of(&doc);
        assert!(JsonQl::global().satisfies("x = 1", &mut context).await.unwrap());
        assert!(std::ptr::eq(JsonQl::global(), JsonQl::global()));
    }
}
