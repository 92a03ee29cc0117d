// ============================================================================
// JSONQL Library
// ============================================================================

//! Embedded expression language for selecting values from, and testing
//! predicates over, JSON documents.
//!
//! ```
//! use jsonql::{JsonQl, Node};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let jq = JsonQl::new();
//! let doc = json!({"a": {"b": [1, 2, 3]}, "tag": "x"});
//!
//! let mut context = jq.context_of(&doc);
//! assert!(jq.satisfies(r#"tag in (x, y) and a.b[0] < 2"#, &mut context).await?);
//!
//! let node = jq.evaluate("a.b[5]", &mut context).await?;
//! assert_eq!(node, Node::Missing);
//! assert!(context.take_errors().contains("root node.a.b does not have element 5"));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod config;
pub mod cache;
pub mod pool;
pub mod facade;
pub mod parser;
pub mod evaluator;
mod expression;

// Re-export main types for convenience
pub use facade::JsonQl;
pub use config::JsonQlConfig;
pub use crate::core::{JsonQlError, Node, Result, SyntaxError};
pub use cache::{CacheStats, ExpressionCache, ExprKind};
pub use pool::{ParserPool, PoolGuard, PoolStats};
pub use evaluator::{ErrorSet, EvaluationContext, Evaluator, Scope};
pub use parser::{Grammar, JsonQlParser};
pub use parser::ast::{CompareOp, Predicate, PredicateExpr, Selector, ValueExpr};
pub use expression::Pattern;
