pub mod context;

pub use context::{ErrorSet, EvaluationContext, Scope};

use crate::core::Node;
use crate::expression::is_unsigned_integer;
use crate::parser::ast::{Predicate, PredicateExpr, Selector, ValueExpr};
use serde_json::Value;

/// Evaluates parsed expressions against a [`Scope`].
///
/// Stateless: all per-call state lives in the scope and its error sink.
/// Evaluation never fails; problems are recorded as errors and the result
/// falls back to `false` or a missing node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    /// Apply the steps of a value expression in order.
    ///
    /// Stops at the first step that yields a missing node; later steps are
    /// not applied and record nothing.
    pub fn select<'a, 's>(&self, expr: &ValueExpr, scope: Scope<'a, 's>) -> Scope<'a, 's> {
        let mut current = scope;
        for step in &expr.steps {
            if current.is_missing() {
                break;
            }
            current = match step {
                Selector::Field(name) => current.field(name),
                Selector::Index(index) => current.element(*index),
                Selector::Filter(predicate) => self.filter(predicate, &current),
            };
        }
        current
    }

    pub fn satisfies(&self, expr: &PredicateExpr, scope: &Scope<'_, '_>) -> bool {
        self.test(&expr.root, scope)
    }

    pub fn test(&self, predicate: &Predicate, scope: &Scope<'_, '_>) -> bool {
        match predicate {
            Predicate::Or(children) => children.iter().any(|child| self.test(child, scope)),
            Predicate::And(children) => children.iter().all(|child| self.test(child, scope)),
            Predicate::Not(child) => !self.test(child, scope),
            Predicate::Equals { lhs, value } => self
                .scalar(lhs, scope)
                .is_some_and(|text| text == *value),
            Predicate::Matches { lhs, pattern } => self
                .scalar(lhs, scope)
                .is_some_and(|text| pattern.matches(&text)),
            Predicate::In { lhs, values } => self
                .scalar(lhs, scope)
                .is_some_and(|text| values.contains(&text)),
            Predicate::Exists(lhs) => {
                let target = self.select(lhs, scope.clone());
                !(target.is_missing() || target.node().is_null())
            }
            Predicate::Compare { lhs, op, value } => {
                let target = self.select(lhs, scope.clone());
                if target.is_missing() {
                    return false;
                }
                let Some(text) = target.value() else {
                    return false;
                };
                if is_unsigned_integer(&text) {
                    if let Ok(number) = text.parse::<i64>() {
                        return op.apply(number, *value);
                    }
                }
                target.add_error(" is not a number");
                false
            }
        }
    }

    /// Scalar text at `lhs`, `None` if the chain is missing or the node has no scalar value.
    fn scalar(&self, lhs: &ValueExpr, scope: &Scope<'_, '_>) -> Option<String> {
        let target = self.select(lhs, scope.clone());
        if target.is_missing() {
            None
        } else {
            target.value()
        }
    }

    /// Child of the current container satisfying `predicate`.
    ///
    /// Every child is tested and the last one that satisfies the predicate
    /// wins. Errors recorded while testing non-matching children stay in
    /// the sink.
    fn filter<'a, 's>(&self, predicate: &Predicate, scope: &Scope<'a, 's>) -> Scope<'a, 's> {
        let mut found = None;
        match scope.node() {
            Node::Present(Value::Object(map)) => {
                for name in map.keys() {
                    let child = scope.field(name);
                    if self.test(predicate, &child) {
                        found = Some(child);
                    }
                }
            }
            Node::Present(Value::Array(items)) => {
                for index in 0..items.len() {
                    let child = scope.element(index);
                    if self.test(predicate, &child) {
                        found = Some(child);
                    }
                }
            }
            _ => {
                scope.add_error(" is not a container node");
                return scope.missing();
            }
        }

        found.unwrap_or_else(|| {
            scope.add_error(&format!(
                " does not contain child node satisfying {}",
                predicate
            ));
            scope.missing()
        })
    }
}
