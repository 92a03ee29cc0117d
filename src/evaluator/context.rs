use crate::core::Node;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Name every recorded error starts with; the scope path follows it.
const ROOT_NAME: &str = "root node";

/// Evaluation errors accumulated during one top-level call.
pub type ErrorSet = BTreeSet<String>;

/// Top-level evaluation context
///
/// Owns the error sink shared by every [`Scope`] derived from it. Created
/// per top-level call and never shared between threads: it is `Send`, so a
/// task may own it, but not `Sync`. Only this type can drain the errors.
#[derive(Debug)]
pub struct EvaluationContext<'a> {
    root: &'a Value,
    errors: RefCell<ErrorSet>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            errors: RefCell::new(ErrorSet::new()),
        }
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    /// Scope positioned at the root node with an empty path
    pub fn scope(&self) -> Scope<'a, '_> {
        Scope {
            node: Node::Present(self.root),
            path: String::new(),
            errors: &self.errors,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.borrow().is_empty()
    }

    /// Return the accumulated errors and clear them.
    pub fn take_errors(&mut self) -> ErrorSet {
        std::mem::take(self.errors.get_mut())
    }
}

/// Position reached while walking a document.
///
/// Holds the current node, the path walked from the root (`.field`,
/// `[index]` per step) and a borrow of the top-level error sink.
#[derive(Debug, Clone)]
pub struct Scope<'a, 's> {
    node: Node<'a>,
    path: String,
    errors: &'s RefCell<ErrorSet>,
}

impl<'a, 's> Scope<'a, 's> {
    pub fn node(&self) -> Node<'a> {
        self.node
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_missing(&self) -> bool {
        self.node.is_missing()
    }

    fn derive(&self, node: Node<'a>, path: String) -> Scope<'a, 's> {
        Scope {
            node,
            path,
            errors: self.errors,
        }
    }

    /// Missing node at the current path
    pub fn missing(&self) -> Scope<'a, 's> {
        self.derive(Node::Missing, self.path.clone())
    }

    pub fn field(&self, name: &str) -> Scope<'a, 's> {
        let path = format!("{}.{}", self.path, name);
        if !self.node.is_object() {
            self.add_error(" is not an object");
            return self.derive(Node::Missing, path);
        }
        match self.node.field(name) {
            Some(value) => self.derive(Node::Present(value), path),
            None => {
                self.add_error(&format!(" does not have field {}", name));
                self.derive(Node::Missing, path)
            }
        }
    }

    pub fn element(&self, index: usize) -> Scope<'a, 's> {
        let path = format!("{}[{}]", self.path, index);
        if !self.node.is_array() {
            self.add_error(" is not an array");
            return self.derive(Node::Missing, path);
        }
        match self.node.element(index) {
            Some(value) => self.derive(Node::Present(value), path),
            None => {
                self.add_error(&format!(" does not have element {}", index));
                self.derive(Node::Missing, path)
            }
        }
    }

    /// Scalar text of the current node.
    ///
    /// The checks are independent; each failing one records its own error.
    pub fn value(&self) -> Option<String> {
        if self.node.is_missing() {
            self.add_error(" is undefined");
        }
        if self.node.is_container() {
            self.add_error(" is a container node");
        }
        if self.node.is_null() {
            self.add_error(" is null");
        }
        self.node.scalar_text()
    }

    pub fn add_error(&self, message: &str) {
        self.errors
            .borrow_mut()
            .insert(format!("{}{}{}", ROOT_NAME, self.path, message));
    }
}
