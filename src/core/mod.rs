pub mod error;
pub mod node;

pub use error::{JsonQlError, Result, SyntaxError};
pub use node::Node;
