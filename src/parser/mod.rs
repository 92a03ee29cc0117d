pub mod ast;
pub mod grammar;

pub use grammar::{Grammar, JsonQlParser};
