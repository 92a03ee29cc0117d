pub mod pattern;

pub use pattern::{Pattern, is_unsigned_integer};
