use crate::expression::Pattern;
use std::fmt;

/// Words the grammar reserves; fields with these names need `["..."]`.
pub const KEYWORDS: [&str; 5] = ["and", "or", "not", "in", "exists"];

/// Value expression: selector steps applied left to right to the context node.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueExpr {
    pub steps: Vec<Selector>,
}

/// One step of a value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `.name` or `["name"]`
    Field(String),
    /// `[3]`
    Index(usize),
    /// `[predicate]`: the child (field or element) satisfying the predicate
    Filter(Box<Predicate>),
}

/// Parsed predicate expression. The root holds exactly one predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateExpr {
    pub root: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
    Not(Box<Predicate>),
    /// `lhs = "literal"`, exact string equality on the scalar text
    Equals { lhs: ValueExpr, value: String },
    /// `lhs ~ "regex"`, full match
    Matches { lhs: ValueExpr, pattern: Pattern },
    /// `lhs in (a, b, c)`
    In { lhs: ValueExpr, values: Vec<String> },
    /// `exists lhs`
    Exists(ValueExpr),
    /// `lhs > 3`, integer comparison
    Compare {
        lhs: ValueExpr,
        op: CompareOp,
        value: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl Predicate {
    fn precedence(&self) -> u8 {
        match self {
            Predicate::Or(_) => 1,
            Predicate::And(_) => 2,
            _ => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// True if `name` can be written as a bare identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_identifier_start(c) => {}
        _ => return false,
    }
    chars.all(is_identifier_part) && !KEYWORDS.contains(&name)
}

pub(crate) fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Selector::Field(name) if is_identifier(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Selector::Field(name) => {
                    f.write_str("[")?;
                    write_quoted(f, name)?;
                    f.write_str("]")?;
                }
                Selector::Index(index) => write!(f, "[{}]", index)?,
                Selector::Filter(predicate) => write!(f, "[{}]", predicate)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    child.fmt_operand(f, 1)?;
                }
                Ok(())
            }
            Predicate::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    child.fmt_operand(f, 2)?;
                }
                Ok(())
            }
            Predicate::Not(child) => {
                f.write_str("not ")?;
                child.fmt_operand(f, 3)
            }
            Predicate::Equals { lhs, value } => {
                write!(f, "{} = ", lhs)?;
                write_quoted(f, value)
            }
            Predicate::Matches { lhs, pattern } => {
                write!(f, "{} ~ ", lhs)?;
                write_quoted(f, pattern.source())
            }
            Predicate::In { lhs, values } => {
                write!(f, "{} in (", lhs)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, value)?;
                }
                f.write_str(")")
            }
            Predicate::Exists(lhs) => write!(f, "exists {}", lhs),
            Predicate::Compare { lhs, op, value } => {
                write!(f, "{} {} {}", lhs, op.symbol(), value)
            }
        }
    }
}

impl fmt::Display for PredicateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
