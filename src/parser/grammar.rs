//! Recursive-descent parser for JSONQL expressions.
//!
//! ```text
//! value       := first ( '.' ident | '[' bracket ']' )*
//! first       := ident | '[' bracket ']'
//! bracket     := uint | string | predicate
//! predicate   := conjunction ( 'or' conjunction )*
//! conjunction := unary ( 'and' unary )*
//! unary       := 'not' unary | '(' predicate ')' | 'exists' value
//!              | value '=' literal | value '~' string
//!              | value 'in' '(' literal ( ',' literal )* ')'
//!              | value ( '<' | '<=' | '>' | '>=' ) int
//! ```

use crate::core::{JsonQlError, Result, SyntaxError};
use crate::expression::Pattern;
use crate::parser::ast::{
    CompareOp, KEYWORDS, Predicate, PredicateExpr, Selector, ValueExpr, is_identifier_part,
    is_identifier_start,
};

const MAX_NESTING: usize = 64;

type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// Parser engine contract used by the parser pool.
///
/// An instance is reinitialised with new text before every parse and is
/// never used by two callers at once. Any error other than
/// [`JsonQlError::Syntax`] is treated as a failure of the engine itself and
/// is not remembered by the expression cache.
pub trait Grammar: Send + 'static {
    fn reinit(&mut self, text: &str);

    fn parse_value(&mut self) -> Result<ValueExpr>;

    fn parse_predicate(&mut self) -> Result<PredicateExpr>;
}

/// Reusable JSONQL parser. Keeps its character buffer between parses.
#[derive(Debug, Default)]
pub struct JsonQlParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Grammar for JsonQlParser {
    fn reinit(&mut self, text: &str) {
        self.chars.clear();
        self.chars.extend(text.chars());
        self.pos = 0;
        self.depth = 0;
    }

    fn parse_value(&mut self) -> Result<ValueExpr> {
        let expr = self.value().and_then(|expr| self.finish(expr))?;
        Ok(expr)
    }

    fn parse_predicate(&mut self) -> Result<PredicateExpr> {
        let root = self.disjunction().and_then(|root| self.finish(root))?;
        Ok(PredicateExpr { root })
    }
}

impl JsonQlParser {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================
    // Cursor
    // ========================================

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.pos)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(c) => self.error(format!("expected {}, found '{}'", expected, c)),
            None => self.error(format!("expected {}, found end of input", expected)),
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", expected)))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        let end = self.pos + keyword.len();
        end <= self.chars.len()
            && self.chars[self.pos..end].iter().copied().eq(keyword.chars())
            && !self.chars.get(end).copied().is_some_and(is_identifier_part)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        if self.at_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn finish<T>(&mut self, parsed: T) -> ParseResult<T> {
        self.skip_ws();
        match self.peek() {
            None => Ok(parsed),
            Some(c) => Err(self.error(format!("unexpected '{}' after expression", c))),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ========================================
    // Tokens
    // ========================================

    fn identifier(&mut self, allow_keyword: bool) -> ParseResult<String> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(c) if is_identifier_start(c) => {}
            _ => return Err(self.unexpected("field name, index or predicate")),
        }
        while self.peek().is_some_and(is_identifier_part) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if !allow_keyword && KEYWORDS.contains(&name.as_str()) {
            return Err(SyntaxError::new(
                format!("'{}' is a reserved word, write [\"{}\"] to select a field of that name", name, name),
                start,
            ));
        }
        Ok(name)
    }

    fn string(&mut self) -> ParseResult<String> {
        self.skip_ws();
        let start = self.pos;
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.unexpected("string literal")),
        };
        self.pos += 1;

        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(SyntaxError::new("unterminated string literal", start)),
                Some('\\') => match self.bump() {
                    Some(c @ ('"' | '\'' | '\\' | '/')) => text.push(c),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    // kept verbatim so regex escapes like \d survive
                    Some(c) => {
                        text.push('\\');
                        text.push(c);
                    }
                    None => return Err(SyntaxError::new("unterminated string literal", start)),
                },
                Some(c) if c == quote => return Ok(text),
                Some(c) => text.push(c),
            }
        }
    }

    fn literal(&mut self) -> ParseResult<String> {
        self.skip_ws();
        if matches!(self.peek(), Some('"' | '\'')) {
            return self.string();
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || "_$.+-".contains(c))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.unexpected("literal"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn digits(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn index(&mut self) -> ParseResult<usize> {
        let start = self.pos;
        let digits = self.digits();
        digits
            .parse()
            .map_err(|_| SyntaxError::new(format!("index {} out of range", digits), start))
    }

    fn integer(&mut self) -> ParseResult<i64> {
        self.skip_ws();
        let start = self.pos;
        let negative = self.peek() == Some('-');
        if negative {
            self.pos += 1;
        }
        let digits = self.digits();
        if digits.is_empty() {
            return Err(self.unexpected("integer"));
        }
        let text = if negative { format!("-{}", digits) } else { digits };
        text.parse()
            .map_err(|_| SyntaxError::new(format!("integer {} out of range", text), start))
    }

    // ========================================
    // Value expressions
    // ========================================

    fn value(&mut self) -> ParseResult<ValueExpr> {
        self.skip_ws();
        let mut steps = Vec::new();

        if self.eat('[') {
            steps.push(self.bracket()?);
        } else {
            steps.push(Selector::Field(self.identifier(false)?));
        }

        loop {
            if self.eat('.') {
                steps.push(Selector::Field(self.identifier(true)?));
            } else if self.eat('[') {
                steps.push(self.bracket()?);
            } else {
                break;
            }
        }

        Ok(ValueExpr { steps })
    }

    /// Contents of `[...]`, the opening bracket already consumed.
    fn bracket(&mut self) -> ParseResult<Selector> {
        self.skip_ws();
        let selector = match self.peek() {
            Some(c) if c.is_ascii_digit() => Selector::Index(self.index()?),
            Some('"' | '\'') => Selector::Field(self.string()?),
            _ => {
                self.enter()?;
                let predicate = self.disjunction()?;
                self.leave();
                Selector::Filter(Box::new(predicate))
            }
        };
        self.expect(']')?;
        Ok(selector)
    }

    // ========================================
    // Predicates
    // ========================================

    fn disjunction(&mut self) -> ParseResult<Predicate> {
        let mut children = vec![self.conjunction()?];
        while self.eat_keyword("or") {
            children.push(self.conjunction()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Predicate::Or(children)
        })
    }

    fn conjunction(&mut self) -> ParseResult<Predicate> {
        let mut children = vec![self.unary()?];
        while self.eat_keyword("and") {
            children.push(self.unary()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Predicate::And(children)
        })
    }

    fn unary(&mut self) -> ParseResult<Predicate> {
        if self.eat_keyword("not") {
            self.enter()?;
            let inner = self.unary()?;
            self.leave();
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if self.eat('(') {
            self.enter()?;
            let inner = self.disjunction()?;
            self.leave();
            self.expect(')')?;
            return Ok(inner);
        }
        if self.eat_keyword("exists") {
            return Ok(Predicate::Exists(self.value()?));
        }

        let lhs = self.value()?;
        self.skip_ws();
        match self.peek() {
            Some('=') => {
                self.pos += 1;
                let value = self.literal()?;
                Ok(Predicate::Equals { lhs, value })
            }
            Some('~') => {
                self.pos += 1;
                self.skip_ws();
                let start = self.pos;
                let source = self.string()?;
                let pattern = Pattern::compile(&source).map_err(|e| {
                    SyntaxError::new(format!("invalid regular expression: {}", e), start)
                })?;
                Ok(Predicate::Matches { lhs, pattern })
            }
            Some(c @ ('<' | '>')) => {
                self.pos += 1;
                let inclusive = self.peek() == Some('=');
                if inclusive {
                    self.pos += 1;
                }
                let op = match (c, inclusive) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                let value = self.integer()?;
                Ok(Predicate::Compare { lhs, op, value })
            }
            _ if self.eat_keyword("in") => {
                self.expect('(')?;
                let mut values = vec![self.literal()?];
                while self.eat(',') {
                    values.push(self.literal()?);
                }
                self.expect(')')?;
                Ok(Predicate::In { lhs, values })
            }
            _ => Err(self.unexpected("'=', '~', 'in', '<', '<=', '>' or '>='")),
        }
    }
}
