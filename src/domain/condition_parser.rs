//! Condition text parser.
//!
//! Recursive descent over the condition syntax. Every node is built through a
//! [`Registry`], so parsing the canonical rendering of an expression returns
//! the very same interned instance.
//!
//! ```text
//! expr      := or
//! or        := and ('|' and)*
//! and       := unary ('&' unary)*
//! unary     := '~' unary | '(' expr ')' | ANYTIME | NOTIME | FLAG(ident)
//!            | '$' ident | predicate
//! predicate := series op level
//! series    := term (('+' | '-') (term | number | '(' series ')'))*
//! term      := ident ('[' int ']')? | COUNT(expr (',' expr)*)
//! level     := number | interval | series
//! interval  := ('[' | '(') number ',' number (']' | ')')
//! ```
//!
//! `ANYTIME`, `NOTIME`, `FLAG` and `COUNT` are reserved: a column with one of
//! those exact names cannot be used as an operand.

use crate::domain::condition::{Comparison, Direction, Expr, Level};
use crate::domain::error::{ConditionError, ParseError};
use crate::domain::interval::{Closed, Interval};
use crate::domain::registry::Registry;
use crate::domain::series::{ArithOp, Series, Term};
use std::collections::HashMap;

enum Operator {
    Status(Comparison),
    Action(Direction),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    registry: &'a Registry,
    references: Option<&'a HashMap<String, Expr>>,
}

impl<'a> Parser<'a> {
    fn new(
        input: &'a str,
        registry: &'a Registry,
        references: Option<&'a HashMap<String, Expr>>,
    ) -> Self {
        Self {
            input,
            pos: 0,
            registry,
            references,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error_at(
                self.pos,
                format!("expected '{}', found '{}'", expected, ch),
            )),
            None => Err(self.error_at(
                self.pos,
                format!("expected '{}', found end of input", expected),
            )),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(is_ident_char)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|&c| is_ident_char(c))
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn at_number(&self) -> bool {
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => true,
            Some('-') => self
                .peek_second()
                .is_some_and(|c| c.is_ascii_digit() || c == '.'),
            _ => false,
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error_at(start, "expected number"));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| self.error_at(start, format!("invalid number: {}", num_str)))
    }

    fn parse_integer(&mut self) -> Result<i64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == digits_start {
            return Err(self.error_at(start, "expected integer"));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<i64>()
            .map_err(|_| self.error_at(start, format!("invalid integer: {}", num_str)))
    }

    fn parse_ident(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if !self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            let found = self.peek_word();
            return Err(self.error_at(start, format!("expected column name, found '{}'", found)));
        }
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut members = vec![self.parse_and()?];
        loop {
            self.skip_whitespace();
            if self.peek() != Some('|') {
                break;
            }
            self.advance();
            members.push(self.parse_and()?);
        }
        Ok(match members.len() {
            1 => members.remove(0),
            _ => self.registry.or_of(members),
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut members = vec![self.parse_unary()?];
        loop {
            self.skip_whitespace();
            if self.peek() != Some('&') {
                break;
            }
            self.advance();
            members.push(self.parse_unary()?);
        }
        Ok(match members.len() {
            1 => members.remove(0),
            _ => self.registry.and_of(members),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('~') => {
                self.advance();
                let inner = self.parse_unary()?;
                Ok(self.registry.negate(&inner))
            }
            Some('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some('$') => {
                self.advance();
                self.parse_reference()
            }
            None => Err(self.error_at(self.pos, "expected condition, found end of input")),
            Some(_) => {
                if self.consume_keyword("ANYTIME") {
                    return Ok(self.registry.any_time());
                }
                if self.consume_keyword("NOTIME") {
                    return Ok(self.registry.no_time());
                }
                if self.consume_keyword("FLAG") {
                    self.expect_char('(')?;
                    let name = self.parse_ident()?;
                    self.expect_char(')')?;
                    return Ok(self.registry.flag(name));
                }
                self.parse_predicate()
            }
        }
    }

    fn parse_reference(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let name = self.parse_ident()?;
        let Some(references) = self.references else {
            return Err(self.error_at(start, format!("reference '${}' used outside a signal set", name)));
        };
        references
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| self.error_at(start, format!("unknown reference '${}'", name)))
    }

    fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let operand = self.parse_series()?;
        self.skip_whitespace();
        let op_pos = self.pos;
        let Some(operator) = self.parse_operator() else {
            if operand.is_count() {
                let err = ConditionError::AggregateNotPredicate {
                    expr: operand.to_string(),
                };
                return Err(self.error_at(start, err.to_string()));
            }
            let found = self.peek_word();
            return Err(self.error_at(
                op_pos,
                format!("expected comparison or direction after '{}', found '{}'", operand, found),
            ));
        };
        let level = self.parse_level()?;
        let built = match operator {
            Operator::Status(comparison) => self.registry.status(&operand, comparison, level),
            Operator::Action(direction) => self.registry.action(&operand, direction, level),
        };
        built.map_err(|e| self.error_at(start, e.to_string()))
    }

    fn parse_operator(&mut self) -> Option<Operator> {
        for symbol in ["<=", ">=", "==", "!=", "<", ">"] {
            if self.consume_exact(symbol) {
                return symbol.parse().ok().map(Operator::Status);
            }
        }
        let word = self.peek_word();
        let operator = if let Ok(comparison) = word.parse::<Comparison>() {
            Operator::Status(comparison)
        } else if let Ok(direction) = word.parse::<Direction>() {
            Operator::Action(direction)
        } else {
            return None;
        };
        self.pos += word.len();
        Some(operator)
    }

    fn parse_series(&mut self) -> Result<Series, ParseError> {
        let mut series = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => ArithOp::Add,
                Some('-') => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            self.skip_whitespace();
            let right: Term = if self.at_number() {
                let value = self.parse_number()?;
                Term::Constant(value)
            } else if self.peek() == Some('(') {
                self.advance();
                let inner = self.parse_series()?;
                self.expect_char(')')?;
                Term::Series(inner)
            } else {
                Term::Series(self.parse_term()?)
            };
            series = self.registry.arithmetic(op, &series, right);
        }
        Ok(series)
    }

    fn parse_term(&mut self) -> Result<Series, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.consume_keyword("COUNT") {
            self.expect_char('(')?;
            let mut members = vec![self.parse_expr()?];
            loop {
                self.skip_whitespace();
                if self.peek() == Some(')') {
                    self.advance();
                    break;
                }
                self.expect_char(',')?;
                members.push(self.parse_expr()?);
            }
            return self
                .registry
                .count(members)
                .map_err(|e| self.error_at(start, e.to_string()));
        }

        let name = self.parse_ident()?;
        let mut lag = 0;
        self.skip_whitespace();
        if self.peek() == Some('[') {
            self.advance();
            lag = self.parse_integer()?;
            self.expect_char(']')?;
        }
        Ok(self.registry.lagged(name, lag))
    }

    fn parse_level(&mut self) -> Result<Level, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(open @ ('[' | '(')) => {
                let start = self.pos;
                self.advance();
                let left = self.parse_number()?;
                self.expect_char(',')?;
                let right = self.parse_number()?;
                self.skip_whitespace();
                let right_closed = match self.advance() {
                    Some(']') => true,
                    Some(')') => false,
                    Some(ch) => {
                        return Err(self.error_at(
                            self.pos - ch.len_utf8(),
                            format!("expected ']' or ')', found '{}'", ch),
                        ));
                    }
                    None => {
                        return Err(self.error_at(self.pos, "expected ']' or ')', found end of input"));
                    }
                };
                let closed = match (open == '[', right_closed) {
                    (true, true) => Closed::Both,
                    (true, false) => Closed::Left,
                    (false, true) => Closed::Right,
                    (false, false) => Closed::Neither,
                };
                Interval::new(left, right, closed)
                    .map(Level::Interval)
                    .map_err(|e| self.error_at(start, e.to_string()))
            }
            None => Err(self.error_at(self.pos, "expected level, found end of input")),
            Some(_) if self.at_number() => Ok(Level::Constant(self.parse_number()?)),
            Some(_) => Ok(Level::Aggregate(self.parse_series()?)),
        }
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error_at(
                self.pos,
                format!("unexpected input after condition: '{}'", self.remaining()),
            ));
        }
        Ok(expr)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse a condition. `$name` references are rejected.
pub fn parse(input: &str, registry: &Registry) -> Result<Expr, ParseError> {
    Parser::new(input, registry, None).parse()
}

/// Parse a condition whose `$name` references resolve through `references`.
/// Names are looked up lowercased, so the map must be keyed that way.
pub fn parse_with_references(
    input: &str,
    registry: &Registry,
    references: &HashMap<String, Expr>,
) -> Result<Expr, ParseError> {
    Parser::new(input, registry, Some(references)).parse()
}

/// Names referenced as `$name` in `input`, in order of first appearance.
pub fn references(input: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = input;
    while let Some(at) = rest.find('$') {
        rest = &rest[at + 1..];
        let name: String = rest.chars().take_while(|&c| is_ident_char(c)).collect();
        rest = &rest[name.len()..];
        if !name.is_empty() && !found.contains(&name) {
            found.push(name);
        }
    }
    found
}
