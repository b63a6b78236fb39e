//! Condition evaluation for branch, loop and group predicates.
//!
//! [`LiteralEvaluator`] is the default and matches the script format's
//! historical placeholder semantics. [`ExpressionEvaluator`] understands a
//! small boolean grammar over the script's variables:
//!
//! ```text
//! expr       := or
//! or         := and ( "||" and )*
//! and        := unary ( "&&" unary )*
//! unary      := "!" unary | comparison
//! comparison := primary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") primary )?
//! primary    := "(" expr ")" | number | 'string' | "string" | identifier
//! ```
//!
//! `true`/`false` are boolean literals; other identifiers resolve through the
//! variable map and fall back to their own name as a string.

use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Where a condition is being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionSite {
    /// Condition step choosing between `then` and `else`
    Branch,
    /// Loop `while` predicate
    Loop,
    /// Task group gate and repeat predicate
    Group,
}

pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &str, site: ConditionSite) -> bool;
}

/// Trimmed, case-insensitive match against `"true"`; group conditions also
/// accept `"1"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralEvaluator;

impl ConditionEvaluator for LiteralEvaluator {
    fn evaluate(&self, condition: &str, site: ConditionSite) -> bool {
        let trimmed = condition.trim();
        trimmed.eq_ignore_ascii_case("true") || (site == ConditionSite::Group && trimmed == "1")
    }
}

/// Evaluates the minimal expression grammar described in the module docs.
///
/// Clones share one variable table, so a script runner can swap in the
/// next script's variables while the executor keeps its evaluator.
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator {
    variables: Arc<DashMap<String, JsonValue>>,
}

impl ExpressionEvaluator {
    pub fn new(variables: HashMap<String, JsonValue>) -> Self {
        let evaluator = Self::default();
        evaluator.set_variables(variables);
        evaluator
    }

    /// Replace the variable table
    pub fn set_variables(&self, variables: HashMap<String, JsonValue>) {
        self.variables.clear();
        for (name, value) in variables {
            self.variables.insert(name, value);
        }
    }

    /// Evaluate to a boolean, reporting syntax errors
    pub fn try_evaluate(&self, condition: &str) -> Result<bool, ExpressionError> {
        let tokens = tokenize(condition)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            variables: &self.variables,
        };
        let value = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(ExpressionError::UnexpectedToken(format!("{:?}", token)));
        }
        Ok(value.truthy())
    }
}

impl ConditionEvaluator for ExpressionEvaluator {
    fn evaluate(&self, condition: &str, _site: ConditionSite) -> bool {
        match self.try_evaluate(condition) {
            Ok(value) => value,
            Err(e) => {
                warn!("Condition '{}' could not be evaluated: {}", condition, e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Str(n.to_string())),
            JsonValue::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("true") || s == "1"
            }
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    fn compare(&self, op: CompareOp, other: &Value) -> bool {
        if let (Value::Bool(a), Value::Bool(b)) = (self, other) {
            return match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                _ => false,
            };
        }
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
            };
        }
        let (a, b) = (self.as_text(), other.as_text());
        match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CompareOp::Le,
                    ('<', false) => CompareOp::Lt,
                    (_, true) => CompareOp::Ge,
                    (_, false) => CompareOp::Gt,
                };
                tokens.push(Token::Op(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|offset| start + offset)
                    .ok_or(ExpressionError::UnterminatedString)?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse()
                    .map_err(|_| ExpressionError::UnexpectedToken(text.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExpressionError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '$' | '{' | '}')
}

/// Nesting limit for `!` and parentheses
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    variables: &'a DashMap<String, JsonValue>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Value, ExpressionError> {
        let mut value = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            value = Value::Bool(value.truthy() || rhs.truthy());
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<Value, ExpressionError> {
        let mut value = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.parse_unary()?;
            value = Value::Bool(value.truthy() && rhs.truthy());
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<Value, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.descend()?;
            let value = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Value::Bool(!value.truthy()));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Value, ExpressionError> {
        let lhs = self.parse_primary()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.advance();
            let rhs = self.parse_primary()?;
            return Ok(Value::Bool(lhs.compare(op, &rhs)));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Value, ExpressionError> {
        match self.advance() {
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.parse_or()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(ExpressionError::UnexpectedToken(format!("{:?}", other))),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(name)) => Ok(self.resolve(&name)),
            Some(other) => Err(ExpressionError::UnexpectedToken(format!("{:?}", other))),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn resolve(&self, name: &str) -> Value {
        if name.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if name.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        self.variables
            .get(name)
            .map(|value| Value::from_json(value.value()))
            .unwrap_or_else(|| Value::Str(name.to_string()))
    }
}
