//! A small arithmetic language for objective functions.
//!
//! Objective functions are written as plain formulas over result-variable
//! keys, e.g. `cl/cd` or `(cl - 0.1*cd)/cd`. The grammar is deliberately
//! tiny: numbers, identifiers, parentheses, unary minus and the four binary
//! operators with the usual precedence. Nothing is ever executed; formulas
//! are parsed into an [`Expr`] tree and folded with caller-provided bindings.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("Invalid number '{text}' at position {pos}")]
    InvalidNumber { pos: usize, text: String },
    #[error("Unexpected {found} at position {pos}")]
    UnexpectedToken { pos: usize, found: String },
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }

    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }

    fn fold<F>(&self, lookup: &F) -> Result<f64, ExpressionError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => {
                lookup(name).ok_or_else(|| ExpressionError::UndefinedVariable(name.clone()))
            }
            Expr::Neg(inner) => Ok(-inner.fold(lookup)?),
            Expr::Binary { op, lhs, rhs } => Ok(op.apply(lhs.fold(lookup)?, rhs.fold(lookup)?)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Variable(name) => f.write_str(name),
            Expr::Neg(inner) => write!(f, "(-{})", inner),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}

/// A parsed objective formula together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser { tokens, cursor: 0 };
        let ast = parser.expression()?;
        if let Some(token) = parser.peek() {
            return Err(ExpressionError::UnexpectedToken {
                pos: token.pos,
                found: token.kind.describe(),
            });
        }
        Ok(Self {
            source: source.trim().to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Identifiers referenced by the formula, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.ast.collect_variables(&mut out);
        out
    }

    pub fn evaluate<F>(&self, lookup: F) -> Result<f64, ExpressionError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.ast.fold(&lookup)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Op(BinaryOp),
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(v) => format!("number {}", v),
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Op(op) => format!("operator '{}'", op.symbol()),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let kind = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => TokenKind::Op(BinaryOp::Add),
            '-' => TokenKind::Op(BinaryOp::Sub),
            '*' => TokenKind::Op(BinaryOp::Mul),
            '/' => TokenKind::Op(BinaryOp::Div),
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                i = scan_number(&chars, i);
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::InvalidNumber { pos: start, text })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    pos: start,
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..i].iter().collect()),
                    pos: start,
                });
                continue;
            }
            other => return Err(ExpressionError::UnexpectedChar { pos: i, ch: other }),
        };
        tokens.push(Token { kind, pos: i });
        i += 1;
    }

    Ok(tokens)
}

fn scan_number(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek_op(&[BinaryOp::Add, BinaryOp::Sub]) {
            self.cursor += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_op(&[BinaryOp::Mul, BinaryOp::Div]) {
            self.cursor += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // unary := ('-' | '+') unary | primary
    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek_op(&[BinaryOp::Sub, BinaryOp::Add]) {
            Some(BinaryOp::Sub) => {
                self.cursor += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(_) => {
                self.cursor += 1;
                self.unary()
            }
            None => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.next().ok_or(ExpressionError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Ident(name) => Ok(Expr::Variable(name)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(ExpressionError::UnexpectedToken {
                        pos: other.pos,
                        found: other.kind.describe(),
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            other => Err(ExpressionError::UnexpectedToken {
                pos: token.pos,
                found: other.describe(),
            }),
        }
    }

    fn peek_op(&self, accepted: &[BinaryOp]) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) if accepted.contains(op) => Some(*op),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn eval(source: &str, bindings: &[(&str, f64)]) -> Result<f64, ExpressionError> {
        let map: HashMap<&str, f64> = bindings.iter().copied().collect();
        Expression::parse(source)?.evaluate(|name| map.get(name).copied())
    }

    #[test]
    fn lift_over_drag_ratio() {
        let value = eval("cl/cd", &[("cl", 0.5), ("cd", 0.1)]).unwrap();
        assert!((value - 5.0).abs() < 1e-12);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(eval("a + b * c", &[("a", 1.0), ("b", 2.0), ("c", 3.0)]).unwrap(), 7.0);
        assert_eq!(eval("a - b - c", &[("a", 10.0), ("b", 2.0), ("c", 3.0)]).unwrap(), 5.0);
        assert_eq!(eval("a / b / c", &[("a", 12.0), ("b", 2.0), ("c", 3.0)]).unwrap(), 2.0);
    }

    #[test]
    fn parentheses_and_unary_minus() {
        assert_eq!(eval("-(a + b) * 2", &[("a", 1.0), ("b", 2.0)]).unwrap(), -6.0);
        assert_eq!(eval("a * -b", &[("a", 3.0), ("b", 2.0)]).unwrap(), -6.0);
        assert_eq!(eval("+a", &[("a", 3.0)]).unwrap(), 3.0);
    }

    #[test]
    fn numeric_literals_including_exponents() {
        assert_eq!(eval("2.5e2 + .5", &[]).unwrap(), 250.5);
        assert_eq!(eval("1E-1*cd", &[("cd", 10.0)]).unwrap(), 1.0);
    }

    #[test]
    fn identifiers_may_contain_underscores_and_digits() {
        assert_eq!(eval("wing_area2 * 2", &[("wing_area2", 4.0)]).unwrap(), 8.0);
    }

    #[test]
    fn unknown_identifier_is_reported() {
        let err = eval("foo/cd", &[("cd", 0.1)]).unwrap_err();
        assert_eq!(err, ExpressionError::UndefinedVariable("foo".to_string()));
    }

    #[test]
    fn variables_are_listed_once_in_order_of_appearance() {
        let expr = Expression::parse("cl/cd + cl*mtom").unwrap();
        assert_eq!(expr.variables(), ["cl", "cd", "mtom"]);
    }

    #[test]
    fn code_like_input_is_rejected() {
        assert!(matches!(
            Expression::parse("__import__('os')"),
            Err(ExpressionError::UnexpectedChar { ch: '\'', .. })
        ));
        assert!(matches!(
            Expression::parse("cl; cd"),
            Err(ExpressionError::UnexpectedChar { ch: ';', .. })
        ));
        assert!(matches!(
            Expression::parse("cl ** cd"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn structural_errors() {
        assert_eq!(Expression::parse("   "), Err(ExpressionError::Empty));
        assert_eq!(Expression::parse("cl/"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            Expression::parse("(cl/cd"),
            Err(ExpressionError::UnexpectedEnd)
        );
        assert!(matches!(
            Expression::parse("cl cd"),
            Err(ExpressionError::UnexpectedToken { pos: 3, .. })
        ));
        assert!(matches!(
            Expression::parse("1.2.3"),
            Err(ExpressionError::InvalidNumber { pos: 0, .. })
        ));
    }

    #[test]
    fn display_keeps_source_and_ast_shows_grouping() {
        let expr: Expression = " cl / cd ".parse().unwrap();
        assert_eq!(expr.to_string(), "cl / cd");
        assert_eq!(expr.ast().to_string(), "(cl / cd)");
    }
}
