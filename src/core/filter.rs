//! Filter expressions for generator-mode item selection
//!
//! A filter is a single comparison between arithmetic expressions over the
//! bound variable `x` (the candidate item): `x > 5`, `x % 2 == 0`,
//! `x == "done"`. The grammar is deliberately small: no arbitrary code runs
//! during evaluation, and parse errors surface when the pipeline is
//! compiled rather than mid-run.

use crate::core::data::Data;
use crate::core::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Gt => ord == Greater,
            Comparison::Lt => ord == Less,
            Comparison::Ge => ord != Less,
            Comparison::Le => ord != Greater,
            Comparison::Eq => ord == Equal,
            Comparison::Ne => ord != Equal,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            ArithOp::Add => lhs + rhs,
            ArithOp::Sub => lhs - rhs,
            ArithOp::Mul => lhs * rhs,
            ArithOp::Div => lhs / rhs,
            ArithOp::Rem => lhs % rhs,
        }
    }
}

/// Arithmetic over the bound variable and numeric literals
#[derive(Debug, Clone)]
enum Expr {
    Item,
    Number(f64),
    Neg(Box<Expr>),
    Binary(ArithOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Item => x,
            Expr::Number(n) => *n,
            Expr::Neg(inner) => -inner.eval(x),
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(x), rhs.eval(x)),
        }
    }

    fn mentions_item(&self) -> bool {
        match self {
            Expr::Item => true,
            Expr::Number(_) => false,
            Expr::Neg(inner) => inner.mentions_item(),
            Expr::Binary(_, lhs, rhs) => lhs.mentions_item() || rhs.mentions_item(),
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Numeric {
        lhs: Expr,
        op: Comparison,
        rhs: Expr,
    },
    Text {
        op: Comparison,
        rhs: String,
    },
}

/// A compiled filter expression, parsed once when the step is built.
#[derive(Debug, Clone)]
pub struct Filter {
    raw: String,
    predicate: Predicate,
}

impl Filter {
    /// Parse an expression like `x > 5`, `x % 2 == 0` or `x == "done"`.
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let fail = |message: String| EngineError::Expression {
            expr: expr.to_string(),
            message,
        };

        let tokens = tokenize(expr).map_err(fail)?;
        if tokens.is_empty() {
            return Err(fail("empty filter expression".to_string()));
        }

        // String comparisons take the form `x <op> "literal"`, nothing more
        if let [Token::Item, Token::Cmp(op), Token::Text(text)] = tokens.as_slice() {
            return Ok(Filter {
                raw: expr.to_string(),
                predicate: Predicate::Text {
                    op: *op,
                    rhs: text.clone(),
                },
            });
        }
        if tokens.iter().any(|t| matches!(t, Token::Text(_))) {
            return Err(fail(
                "string literals can only be compared directly against x".to_string(),
            ));
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
        };
        let lhs = parser.sum().map_err(fail)?;
        let op = match parser.bump() {
            Some(Token::Cmp(op)) => op,
            _ => {
                return Err(fail(
                    "expected a comparison operator (>, <, >=, <=, ==, !=)".to_string(),
                ))
            }
        };
        let rhs = parser.sum().map_err(fail)?;
        if !parser.at_end() {
            return Err(fail("trailing input after the comparison".to_string()));
        }
        if !lhs.mentions_item() && !rhs.mentions_item() {
            return Err(fail(
                "filter must reference the item variable 'x'".to_string(),
            ));
        }

        Ok(Filter {
            raw: expr.to_string(),
            predicate: Predicate::Numeric { lhs, op, rhs },
        })
    }

    /// The source text the filter was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Evaluate the filter against a candidate item.
    ///
    /// Comparing an item whose type does not match the expression (for
    /// example a mapping against a numeric filter) is an expression error,
    /// not `false`.
    pub fn evaluate(&self, item: &Data) -> Result<bool, EngineError> {
        match &self.predicate {
            Predicate::Text { op, rhs } => match item {
                Data::Text(s) => Ok(op.holds(s.as_str().cmp(rhs.as_str()))),
                other => Err(self.mismatch(other, "string")),
            },
            Predicate::Numeric { lhs, op, rhs } => {
                let x = match item {
                    Data::Number(n) => n.as_f64().ok_or_else(|| self.mismatch(item, "numeric"))?,
                    other => return Err(self.mismatch(other, "numeric")),
                };
                let (l, r) = (lhs.eval(x), rhs.eval(x));
                let ord = l.partial_cmp(&r).ok_or_else(|| EngineError::Expression {
                    expr: self.raw.clone(),
                    message: "comparison is undefined (non-finite value)".to_string(),
                })?;
                Ok(op.holds(ord))
            }
        }
    }

    fn mismatch(&self, item: &Data, expected: &str) -> EngineError {
        EngineError::Expression {
            expr: self.raw.clone(),
            message: format!(
                "cannot compare {} item with a {} filter",
                item.type_name(),
                expected
            ),
        }
    }
}

#[derive(Debug, Clone)]
enum Token {
    Item,
    Number(f64),
    Text(String),
    Cmp(Comparison),
    Arith(ArithOp),
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Arith(ArithOp::Add));
            }
            '-' => {
                chars.next();
                tokens.push(Token::Arith(ArithOp::Sub));
            }
            '*' => {
                chars.next();
                tokens.push(Token::Arith(ArithOp::Mul));
            }
            '/' => {
                chars.next();
                tokens.push(Token::Arith(ArithOp::Div));
            }
            '%' => {
                chars.next();
                tokens.push(Token::Arith(ArithOp::Rem));
            }
            '>' | '<' => {
                chars.next();
                let cmp = if chars.peek() == Some(&'=') {
                    chars.next();
                    if c == '>' {
                        Comparison::Ge
                    } else {
                        Comparison::Le
                    }
                } else if c == '>' {
                    Comparison::Gt
                } else {
                    Comparison::Lt
                };
                tokens.push(Token::Cmp(cmp));
            }
            '=' | '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(format!("'{}' must be followed by '='", c));
                }
                tokens.push(Token::Cmp(if c == '=' {
                    Comparison::Eq
                } else {
                    Comparison::Ne
                }));
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some(ch) => text.push(ch),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut number = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        number.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = number
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", number))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name != "x" {
                    return Err(format!(
                        "unknown identifier '{}' (the item variable is 'x')",
                        name
                    ));
                }
                tokens.push(Token::Item);
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(&Token::Arith(op)) = self.peek() {
            if !matches!(op, ArithOp::Add | ArithOp::Sub) {
                break;
            }
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.factor()?;
        while let Some(&Token::Arith(op)) = self.peek() {
            if !matches!(op, ArithOp::Mul | ArithOp::Div | ArithOp::Rem) {
                break;
            }
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Some(Token::Item) => Ok(Expr::Item),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Arith(ArithOp::Sub)) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::Open) => {
                let inner = self.sum()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(Token::Cmp(_)) => Err("unexpected comparison operator".to_string()),
            Some(Token::Arith(_)) => Err("unexpected arithmetic operator".to_string()),
            Some(Token::Close) => Err("unexpected ')'".to_string()),
            Some(Token::Text(_)) => {
                Err("string literals can only be compared directly against x".to_string())
            }
            None => Err("expression ended unexpectedly".to_string()),
        }
    }
}
