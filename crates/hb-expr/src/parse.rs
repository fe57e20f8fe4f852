//! Source-text parser producing [`Expr`] trees.
//!
//! Supports arithmetic (+, -, *, /, **), comparisons (==, !=, <, <=, >, >=),
//! boolean operators (&&, ||, ! or the keywords and, or, not), and function
//! calls. Operators become calls
//! on the arithmetic kernels; any other `name(args)` becomes a call on the
//! kernel of that name, left for the evaluator to resolve.

use std::collections::BTreeMap;

use hb_core::{Error, Result};

use crate::expr::{Expr, kernel_name};

/// Parse `input`, expanding names defined in `defs`.
pub fn parse(input: &str, defs: &BTreeMap<String, String>) -> Result<Expr> {
    parse_expanding(input, defs, Vec::new())
}

fn parse_expanding(
    input: &str,
    defs: &BTreeMap<String, String>,
    expanding: Vec<String>,
) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, defs, expanding };
    let ast = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(Error::Expression(format!(
            "unexpected token after expression: {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(ast)
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Pow,
    Slash,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (at, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if let Some(&(_, next)) = chars.get(i + 1) {
            let tok = match (c, next) {
                ('*', '*') => Some(Token::Pow),
                ('&', '&') => Some(Token::And),
                ('|', '|') => Some(Token::Or),
                ('=', '=') => Some(Token::Eq),
                ('!', '=') => Some(Token::Ne),
                ('<', '=') => Some(Token::Le),
                ('>', '=') => Some(Token::Ge),
                _ => None,
            };
            if let Some(t) = tok {
                tokens.push(t);
                i += 2;
                continue;
            }
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '!' => Some(Token::Not),
            _ => None,
        };
        if let Some(t) = single {
            tokens.push(t);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() {
                let ch = chars[i].1;
                let exp_sign = (ch == '+' || ch == '-')
                    && i > start
                    && matches!(chars[i - 1].1, 'e' | 'E');
                if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exp_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let end = chars.get(i).map_or(input.len(), |&(p, _)| p);
            let s = &input[at..end];
            let n: f64 =
                s.parse().map_err(|_| Error::Expression(format!("invalid number: '{s}'")))?;
            tokens.push(Token::Num(n));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let end = chars.get(i).map_or(input.len(), |&(p, _)| p);
            tokens.push(match &input[chars[start].0..end] {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                word => Token::Ident(word.to_string()),
            });
        } else {
            return Err(Error::Expression(format!("unexpected character: '{c}'")));
        }
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    defs: &'a BTreeMap<String, String>,
    /// Definitions currently being expanded, outermost first.
    expanding: Vec<String>,
}

fn call(fcn: &str, args: Vec<Expr>) -> Expr {
    Expr::call(fcn, args)
}

/// Bare names under a logical operator are read as booleans.
fn predicate(e: Expr) -> Expr {
    match e {
        Expr::Name(n) => Expr::Predicate(n),
        other => other,
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => Err(Error::Expression(format!("expected {:?}, got {:?}", expected, other))),
        }
    }

    fn resolve_name(&self, name: String) -> Result<Expr> {
        let Some(source) = self.defs.get(&name) else {
            return Ok(Expr::Name(name));
        };
        if self.expanding.contains(&name) {
            let mut chain = self.expanding.clone();
            chain.push(name);
            return Err(Error::Expression(format!(
                "recursive definition: {}",
                chain.join(" -> ")
            )));
        }
        let mut chain = self.expanding.clone();
        chain.push(name);
        parse_expanding(source, self.defs, chain)
    }

    // ── Grammar rules ──────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = call("logical_or", vec![predicate(lhs), predicate(rhs)]);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = call("logical_and", vec![predicate(lhs), predicate(rhs)]);
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Some(Token::Eq) => "equal",
            Some(Token::Ne) => "not_equal",
            Some(Token::Lt) => "less",
            Some(Token::Le) => "less_equal",
            Some(Token::Gt) => "greater",
            Some(Token::Ge) => "greater_equal",
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(call(op, vec![lhs, rhs]))
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => "add",
                Some(Token::Minus) => "subtract",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = call(op, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => "multiply",
                Some(Token::Slash) => "divide",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = call(op, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                match self.parse_unary()? {
                    // fold literal negation so "-1" stays a constant
                    Expr::Const(crate::Literal::Number(v)) => Ok(Expr::number(-v.0)),
                    e => Ok(call("negative", vec![e])),
                }
            }
            Some(Token::Not) => {
                self.advance();
                let e = self.parse_unary()?;
                Ok(call("logical_not", vec![predicate(e)]))
            }
            _ => self.parse_pow(),
        }
    }

    // right-associative, binds tighter than a unary sign on its left
    fn parse_pow(&mut self) -> Result<Expr> {
        let base = self.parse_atom()?;
        if matches!(self.peek(), Some(Token::Pow)) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(call("power", vec![base, exponent]));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Expr::number(n)),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance(); // consume '('
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        args.push(self.parse_or()?);
                        while matches!(self.peek(), Some(Token::Comma)) {
                            self.advance();
                            args.push(self.parse_or()?);
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(call(kernel_name(&name), args))
                } else {
                    self.resolve_name(name)
                }
            }
            other => Err(Error::Expression(format!(
                "expected number, identifier, or '(', got {:?}",
                other
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
