//! Integer expression evaluation for `#if` and `#elif`.
//!
//! Follows the C preprocessor rules closely enough for shader code: identifiers that are not
//! macros evaluate to `0`, object-like macros are expanded recursively, and `defined NAME` /
//! `defined(NAME)` test for a definition.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::directive::is_ident_char;

/// Maximum nesting of macro expansions inside an expression.
const MAX_EXPANSION_DEPTH: u32 = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected `{0}` in expression")]
    UnexpectedToken(String),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivideByZero,
    #[error("expansion of macro `{0}` is nested too deeply")]
    TooDeep(String),
}

/// Source of macro definitions for expression evaluation.
pub trait MacroLookup {
    /// The replacement text of a macro, or `None` if the macro is not defined.
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl MacroLookup for FxHashMap<String, String> {
    #[inline]
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

pub fn evaluate(expr: &str, macros: &impl MacroLookup) -> Result<i64, ExprError> {
    evaluate_nested(expr, macros, 0)
}

fn evaluate_nested(expr: &str, macros: &impl MacroLookup, depth: u32) -> Result<i64, ExprError> {
    let mut parser = Parser {
        tokens: tokenize(expr)?,
        pos: 0,
        macros,
        depth,
    };
    let value = parser.ternary()?;
    match parser.next() {
        None => Ok(value),
        Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(i64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Question,
    Colon,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Ident(name) => f.write_str(name),
            Token::Op(op) => f.write_str(op),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Question => f.write_str("?"),
            Token::Colon => f.write_str(":"),
        }
    }
}

const OPERATORS: [&str; 18] = [
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "&", "|",
    "^",
];

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::default();
    let mut rest = expr;

    loop {
        rest = rest.trim_start();
        let Some(c) = rest.chars().next() else {
            break;
        };

        if c.is_ascii_digit() {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            tokens.push(Token::Num(parse_number(&rest[..end])?));
            rest = &rest[end..];
            continue;
        }

        if is_ident_char(c) {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..end].to_owned()));
            rest = &rest[end..];
            continue;
        }

        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            '!' if !rest.starts_with("!=") => Some(Token::Op("!")),
            '~' => Some(Token::Op("~")),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(token);
            rest = &rest[1..];
            continue;
        }

        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(Token::Op(op));
                rest = &rest[op.len()..];
            }
            None => return Err(ExprError::UnexpectedToken(c.to_string())),
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<i64, ExprError> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<i64>()
    };

    parsed.map_err(|_| ExprError::InvalidNumber(text.to_owned()))
}

fn precedence(op: &str) -> Option<u8> {
    let prec = match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | "<=" | ">" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    };
    Some(prec)
}

struct Parser<'a, M> {
    tokens: Vec<Token>,
    pos: usize,
    macros: &'a M,
    depth: u32,
}

impl<M: MacroLookup> Parser<'_, M> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn ternary(&mut self) -> Result<i64, ExprError> {
        let cond = self.binary(1)?;
        if self.peek() != Some(&Token::Question) {
            return Ok(cond);
        }

        self.next();
        let if_true = self.ternary()?;
        self.expect(Token::Colon)?;
        let if_false = self.ternary()?;
        Ok(if cond != 0 { if_true } else { if_false })
    }

    fn binary(&mut self, min_prec: u8) -> Result<i64, ExprError> {
        let mut lhs = self.unary()?;

        loop {
            let (op, prec) = match self.peek() {
                Some(Token::Op(op)) => match precedence(op) {
                    Some(prec) if prec >= min_prec => (*op, prec),
                    _ => break,
                },
                _ => break,
            };

            self.next();
            let rhs = self.binary(prec + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, ExprError> {
        match self.next().ok_or(ExprError::UnexpectedEnd)? {
            Token::Num(n) => Ok(n),
            Token::Op("!") => Ok((self.unary()? == 0) as i64),
            Token::Op("~") => Ok(!self.unary()?),
            Token::Op("-") => Ok(self.unary()?.wrapping_neg()),
            Token::Op("+") => self.unary(),
            Token::LParen => {
                let value = self.ternary()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Token::Ident(name) if name == "defined" => self.defined(),
            Token::Ident(name) => self.expand(&name),
            token => Err(ExprError::UnexpectedToken(token.to_string())),
        }
    }

    fn defined(&mut self) -> Result<i64, ExprError> {
        let parens = self.peek() == Some(&Token::LParen);
        if parens {
            self.next();
        }

        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            Some(token) => return Err(ExprError::UnexpectedToken(token.to_string())),
            None => return Err(ExprError::UnexpectedEnd),
        };

        if parens {
            self.expect(Token::RParen)?;
        }

        Ok(self.macros.lookup(&name).is_some() as i64)
    }

    fn expand(&mut self, name: &str) -> Result<i64, ExprError> {
        let Some(body) = self.macros.lookup(name) else {
            return Ok(0);
        };

        if body.trim().is_empty() {
            return Ok(0);
        }

        if self.depth >= MAX_EXPANSION_DEPTH {
            return Err(ExprError::TooDeep(name.to_owned()));
        }

        evaluate_nested(body, self.macros, self.depth + 1)
    }
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Result<i64, ExprError> {
    let value = match op {
        "||" => (lhs != 0 || rhs != 0) as i64,
        "&&" => (lhs != 0 && rhs != 0) as i64,
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "<" => (lhs < rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">" => (lhs > rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" if rhs == 0 => return Err(ExprError::DivideByZero),
        "/" => lhs.wrapping_div(rhs),
        "%" if rhs == 0 => return Err(ExprError::DivideByZero),
        "%" => lhs.wrapping_rem(rhs),
        _ => return Err(ExprError::UnexpectedToken(op.to_owned())),
    };
    Ok(value)
}
