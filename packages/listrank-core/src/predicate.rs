//! Parser for string-form scope templates.
//!
//! A template is a conjunction of equality clauses:
//!
//! ```text
//! template := clause ( "AND" clause )*
//! clause   := column "=" operand
//! operand  := "#{" attribute "}" | integer | 'text' | TRUE | FALSE
//! ```
//!
//! `#{attribute}` is replaced by the item's current value of `attribute` when the scope
//! condition is built. Anything outside this grammar is rejected at configuration time.

use crate::error::{Error, Result};
use crate::ids::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    Attribute(String),
    Literal(Value),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clause {
    pub column: String,
    pub operand: Operand,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredicateTemplate {
    clauses: Vec<Clause>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    Interpolation(String),
    Int(i64),
    Text(String),
    Eq,
}

fn invalid(template: &str, reason: impl AsRef<str>) -> Error {
    Error::Configuration(format!(
        "invalid scope template {template:?}: {}",
        reason.as_ref()
    ))
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(template: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = template.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '=' {
            tokens.push(Token::Eq);
            i += 1;
        } else if c == '#' {
            if chars.get(i + 1) != Some(&'{') {
                return Err(invalid(template, "expected '{' after '#'"));
            }
            let start = i + 2;
            let end = chars[start..]
                .iter()
                .position(|&c| c == '}')
                .map(|off| start + off)
                .ok_or_else(|| invalid(template, "unterminated interpolation"))?;
            let name: String = chars[start..end].iter().collect::<String>().trim().to_string();
            if !is_identifier(&name) {
                return Err(invalid(template, format!("{name:?} is not an attribute name")));
            }
            tokens.push(Token::Interpolation(name));
            i = end + 1;
        } else if c == '\'' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(invalid(template, "unterminated string literal")),
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        text.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(&other) => {
                        text.push(other);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Text(text));
        } else if c.is_ascii_digit() || c == '-' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let n = literal
                .parse::<i64>()
                .map_err(|_| invalid(template, format!("bad integer literal {literal:?}")))?;
            tokens.push(Token::Int(n));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            return Err(invalid(template, format!("unexpected character {c:?}")));
        }
    }
    Ok(tokens)
}

impl PredicateTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let tokens = tokenize(template)?;
        let mut iter = tokens.into_iter().peekable();
        let mut clauses = Vec::new();

        loop {
            let column = match iter.next() {
                Some(Token::Ident(name)) => name,
                Some(other) => return Err(invalid(template, format!("expected column, got {other:?}"))),
                None => return Err(invalid(template, "expected a clause")),
            };
            if iter.next() != Some(Token::Eq) {
                return Err(invalid(template, format!("expected '=' after {column}")));
            }
            let operand = match iter.next() {
                Some(Token::Interpolation(attr)) => Operand::Attribute(attr),
                Some(Token::Int(n)) => Operand::Literal(Value::Int(n)),
                Some(Token::Text(s)) => Operand::Literal(Value::Text(s)),
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("true") => {
                    Operand::Literal(Value::Bool(true))
                }
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("false") => {
                    Operand::Literal(Value::Bool(false))
                }
                Some(other) => {
                    return Err(invalid(template, format!("unsupported operand {other:?}")))
                }
                None => return Err(invalid(template, format!("missing value for {column}"))),
            };
            clauses.push(Clause { column, operand });

            match iter.next() {
                None => break,
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("and") => continue,
                Some(other) => {
                    return Err(invalid(template, format!("expected AND, got {other:?}")))
                }
            }
        }

        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Attributes whose current values feed the condition.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().filter_map(|c| match &c.operand {
            Operand::Attribute(a) => Some(a.as_str()),
            Operand::Literal(_) => None,
        })
    }
}
