//! Tokenizer for function source.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Error, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    /// Identifiers and keywords alike; the parser tells them apart.
    Ident(String),
    Punct(&'static str),
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self, Self::Punct(p) if *p == punct)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Ident(name) if name == keyword)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Ident(name) => format!("'{name}'"),
            Self::Punct(p) => format!("'{p}'"),
        }
    }
}

// Longest first, so that `===` wins over `==` and `=`.
static PUNCTUATORS: [&str; 30] = [
    "===", "!==", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "(", ")", "[", "]", "{", "}",
    ",", ".", ";", ":", "?", "+", "-", "*", "/", "%", "!", "<", ">", "=",
];

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit()
            || (c == '.' && source[offset + 1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            tokens.push(Token::Number(read_number(source, &mut chars)?));
        } else if c == '"' || c == '\'' {
            chars.next();
            tokens.push(Token::Str(read_string(c, offset, &mut chars)?));
        } else if c == '_' || c == '$' || c.is_alphabetic() {
            let mut name = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c == '_' || c == '$' || c.is_alphanumeric() {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(name));
        } else if source[offset..].starts_with("//") {
            while let Some((_, c)) = chars.next() {
                if c == '\n' {
                    break;
                }
            }
        } else if source[offset..].starts_with("/*") {
            let end = source[offset + 2..].find("*/").ok_or_else(|| {
                Error::Compilation(format!("unterminated comment at offset {offset}"))
            })?;
            let resume = offset + 2 + end + 2;
            while chars.peek().is_some_and(|&(at, _)| at < resume) {
                chars.next();
            }
        } else {
            let punct = PUNCTUATORS
                .iter()
                .find(|p| source[offset..].starts_with(**p))
                .ok_or_else(|| {
                    Error::Compilation(format!("unexpected character '{c}' at offset {offset}"))
                })?;
            for _ in 0..punct.len() {
                chars.next();
            }
            tokens.push(Token::Punct(*punct));
        }
    }

    Ok(tokens)
}

fn read_number(source: &str, chars: &mut Peekable<CharIndices<'_>>) -> Result<f64> {
    let start = chars.peek().map_or(source.len(), |&(offset, _)| offset);
    let mut end = start;
    let mut previous = ' ';
    while let Some(&(offset, c)) = chars.peek() {
        let exponent_sign = (c == '+' || c == '-') && (previous == 'e' || previous == 'E');
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
            end = offset + c.len_utf8();
            previous = c;
            chars.next();
        } else {
            break;
        }
    }

    let literal = source[start..end].replace('_', "");
    let parsed = if let Some(hex) = literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok().map(|n| n as f64)
    } else {
        literal.parse::<f64>().ok()
    };
    parsed.ok_or_else(|| Error::Compilation(format!("invalid number literal '{literal}'")))
}

fn read_string(quote: char, start: usize, chars: &mut Peekable<CharIndices<'_>>) -> Result<String> {
    let mut value = String::new();
    loop {
        let Some((_, c)) = chars.next() else {
            return Err(Error::Compilation(format!(
                "unterminated string starting at offset {start}"
            )));
        };
        match c {
            c if c == quote => return Ok(value),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    continue;
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    'u' => {
                        let hex: String = (0..4).filter_map(|_| chars.next().map(|(_, h)| h)).collect();
                        let decoded = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                Error::Compilation(format!("invalid unicode escape '\\u{hex}'"))
                            })?;
                        value.push(decoded);
                    }
                    other => value.push(other),
                }
            }
            other => value.push(other),
        }
    }
}
