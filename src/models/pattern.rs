// src/models/pattern.rs
//
// OSC address patterns, compiled once into anchored regexes.
//
//   ?          any single character except '/'
//   *          any run of characters not containing '/'
//   [a-z] [!0-9]  character classes
//   {foo,bar}  alternatives
//   //         any number of intermediate path levels

use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Pattern that accepts every address, at any depth.
pub const ACCEPT_ALL: &str = "//*";

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Literal,
    Compiled(Regex),
}

#[derive(Debug, Clone)]
pub struct AddressPattern {
    source: String,
    matcher: Matcher,
}

impl AddressPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(invalid(pattern, "must start with '/'"));
        }

        let matcher = if pattern == ACCEPT_ALL {
            Matcher::Any
        } else if !pattern.contains(['?', '*', '[', ']', '{', '}']) && !pattern.contains("//") {
            Matcher::Literal
        } else {
            let translated = translate(pattern)?;
            let regex = Regex::new(&translated).map_err(|e| invalid(pattern, &e.to_string()))?;
            Matcher::Compiled(regex)
        };

        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    pub fn any() -> Self {
        Self {
            source: ACCEPT_ALL.to_string(),
            matcher: Matcher::Any,
        }
    }

    pub fn matches(&self, address: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Literal => self.source == address,
            Matcher::Compiled(regex) => regex.is_match(address),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for AddressPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(pattern: &str, reason: &str) -> Error {
    Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

fn translate(pattern: &str) -> Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while chars.get(i + 1) == Some(&'/') {
                    i += 1;
                }
                out.push_str("/(?:[^/]+/)*");
            }
            '?' => out.push_str("[^/]"),
            '*' => {
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push_str("[^/]*");
            }
            '[' => {
                let end = find_closing(&chars, i, ']')
                    .ok_or_else(|| invalid(pattern, "unterminated '['"))?;
                out.push_str(&translate_class(pattern, &chars[i + 1..end])?);
                i = end;
            }
            '{' => {
                let end = find_closing(&chars, i, '}')
                    .ok_or_else(|| invalid(pattern, "unterminated '{'"))?;
                let body: String = chars[i + 1..end].iter().collect();
                let alternatives: Vec<String> = body.split(',').map(regex::escape).collect();
                out.push_str("(?:");
                out.push_str(&alternatives.join("|"));
                out.push(')');
                i = end;
            }
            ']' | '}' => return Err(invalid(pattern, "unbalanced closing bracket")),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    out.push('$');
    Ok(out)
}

fn find_closing(chars: &[char], open: usize, close: char) -> Option<usize> {
    chars[open + 1..]
        .iter()
        .position(|&c| c == close || c == '/')
        .map(|offset| open + 1 + offset)
        .filter(|&end| chars[end] == close)
}

fn translate_class(pattern: &str, body: &[char]) -> Result<String> {
    let (negated, body) = match body.first() {
        Some('!') => (true, &body[1..]),
        _ => (false, body),
    };
    if body.is_empty() {
        return Err(invalid(pattern, "empty character class"));
    }

    let mut class = String::from(if negated { "[^/" } else { "[" });
    let mut j = 0;
    while j < body.len() {
        push_class_char(&mut class, body[j]);
        if body.get(j + 1) == Some(&'-') && j + 2 < body.len() {
            class.push('-');
            push_class_char(&mut class, body[j + 2]);
            j += 3;
        } else {
            j += 1;
        }
    }
    class.push(']');
    Ok(class)
}

fn push_class_char(class: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '[' | '^' | '-' | '&' | '~') {
        class.push('\\');
    }
    class.push(c);
}
