//! Naming-pattern engine
//!
//! Parses `{[sep]Name[:modifier]}` patterns, resolves tokens against a
//! [`TokenContext`], and cleans up the separators empty tokens leave behind.

use once_cell::sync::Lazy;
use regex::Regex;

use mediarr_core::{ImportError, Result};

use crate::tokens::{is_known_token, resolve_token, TokenContext};

/// One parsed token: `{.Series Title:30}` has separator `.`, name
/// `Series Title`, modifier `30`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternToken {
    pub separator: Option<char>,
    pub name: String,
    pub modifier: Option<String>,
}

/// A pattern split into literal text and tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Token(PatternToken),
}

static TRAILING_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?: *[-._] *| +)$").unwrap());

static LEADING_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?: *[-._] *| +)").unwrap());

/// Parse a pattern into segments. Unbalanced braces are an error; token
/// names are not checked here (see [`validate_pattern`]).
pub fn parse_pattern(pattern: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for t in chars.by_ref() {
                    match t {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(ImportError::InvalidPattern {
                                message: "nested opening brace".to_string(),
                            })
                        }
                        other => inner.push(other),
                    }
                }
                if !closed {
                    return Err(ImportError::InvalidPattern {
                        message: "unmatched opening brace".to_string(),
                    });
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Token(parse_token(&inner)?));
            }
            '}' => {
                return Err(ImportError::InvalidPattern {
                    message: "unmatched closing brace".to_string(),
                })
            }
            other => text.push(other),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn parse_token(inner: &str) -> Result<PatternToken> {
    if inner.is_empty() {
        return Err(ImportError::InvalidPattern {
            message: "empty token".to_string(),
        });
    }

    let (separator, rest) = match inner.chars().next() {
        Some(c @ ('.' | '-' | '_')) => (Some(c), &inner[1..]),
        _ => (None, inner),
    };

    let (name, modifier) = match rest.split_once(':') {
        Some((name, modifier)) => (name, Some(modifier.to_string())),
        None => (rest, None),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ImportError::InvalidPattern {
            message: "token has no name".to_string(),
        });
    }

    Ok(PatternToken {
        separator,
        name: name.to_string(),
        modifier,
    })
}

/// Check a pattern for balanced braces and registered token names.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    for segment in parse_pattern(pattern)? {
        if let Segment::Token(token) = segment {
            if !is_known_token(&token.name) {
                return Err(ImportError::InvalidToken { token: token.name });
            }
        }
    }
    Ok(())
}

/// Resolve a pattern against a context.
///
/// Empty token values consume one adjacent separator (from the preceding
/// text when possible, otherwise from the following text); leftover
/// separator runs collapse to a single space and the ends are trimmed.
pub fn resolve_pattern(pattern: &str, ctx: &TokenContext) -> Result<String> {
    let segments = parse_pattern(pattern)?;

    let mut out = String::new();
    let mut skip_leading = false;

    for segment in segments {
        match segment {
            Segment::Text(text) => {
                let text = if skip_leading {
                    skip_leading = false;
                    LEADING_SEPARATOR.replace(&text, "").into_owned()
                } else {
                    text
                };
                out.push_str(&text);
            }
            Segment::Token(token) => {
                let mut value = resolve_token(&token.name, token.modifier.as_deref(), ctx)?;

                if value.is_empty() {
                    let trimmed = TRAILING_SEPARATOR.replace(&out, "").into_owned();
                    if trimmed.len() < out.len() {
                        out = trimmed;
                    } else {
                        skip_leading = true;
                    }
                    continue;
                }

                if let Some(sep) = token.separator {
                    value = value.replace(' ', &sep.to_string());
                }
                out.push_str(&value);
            }
        }
    }

    Ok(cleanup(&out))
}

/// Collapse separator runs left behind by empty tokens and trim the ends.
fn cleanup(resolved: &str) -> String {
    let mut out = resolved.to_string();
    loop {
        let before = out.clone();
        out = out.replace(" - - ", " ");
        out = out.replace("- -", " ");
        out = out.replace(" . . ", " ");
        while out.contains("  ") {
            out = out.replace("  ", " ");
        }
        if out == before {
            break;
        }
    }
    out.trim_matches(|c: char| matches!(c, '-' | '.' | '_' | ' '))
        .to_string()
}
