//! Flat string encodings for parameter overrides and tags.
//!
//! samconfig stores both as a space-joined list of `"Key"="Value"` pairs.
//! Decoding uses POSIX shell word rules: whitespace separates words, single
//! quotes are literal, double quotes allow `\"` and `\\`, and a bare
//! backslash escapes the next character.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::tags::{Tag, TagSet};

/// One shell word and the position of its first unquoted `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    /// Byte offset into `text`
    pub separator: Option<usize>,
}

impl Word {
    /// Split at the first unquoted `=`.
    pub fn pair(&self) -> Option<(&str, &str)> {
        self.separator.map(|at| (&self.text[..at], &self.text[at + 1..]))
    }
}

/// Split a string into shell words, remembering where each word's first
/// unquoted `=` falls.
pub fn split_words(input: &str) -> std::result::Result<Vec<Word>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut separator = None;
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(Word {
                        text: std::mem::take(&mut current),
                        separator: separator.take(),
                    });
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some('\n') => {}
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some('\n') => {}
                    Some(ch) => current.push(ch),
                    None => return Err("trailing escape character".to_string()),
                }
            }
            c => {
                in_word = true;
                if c == '=' && separator.is_none() {
                    separator = Some(current.len());
                }
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(Word {
            text: current,
            separator,
        });
    }
    Ok(words)
}

/// Quote a key or value for the `"Key"="Value"` encoding.
pub fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn encode_pair(key: &str, value: &str) -> String {
    format!("{}={}", quote(key), quote(value))
}

/// Encode parameter overrides as `"Key"="Value"` pairs.
pub fn stringify_overrides(overrides: &BTreeMap<String, String>) -> String {
    overrides
        .iter()
        .map(|(k, v)| encode_pair(k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a parameter-override string. Words without an unquoted `=` are
/// skipped.
pub fn parse_overrides(input: &str) -> Result<BTreeMap<String, String>> {
    let words = split_words(input)
        .map_err(|reason| ConfigError::malformed("parameter_overrides", reason))?;

    let mut overrides = BTreeMap::new();
    for word in words {
        match word.pair() {
            Some((key, value)) => {
                overrides.insert(key.to_string(), value.to_string());
            }
            None => warn!("Skipping invalid parameter format: {}", word.text),
        }
    }
    Ok(overrides)
}

/// Encode a tag set as `"Key"="Value"` pairs in insertion order.
pub fn stringify_tags(tags: &TagSet) -> String {
    tags.iter()
        .map(|t| encode_pair(&t.key, &t.value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a tag string. Words without `=` or with an empty key are skipped.
pub fn parse_tags(input: &str) -> Result<TagSet> {
    let words = split_words(input).map_err(|reason| ConfigError::malformed("tags", reason))?;

    let mut tags = TagSet::new();
    for word in words {
        let Some((key, value)) = word.pair() else {
            warn!("Skipping tag without key=value form: {}", word.text);
            continue;
        };
        if key.is_empty() {
            warn!("Skipping tag with empty key: {}", word.text);
            continue;
        }
        tags.insert(Tag::new(key, value));
    }
    Ok(tags)
}
