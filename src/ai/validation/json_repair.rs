//! JSON Repair
//!
//! Generated JSON is frequently almost valid. Repairs applied, in order:
//! - markdown code fences and BOM are stripped
//! - trailing commas before `]` / `}` are removed
//! - unterminated strings and unclosed brackets are closed
//! - as a last resort, the first balanced `{...}` / `[...]` is cut out of
//!   surrounding prose

use serde_json::Value;
use tracing::debug;

use crate::types::{ErrorCategory, LlmError, MarketError, Result};

/// Extract and parse JSON from a completion
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    JsonRepairer::new().parse_or_repair(content).map(|(value, _)| value)
}

/// Repair strategy applied before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    TrailingCommas,
    CloseOpen,
    ExtractEmbedded,
}

const REPAIRS: [Repair; 3] = [Repair::TrailingCommas, Repair::CloseOpen, Repair::ExtractEmbedded];

#[derive(Debug, Default)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse JSON, repairing if the first parse fails.
    ///
    /// Returns (value, was_repaired).
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, bool)> {
        let mut candidate = preprocess(raw);
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Ok((value, false));
        }

        // Repairs are cumulative: each builds on the previous candidate
        for repair in REPAIRS {
            let next = match repair {
                Repair::TrailingCommas => Some(strip_trailing_commas(&candidate)),
                Repair::CloseOpen => Some(close_open_structures(&candidate)),
                Repair::ExtractEmbedded => extract_embedded(&candidate),
            };
            let Some(next) = next else { continue };
            if let Ok(value) = serde_json::from_str::<Value>(&next) {
                debug!(?repair, "JSON repaired");
                return Ok((value, true));
            }
            if repair != Repair::ExtractEmbedded {
                candidate = next;
            }
        }

        // Prose around a truncated object: extract from the original, then close it
        if let Some(embedded) = extract_embedded(&preprocess(raw)).or_else(|| {
            let cleaned = preprocess(raw);
            cleaned.find(['{', '[']).map(|start| cleaned[start..].to_string())
        }) {
            let closed = close_open_structures(&strip_trailing_commas(&embedded));
            if let Ok(value) = serde_json::from_str::<Value>(&closed) {
                debug!("JSON extracted and closed");
                return Ok((value, true));
            }
        }

        Err(MarketError::Llm(LlmError::new(
            ErrorCategory::ParseError,
            format!(
                "Unparseable JSON. Content preview: {}...",
                raw.chars().take(200).collect::<String>()
            ),
        )))
    }
}

fn preprocess(raw: &str) -> String {
    let mut s = raw.trim().trim_start_matches('\u{feff}').trim();
    if s.starts_with("```") {
        s = match s.find('\n') {
            Some(newline) => &s[newline + 1..],
            None => s.trim_start_matches('`'),
        };
    }
    s.trim_end().trim_end_matches("```").trim().to_string()
}

/// Tracks whether a position is inside a string literal
#[derive(Default)]
struct Lexer {
    in_string: bool,
    escaped: bool,
}

impl Lexer {
    /// Feed one char; returns true when the char is structural (outside strings)
    fn structural(&mut self, ch: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match ch {
            '\\' if self.in_string => {
                self.escaped = true;
                false
            }
            '"' => {
                self.in_string = !self.in_string;
                false
            }
            _ => !self.in_string,
        }
    }
}

fn strip_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut lexer = Lexer::default();
    let mut out = String::with_capacity(s.len());

    for (i, &ch) in chars.iter().enumerate() {
        if lexer.structural(ch) && ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn close_open_structures(s: &str) -> String {
    let mut lexer = Lexer::default();
    let mut stack = Vec::new();
    let mut out = String::with_capacity(s.len() + 8);

    for ch in s.chars() {
        // A raw newline inside a string means the string was cut off
        if lexer.in_string && !lexer.escaped && (ch == '\n' || ch == '\r') {
            out.push('"');
            lexer.in_string = false;
        }
        if lexer.structural(ch) {
            match ch {
                '{' => stack.push('}'),
                '[' => stack.push(']'),
                '}' | ']' => {
                    stack.pop();
                }
                _ => {}
            }
        }
        out.push(ch);
    }

    if lexer.in_string {
        out.push('"');
    }
    let trimmed = out.trim_end();
    let mut out = trimmed.strip_suffix(',').unwrap_or(trimmed).to_string();
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Cut the first balanced object or array out of mixed content
fn extract_embedded(s: &str) -> Option<String> {
    let start = s.find(['{', '['])?;
    let mut lexer = Lexer::default();
    let mut depth = 0i32;

    for (offset, ch) in s[start..].char_indices() {
        if !lexer.structural(ch) {
            continue;
        }
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(s[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let (_, repaired) = JsonRepairer::new()
            .parse_or_repair(r#"{"name": "FocusFlow"}"#)
            .unwrap();
        assert!(!repaired);
    }

    #[test]
    fn test_strip_code_fences() {
        let input = "```json\n{\"name\": \"FocusFlow\"}\n```";
        let value = extract_json_from_response(input).unwrap();
        assert_eq!(value["name"], "FocusFlow");
    }

    #[test]
    fn test_fix_trailing_comma() {
        let input = r#"{"personas": [{"name": "Ana"},]}"#;
        let (value, repaired) = JsonRepairer::new().parse_or_repair(input).unwrap();
        assert!(repaired);
        assert!(value["personas"].is_array());
    }

    #[test]
    fn test_comma_inside_string_preserved() {
        let input = r#"{"concerns": ["price,]"],}"#;
        let value = extract_json_from_response(input).unwrap();
        assert_eq!(value["concerns"][0], "price,]");
    }

    #[test]
    fn test_close_truncated_payload() {
        let input = r#"{"personas": [{"name": "Ana", "age": 31}"#;
        let value = extract_json_from_response(input).unwrap();
        assert_eq!(value["personas"][0]["age"], 31);
    }

    #[test]
    fn test_extract_from_prose() {
        let input = "Here are the personas:\n[{\"name\": \"Ana\"}]\nLet me know!";
        let value = extract_json_from_response(input).unwrap();
        assert_eq!(value[0]["name"], "Ana");
    }

    #[test]
    fn test_unrecoverable_is_parse_error() {
        let err = extract_json_from_response("no json here").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ParseError);
        assert!(err.is_retryable());
    }
}
