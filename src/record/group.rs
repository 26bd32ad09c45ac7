//! Group file parsing
//!
//! A group file lists many records, each introduced by a `FILE-NODE: <id>`
//! line followed by a YAML mapping of its properties:
//!
//! ```text
//! FILE-NODE: buscard-plumber_20231015
//! filepath: "C:\\Users\\x\\busCard-plumber-2023_1015.pdf"
//! company: Drip Fixers
//! ```
//!
//! Bodies that are not valid YAML fall back to a line-oriented `key: value`
//! reading.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

/// One record block from a group file
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub identifier: String,
    pub properties: Map<String, Value>,
}

fn block_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^FILE-NODE:[ \t]*").expect("valid marker pattern"))
}

/// Split a group file into entries. Text before the first marker is ignored.
pub fn parse_group_file(text: &str) -> Vec<GroupEntry> {
    block_marker()
        .split(text)
        .skip(1)
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<GroupEntry> {
    let (head, body) = match block.split_once('\n') {
        Some((head, body)) => (head, body),
        None => (block, ""),
    };
    let identifier = head.trim().to_string();
    if identifier.is_empty() {
        return None;
    }

    let properties = match parse_yaml_body(body) {
        Some(map) => map,
        None => {
            debug!(identifier = %identifier, "group block is not YAML, using line parser");
            parse_lines(body)
        }
    };
    Some(GroupEntry {
        identifier,
        properties,
    })
}

/// `Some` for an empty body or a YAML mapping; `None` when the body needs
/// the line parser.
fn parse_yaml_body(body: &str) -> Option<Map<String, Value>> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(body).ok()?;
    match serde_json::to_value(yaml).ok()? {
        Value::Object(map) => Some(map),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_lines(body: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for line in body.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = unquote(value.trim());
        let parsed = if value.starts_with('[') && value.ends_with(']') {
            let items = value[1..value.len() - 1]
                .split(',')
                .map(|item| unquote(item.trim()).to_string())
                .filter(|item| !item.is_empty())
                .map(Value::String)
                .collect();
            Value::Array(items)
        } else {
            Value::String(value.to_string())
        };
        map.insert(key.to_string(), parsed);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_yaml_blocks() {
        let text = "\
# exported 2026-01-31
FILE-NODE: card_20231015
filepath: /cards/busCard-plumber-2023_1015.pdf
company: Drip Fixers
tags: [plumbing, emergency]

FILE-NODE: card_20240101
company: Sparks Ltd
";
        let entries = parse_group_file(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identifier, "card_20231015");
        assert_eq!(entries[0].properties["company"], json!("Drip Fixers"));
        assert_eq!(entries[0].properties["tags"], json!(["plumbing", "emergency"]));
        assert_eq!(entries[1].identifier, "card_20240101");
    }

    #[test]
    fn falls_back_to_line_parser() {
        let text = "FILE-NODE: odd_1\ncompany: \"Acme: Tools\"\nnote: [a, 'b'\n  : broken\n";
        let entries = parse_group_file(text);
        assert_eq!(entries.len(), 1);
        let props = &entries[0].properties;
        assert_eq!(props["company"], json!("Acme: Tools"));
        assert_eq!(props["note"], json!("[a, 'b'"));
    }

    #[test]
    fn line_parser_reads_inline_lists() {
        let props = parse_lines("phones: ['555-0100', \"555-0199\"]\nempty: []\nbare line\n");
        assert_eq!(props["phones"], json!(["555-0100", "555-0199"]));
        assert_eq!(props["empty"], json!([]));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn id_only_block_has_no_properties() {
        let entries = parse_group_file("FILE-NODE: lonely_20260101");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].properties.is_empty());
    }
}
