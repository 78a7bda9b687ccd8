//! Parsing of the batched section response.
//!
//! JSON is tried first. When the model ignores the JSON instruction the text is
//! split on markdown headers instead, and the result is tagged as unstructured
//! so callers can surface a lower-confidence flag.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::llm_client::strip_json_fences;

/// Header patterns in priority order; the first with at least one match wins.
static HEADER_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?m)^[ \t]*##[ \t]+(.+?)[ \t]*#*[ \t]*$").expect("valid regex"),
        Regex::new(r"(?m)^[ \t]*#[ \t]+(.+?)[ \t]*#*[ \t]*$").expect("valid regex"),
        Regex::new(r"(?m)^[ \t]*\*\*([^*\n]+?)\*\*[ \t]*:?[ \t]*$").expect("valid regex"),
        Regex::new(r"(?m)^[ \t]*([A-Z][^:\n]{0,80}?):[ \t]*$").expect("valid regex"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseConfidence {
    Structured,
    BestEffort,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// Parsed from a JSON object.
    Structured(IndexMap<String, String>),
    /// Recovered from markdown headers.
    Unstructured(IndexMap<String, String>),
}

impl ParseResult {
    pub fn confidence(&self) -> ParseConfidence {
        match self {
            ParseResult::Structured(_) => ParseConfidence::Structured,
            ParseResult::Unstructured(_) => ParseConfidence::BestEffort,
        }
    }

    pub fn sections(&self) -> &IndexMap<String, String> {
        match self {
            ParseResult::Structured(map) | ParseResult::Unstructured(map) => map,
        }
    }

    /// Finds a section by name, ignoring case and punctuation.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let sections = self.sections();
        if let Some(value) = sections.get(name) {
            return Some(value);
        }
        let wanted = fold(name);
        sections
            .iter()
            .find(|(key, _)| fold(key) == wanted)
            .map(|(_, value)| value.as_str())
    }
}

pub fn parse_sections(raw: &str) -> ParseResult {
    match parse_json(raw) {
        Some(map) => ParseResult::Structured(map),
        None => ParseResult::Unstructured(parse_markdown(raw)),
    }
}

fn parse_json(raw: &str) -> Option<IndexMap<String, String>> {
    let text = strip_json_fences(raw);
    let object = serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            (start < end)
                .then(|| serde_json::from_str::<Value>(&text[start..=end]).ok())
                .flatten()
        })?;

    let Value::Object(fields) = object else {
        return None;
    };

    Some(
        fields
            .into_iter()
            .map(|(key, value)| (key, value_to_text(&value)))
            .collect(),
    )
}

/// Flattens non-string JSON values into readable text.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", value_to_text(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| format!("{k}: {}", value_to_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn parse_markdown(raw: &str) -> IndexMap<String, String> {
    for pattern in HEADER_PATTERNS.iter() {
        let headers: Vec<_> = pattern.captures_iter(raw).collect();
        if headers.is_empty() {
            continue;
        }

        let mut sections = IndexMap::new();
        for (i, caps) in headers.iter().enumerate() {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let body_end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(raw.len());
            let name = clean_header(name.as_str());
            let body = raw[whole.end()..body_end].trim().to_string();
            if !name.is_empty() {
                sections.entry(name).or_insert(body);
            }
        }
        return sections;
    }
    IndexMap::new()
}

fn clean_header(name: &str) -> String {
    name.trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response_is_structured() {
        let result = parse_sections(r#"{"Executive Summary": "We deliver.", "Budget": "| a | b |"}"#);
        assert_eq!(result.confidence(), ParseConfidence::Structured);
        assert_eq!(result.lookup("Executive Summary"), Some("We deliver."));
    }

    #[test]
    fn test_fenced_json_with_preamble_is_structured() {
        let raw = "Here you go:\n```json\n{\"Approach\": \"Agile\"}\n```";
        let result = parse_sections(raw);
        assert_eq!(result.confidence(), ParseConfidence::Structured);
        assert_eq!(result.lookup("approach"), Some("Agile"));
    }

    #[test]
    fn test_json_arrays_and_objects_flattened() {
        let result = parse_sections(r#"{"Scope": ["Design", "Build"], "Title": {"Name": "Jo"}}"#);
        assert_eq!(result.lookup("Scope"), Some("- Design\n- Build"));
        assert_eq!(result.lookup("Title"), Some("Name: Jo"));
    }

    #[test]
    fn test_double_hash_headers_take_priority() {
        let raw = "# Proposal\n## Executive Summary\nWe are great.\n## Budget Estimate\n| x | y |\n";
        let result = parse_sections(raw);
        assert_eq!(result.confidence(), ParseConfidence::BestEffort);
        let keys: Vec<_> = result.sections().keys().cloned().collect();
        assert_eq!(keys, vec!["Executive Summary", "Budget Estimate"]);
        assert_eq!(result.lookup("Executive Summary"), Some("We are great."));
    }

    #[test]
    fn test_single_hash_headers_used_when_no_double_hash() {
        let raw = "# Approach\nPhased.\n# Timeline\nSix months.";
        let result = parse_sections(raw);
        assert_eq!(result.lookup("Approach"), Some("Phased."));
        assert_eq!(result.lookup("Timeline"), Some("Six months."));
    }

    #[test]
    fn test_bold_headers() {
        let raw = "**Approach:**\nPhased delivery.\n**Staffing Plan**\nTwo engineers.";
        let result = parse_sections(raw);
        assert_eq!(result.lookup("Approach"), Some("Phased delivery."));
        assert_eq!(result.lookup("staffing plan"), Some("Two engineers."));
    }

    #[test]
    fn test_colon_title_headers() {
        let raw = "Approach:\nPhased delivery.\nTimeline:\nSix months.";
        let result = parse_sections(raw);
        assert_eq!(result.lookup("Approach"), Some("Phased delivery."));
        assert_eq!(result.lookup("Timeline"), Some("Six months."));
    }

    #[test]
    fn test_unparseable_text_yields_empty_unstructured() {
        let result = parse_sections("just some prose without any headers");
        assert_eq!(result.confidence(), ParseConfidence::BestEffort);
        assert!(result.sections().is_empty());
    }

    #[test]
    fn test_lookup_ignores_punctuation() {
        let result = parse_sections(r#"{"Budget & Cost Proposal": "x"}"#);
        assert_eq!(result.lookup("budget cost proposal"), Some("x"));
    }
}
