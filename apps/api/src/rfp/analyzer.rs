//! RFP Analyzer — turns raw RFP text into structured fields.
//!
//! Regex heuristics always run and always produce a result. An optional model
//! pass then supersedes individual fields; its loose JSON is coerced field by
//! field so a malformed answer can never leave a field in the wrong shape.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::llm_client::prompts::JSON_ONLY_RULES;
use crate::llm_client::{strip_json_fences, TextGenerator};
use crate::models::rfp::RfpRow;
use crate::proposal::ordering::DEFAULT_SECTION_TITLES;
use crate::rfp::deadlines::DATE_PATTERN;
use crate::rfp::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};
use crate::rfp::NOT_MENTIONED;

const MAX_LIST_ITEMS: usize = 15;
const MAX_PROMPT_CHARS: usize = 40_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpFields {
    pub title: String,
    pub client_name: String,
    pub submission_deadline: String,
    pub questions_deadline: String,
    pub pre_bid_meeting: String,
    pub award_date: String,
    pub budget_range: String,
    pub key_requirements: Vec<String>,
    pub deliverables: Vec<String>,
    pub evaluation_criteria: Vec<String>,
    pub contact_information: String,
    pub section_titles: Vec<String>,
}

impl From<&RfpRow> for RfpFields {
    fn from(row: &RfpRow) -> Self {
        Self {
            title: row.title.clone(),
            client_name: row.client_name.clone(),
            submission_deadline: row.submission_deadline.clone(),
            questions_deadline: row.questions_deadline.clone(),
            pre_bid_meeting: row.pre_bid_meeting.clone(),
            award_date: row.award_date.clone(),
            budget_range: row.budget_range.clone(),
            key_requirements: row.key_requirements.clone(),
            deliverables: row.deliverables.clone(),
            evaluation_criteria: row.evaluation_criteria.clone(),
            contact_information: row.contact_information.clone(),
            section_titles: row.section_titles.clone(),
        }
    }
}

impl RfpFields {
    pub fn deadlines(&self) -> [&str; 4] {
        [
            &self.submission_deadline,
            &self.questions_deadline,
            &self.pre_bid_meeting,
            &self.award_date,
        ]
    }
}

/// Runs heuristics, then the model pass when `llm` is given.
/// Model failures are logged and the heuristic result is returned.
pub async fn analyze(llm: Option<&dyn TextGenerator>, text: &str, source_label: &str) -> RfpFields {
    let mut fields = extract_heuristics(text);
    let Some(llm) = llm else {
        return fields;
    };

    let excerpt: String = text.chars().take(MAX_PROMPT_CHARS).collect();
    let prompt = ANALYSIS_PROMPT_TEMPLATE
        .replace("{source_label}", source_label)
        .replace("{rfp_text}", &excerpt);
    let system = format!("{ANALYSIS_SYSTEM} {JSON_ONLY_RULES}");

    match llm.complete(&prompt, &system).await {
        Ok(raw) => match parse_object(&raw) {
            Some(object) => {
                let superseded = merge_model_fields(&mut fields, &object);
                info!("RFP analysis for '{source_label}': model superseded {superseded} fields");
            }
            None => warn!("RFP analysis for '{source_label}': model answer was not a JSON object"),
        },
        Err(e) => warn!("RFP analysis for '{source_label}' fell back to heuristics: {e}"),
    }
    fields
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_json_fences(raw);
    let value = serde_json::from_str::<Value>(text).ok().or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        (start < end)
            .then(|| serde_json::from_str::<Value>(&text[start..=end]).ok())
            .flatten()
    })?;
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Replaces each field the model answered usefully. Returns how many changed.
fn merge_model_fields(fields: &mut RfpFields, object: &Map<String, Value>) -> usize {
    [
        set_scalar(&mut fields.title, object, &["title", "rfp_title", "project_title"]),
        set_scalar(&mut fields.client_name, object, &["client_name", "clientName", "client"]),
        set_scalar(
            &mut fields.submission_deadline,
            object,
            &["submission_deadline", "submissionDeadline", "deadline", "due_date"],
        ),
        set_scalar(
            &mut fields.questions_deadline,
            object,
            &["questions_deadline", "questionsDeadline"],
        ),
        set_scalar(&mut fields.pre_bid_meeting, object, &["pre_bid_meeting", "preBidMeeting"]),
        set_scalar(&mut fields.award_date, object, &["award_date", "awardDate"]),
        set_scalar(&mut fields.budget_range, object, &["budget_range", "budgetRange", "budget"]),
        set_scalar(
            &mut fields.contact_information,
            object,
            &["contact_information", "contactInformation", "contact"],
        ),
        set_list(
            &mut fields.key_requirements,
            object,
            &["key_requirements", "keyRequirements", "requirements"],
        ),
        set_list(&mut fields.deliverables, object, &["deliverables"]),
        set_list(
            &mut fields.evaluation_criteria,
            object,
            &["evaluation_criteria", "evaluationCriteria"],
        ),
        set_list(
            &mut fields.section_titles,
            object,
            &["section_titles", "sectionTitles", "sections"],
        ),
    ]
    .into_iter()
    .filter(|changed| *changed)
    .count()
}

fn set_scalar(target: &mut String, object: &Map<String, Value>, keys: &[&str]) -> bool {
    match lookup(object, keys).and_then(coerce_string) {
        Some(value) => {
            *target = value;
            true
        }
        None => false,
    }
}

fn set_list(target: &mut Vec<String>, object: &Map<String, Value>, keys: &[&str]) -> bool {
    let items = lookup(object, keys).map(coerce_list).unwrap_or_default();
    if items.is_empty() {
        return false;
    }
    *target = items;
    true
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k))
}

/// Scalar coercion: strings trimmed, numbers stringified, objects flattened
/// to "key: value; ..." and arrays joined. Empty and sentinel values are `None`.
pub fn coerce_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| coerce_string(v).map(|v| format!("{k}: {v}")))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Array(items) => items
            .iter()
            .filter_map(coerce_string)
            .collect::<Vec<_>>()
            .join("; "),
    };
    (!text.is_empty() && !is_sentinel(&text)).then_some(text)
}

/// List coercion: arrays stay arrays, strings split on lines and bullets,
/// objects become "key: value" items.
pub fn coerce_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter_map(coerce_string).collect(),
        Value::String(s) => split_list_text(s),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| coerce_string(v).map(|v| format!("{k}: {v}")))
            .collect(),
        other => coerce_string(other).into_iter().collect(),
    };
    items.into_iter().filter(|i| !is_sentinel(i)).collect()
}

static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•·]|\d{1,2}[.)])\s*").expect("valid regex"));

fn split_list_text(text: &str) -> Vec<String> {
    let pieces: Vec<&str> = if text.contains('\n') {
        text.lines().collect()
    } else if text.contains('•') {
        text.split('•').collect()
    } else if text.contains(';') {
        text.split(';').collect()
    } else {
        vec![text]
    };

    pieces
        .into_iter()
        .map(|p| BULLET_PREFIX.replace(p, "").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn is_sentinel(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower == NOT_MENTIONED.to_lowercase()
        || lower == "not mentioned"
        || lower == "n/a"
        || lower == "none"
        || lower == "unknown"
}

// ────────────────────────────────────────────────────────────────────────────
// Heuristics
// ────────────────────────────────────────────────────────────────────────────

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\$\s?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?(?:\s?(?:million|thousand|[mk])\b)?(?:\s*(?:-|–|to|and)\s*\$?\s?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?(?:\s?(?:million|thousand|[mk])\b)?)?",
    )
    .expect("valid regex")
});

static BUDGET_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(budget|not[- ]to[- ]exceed|funding|estimated (?:cost|value)|cost|price|compensation)\b")
        .expect("valid regex")
});

static QUESTIONS_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(questions?|inquiries|clarifications?)\b").expect("valid regex"));

static PRE_BID_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpre[- ]?(?:bid|proposal|submittal)\b|\bsite visit\b|\bmandatory meeting\b")
        .expect("valid regex")
});

static AWARD_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(award|notice to proceed|contract start)\b").expect("valid regex")
});

static SUBMISSION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(due|deadline|closing|submission|submit(?:ted)?|receipt)\b")
        .expect("valid regex")
});

static CLIENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(?:issued\s+by|prepared\s+for|client|issuing\s+(?:agency|organization)|agency|owner|purchaser)\s*:?\s+(.{3,120}?)\s*$",
    )
    .expect("valid regex")
});

static RFP_TITLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:request\s+for\s+(?:proposals?|qualifications|quotes?)|rfp|rfq)\b")
        .expect("valid regex")
});

static REQUIREMENT_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(shall|must|required|is\s+requested\s+to|mandatory)\b").expect("valid regex")
});

static DELIVERABLE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(deliverables?|shall\s+(?:provide|deliver|prepare|produce)|will\s+(?:provide|deliver|prepare|produce)|final\s+report)\b",
    )
    .expect("valid regex")
});

static CRITERIA_WEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,3}\s*(?:points?|pts)\b|\bweight(?:ed|ing)?\b|\bevaluat\w*\s+criteri")
        .expect("valid regex")
});

static CONTACT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(?:contact|point\s+of\s+contact|procurement\s+(?:officer|contact)|contracting\s+officer)\s*:?\s+(.{3,160}?)\s*$",
    )
    .expect("valid regex")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}")
        .expect("valid regex")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b").expect("valid regex")
});

/// Deterministic extraction. Never fails; missing scalars get the sentinel.
pub fn extract_heuristics(text: &str) -> RfpFields {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let sentences = split_sentences(text);
    let deadlines = find_deadlines(&lines);

    let fields = RfpFields {
        title: find_title(&lines).unwrap_or_else(not_mentioned),
        client_name: CLIENT_LINE
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_else(not_mentioned),
        submission_deadline: deadlines.submission.unwrap_or_else(not_mentioned),
        questions_deadline: deadlines.questions.unwrap_or_else(not_mentioned),
        pre_bid_meeting: deadlines.pre_bid.unwrap_or_else(not_mentioned),
        award_date: deadlines.award.unwrap_or_else(not_mentioned),
        budget_range: find_budget(&lines).unwrap_or_else(not_mentioned),
        key_requirements: collect_matching(&sentences, &REQUIREMENT_WORDS),
        deliverables: collect_matching(&sentences, &DELIVERABLE_WORDS),
        evaluation_criteria: collect_matching(&sentences, &CRITERIA_WEIGHT),
        contact_information: find_contact(text).unwrap_or_else(not_mentioned),
        section_titles: DEFAULT_SECTION_TITLES.iter().map(|t| t.to_string()).collect(),
    };
    debug!(
        "Heuristic RFP extraction: {} requirements, {} deliverables",
        fields.key_requirements.len(),
        fields.deliverables.len()
    );
    fields
}

fn not_mentioned() -> String {
    NOT_MENTIONED.to_string()
}

/// First "Request for Proposals ..." style line with more than the bare
/// phrase, otherwise the first substantial line.
fn find_title(lines: &[&str]) -> Option<String> {
    let substantial = |l: &&&str| {
        let len = l.chars().count();
        (10..=150).contains(&len) && l.split_whitespace().count() >= 2 && l.chars().any(char::is_alphabetic)
    };

    lines
        .iter()
        .filter(substantial)
        .find(|l| RFP_TITLE_LINE.is_match(l) && l.split_whitespace().count() > 3)
        .or_else(|| lines.iter().find(substantial))
        .map(|l| l.to_string())
}

fn find_budget(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .filter(|l| BUDGET_KEYWORDS.is_match(l))
        .find_map(|l| CURRENCY_AMOUNT.find(l))
        .map(|m| m.as_str().trim().to_string())
}

#[derive(Default)]
struct Deadlines {
    submission: Option<String>,
    questions: Option<String>,
    pre_bid: Option<String>,
    award: Option<String>,
}

/// Each dated line feeds at most one deadline kind; the more specific kinds
/// are checked before the generic "due"/"deadline" wording.
fn find_deadlines(lines: &[&str]) -> Deadlines {
    let mut found = Deadlines::default();
    for line in lines {
        let Some(date) = DATE_PATTERN.find(line) else {
            continue;
        };
        let date = date.as_str().to_string();
        let slot = if QUESTIONS_KEYWORDS.is_match(line) {
            &mut found.questions
        } else if PRE_BID_KEYWORDS.is_match(line) {
            &mut found.pre_bid
        } else if AWARD_KEYWORDS.is_match(line) {
            &mut found.award
        } else if SUBMISSION_KEYWORDS.is_match(line) {
            &mut found.submission
        } else {
            continue;
        };
        if slot.is_none() {
            *slot = Some(date);
        }
    }
    found
}

fn find_contact(text: &str) -> Option<String> {
    if let Some(caps) = CONTACT_LINE.captures(text) {
        return Some(caps[1].trim().to_string());
    }
    let parts: Vec<&str> = [EMAIL.find(text), PHONE.find(text)]
        .into_iter()
        .flatten()
        .map(|m| m.as_str())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(['\n', '.', ';'])
        .map(|s| BULLET_PREFIX.replace(s, "").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn collect_matching(sentences: &[String], pattern: &Regex) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sentence in sentences {
        let len = sentence.chars().count();
        if !(15..=300).contains(&len) || !pattern.is_match(sentence) {
            continue;
        }
        if !out.iter().any(|s| s.eq_ignore_ascii_case(sentence)) {
            out.push(sentence.clone());
        }
        if out.len() == MAX_LIST_ITEMS {
            break;
        }
    }
    out
}
