//! Canonical section ordering for an assembled proposal.

use std::collections::HashSet;

pub const TITLE_SECTION: &str = "Title";
pub const COVER_LETTER_SECTION: &str = "Cover Letter";
const REFERENCES_KEY: &str = "references";

/// Sections used when neither a template nor the RFP supplies any.
pub const DEFAULT_SECTION_TITLES: &[&str] = &[
    "Executive Summary",
    "Understanding of Requirements",
    "Technical Approach",
    "Firm Qualifications and Experience",
    "Key Personnel and Experience",
    "Project Timeline",
    "Budget Estimate",
    "References",
];

/// Builds the canonical ordered title list.
///
/// "Title" and "Cover Letter" always lead; duplicates are removed
/// case-insensitively keeping the first spelling; blank titles are dropped;
/// "References" (any case) is moved to the end.
pub fn canonical_titles<S: AsRef<str>>(titles: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(titles.len() + 2);
    let mut references: Option<String> = None;

    let leading = [TITLE_SECTION, COVER_LETTER_SECTION];
    let all = leading.iter().copied().chain(titles.iter().map(AsRef::as_ref));

    for raw in all {
        let title = raw.trim();
        if title.is_empty() {
            continue;
        }
        let key = title.to_lowercase();
        if !seen.insert(key.clone()) {
            continue;
        }
        if key == REFERENCES_KEY {
            references = Some(title.to_string());
            continue;
        }
        ordered.push(title.to_string());
    }

    ordered.extend(references);
    ordered
}

/// Position at which a newly added section goes: before a trailing
/// "References" section, otherwise at the end.
pub fn insertion_index<'a, I>(existing: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
    I::IntoIter: ExactSizeIterator,
{
    let names = existing.into_iter();
    let len = names.len();
    match names.last() {
        Some(last) if last.trim().eq_ignore_ascii_case(REFERENCES_KEY) => len - 1,
        _ => len,
    }
}
