//! Proposal Assembler — builds the ordered section map for a proposal.
//!
//! Flow: canonical titles → classify each title → one batched LLM call for the
//! AI-only sections → parse (JSON, then markdown fallback) → library sections
//! from content-library formatters → merge in canonical order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::TextGenerator;
use crate::models::library::{CompanyRow, ProjectReferenceRow, TeamMemberRow};
use crate::models::proposal::{SectionContent, SectionMap, SectionRecord, SectionType};
use crate::models::rfp::RfpRow;
use crate::models::template::TemplateRow;
use crate::proposal::classifier::{Classification, LibraryCategory, SectionClassifier};
use crate::proposal::library_sections::{
    format_cover_letter, format_experience, format_references, format_team, format_title,
};
use crate::proposal::ordering::{canonical_titles, DEFAULT_SECTION_TITLES};
use crate::proposal::parse::{parse_sections, ParseConfidence, ParseResult};
use crate::proposal::prompts::{
    BUDGET_GUIDELINE, PROSE_GUIDELINE, REQUIREMENTS_GUIDELINE, SECTIONS_PROMPT_TEMPLATE,
    SECTIONS_SYSTEM, TIMELINE_GUIDELINE, TITLE_GUIDELINE,
};
use crate::proposal::title_contact::parse_title_text_to_object;
use crate::proposal::NOT_AVAILABLE;

/// AI content shorter than this (after trimming) is replaced by the sentinel.
pub const MIN_CONTENT_LEN: usize = 10;
/// RFP text included in the section prompt is capped to this many chars.
const MAX_RFP_PROMPT_CHARS: usize = 24_000;

/// Read-only content-library data available to the assembler.
#[derive(Debug, Clone, Copy)]
pub struct LibraryContext<'a> {
    pub company: Option<&'a CompanyRow>,
    pub team: &'a [TeamMemberRow],
    pub references: &'a [ProjectReferenceRow],
}

/// Optional restriction of team / reference sections to specific entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySelection {
    pub team_member_ids: Option<Vec<String>>,
    pub reference_ids: Option<Vec<String>>,
}

pub struct AssembleInput<'a> {
    pub rfp: &'a RfpRow,
    pub section_titles: &'a [String],
    pub template: Option<&'a TemplateRow>,
    pub library: LibraryContext<'a>,
    pub selection: &'a LibrarySelection,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionClassificationReport {
    pub section: String,
    #[serde(flatten)]
    pub classification: Classification,
}

#[derive(Debug, Clone)]
pub struct AssembledProposal {
    pub sections: SectionMap,
    /// `None` when no AI section was requested.
    pub parse_confidence: Option<ParseConfidence>,
    pub classifications: Vec<SectionClassificationReport>,
}

/// Runs the full assembly. The returned key set is exactly the canonical title list.
pub async fn assemble(
    llm: &dyn TextGenerator,
    classifier: &SectionClassifier<'_>,
    input: AssembleInput<'_>,
) -> Result<AssembledProposal, AppError> {
    let titles = canonical_titles(&requested_titles(
        input.template,
        input.section_titles,
        input.rfp,
    ));

    // Classify and partition
    let mut classifications = Vec::with_capacity(titles.len());
    let mut library_sections: Vec<(&str, LibraryCategory)> = Vec::new();
    let mut ai_sections: Vec<&str> = Vec::new();
    for title in &titles {
        let classification = classifier.classify(title).await;
        match classification
            .category
            .filter(|c| library_can_supply(*c, &input.library))
        {
            Some(category) => library_sections.push((title.as_str(), category)),
            None => ai_sections.push(title.as_str()),
        }
        classifications.push(SectionClassificationReport {
            section: title.clone(),
            classification,
        });
    }
    info!(
        "Assembling {} sections: {} from library, {} AI-generated",
        titles.len(),
        library_sections.len(),
        ai_sections.len()
    );

    // One batched LLM call for every AI-only section
    let parsed = if ai_sections.is_empty() {
        None
    } else {
        let prompt = build_sections_prompt(&ai_sections, input.template, input.rfp);
        let raw = llm
            .complete(&prompt, SECTIONS_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Section generation failed: {e}")))?;
        let parsed = parse_sections(&raw);
        if matches!(parsed, ParseResult::Unstructured(_)) {
            warn!("Section response was not valid JSON; used markdown header fallback");
        }
        Some(parsed)
    };

    // Merge in canonical order
    let now = Utc::now();
    let mut sections = SectionMap::with_capacity(titles.len());
    for title in &titles {
        let record = match library_sections.iter().find(|(t, _)| *t == title.as_str()) {
            Some((_, category)) => {
                let (content, selected_ids) =
                    library_content(*category, &input.library, input.selection, input.rfp);
                SectionRecord {
                    content,
                    section_type: SectionType::ContentLibrary,
                    last_modified: now,
                    selected_ids,
                }
            }
            None => SectionRecord {
                content: ai_content(title, parsed.as_ref()),
                section_type: SectionType::AiGenerated,
                last_modified: now,
                selected_ids: None,
            },
        };
        sections.insert(title.clone(), record);
    }

    Ok(AssembledProposal {
        sections,
        parse_confidence: parsed.as_ref().map(ParseResult::confidence),
        classifications,
    })
}

/// Template sections (by order) followed by explicitly requested titles.
/// Falls back to the titles detected in the RFP, then to the defaults.
fn requested_titles(
    template: Option<&TemplateRow>,
    section_titles: &[String],
    rfp: &RfpRow,
) -> Vec<String> {
    let mut titles: Vec<String> = template
        .map(|t| t.ordered_sections().iter().map(|s| s.name.clone()).collect())
        .unwrap_or_default();
    titles.extend(section_titles.iter().cloned());

    if titles.iter().all(|t| t.trim().is_empty()) {
        titles = if rfp.section_titles.is_empty() {
            DEFAULT_SECTION_TITLES.iter().map(|t| t.to_string()).collect()
        } else {
            rfp.section_titles.clone()
        };
    }
    titles
}

/// Company-backed categories need a company; team and references always
/// come from the library (an empty list yields the sentinel).
fn library_can_supply(category: LibraryCategory, library: &LibraryContext<'_>) -> bool {
    match category {
        LibraryCategory::Title | LibraryCategory::CoverLetter | LibraryCategory::Experience => {
            library.company.is_some()
        }
        LibraryCategory::Team | LibraryCategory::References => true,
    }
}

fn library_content(
    category: LibraryCategory,
    library: &LibraryContext<'_>,
    selection: &LibrarySelection,
    rfp: &RfpRow,
) -> (SectionContent, Option<Vec<String>>) {
    let text_or_sentinel = |text: String| {
        if text.trim().is_empty() {
            SectionContent::Text(NOT_AVAILABLE.to_string())
        } else {
            SectionContent::Text(text)
        }
    };

    match (category, library.company) {
        (LibraryCategory::Title, Some(company)) => (
            SectionContent::Contact(format_title(company, library.team)),
            None,
        ),
        (LibraryCategory::CoverLetter, Some(company)) => (
            text_or_sentinel(format_cover_letter(company, rfp)),
            None,
        ),
        (LibraryCategory::Experience, Some(company)) => {
            (text_or_sentinel(format_experience(company)), None)
        }
        (LibraryCategory::Team, _) => {
            let (body, ids) = format_team(library.team, selection.team_member_ids.as_deref());
            (text_or_sentinel(body), Some(ids))
        }
        (LibraryCategory::References, _) => {
            let (body, ids) =
                format_references(library.references, selection.reference_ids.as_deref());
            (text_or_sentinel(body), Some(ids))
        }
        // Filtered out by `library_can_supply`
        (_, None) => (SectionContent::Text(NOT_AVAILABLE.to_string()), None),
    }
}

fn ai_content(title: &str, parsed: Option<&ParseResult>) -> SectionContent {
    let text = parsed
        .and_then(|p| p.lookup(title))
        .map(str::trim)
        .unwrap_or("");

    if is_title(title) {
        return SectionContent::Contact(parse_title_text_to_object(text));
    }

    if text.chars().count() < MIN_CONTENT_LEN {
        SectionContent::Text(NOT_AVAILABLE.to_string())
    } else {
        SectionContent::Text(text.to_string())
    }
}

fn is_title(title: &str) -> bool {
    title.trim().eq_ignore_ascii_case("title")
}

fn guideline_for(title: &str) -> &'static str {
    let t = title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| t.contains(w));

    if is_title(title) {
        TITLE_GUIDELINE
    } else if has(&["budget", "cost", "pricing", "price", "fee"]) {
        BUDGET_GUIDELINE
    } else if has(&["timeline", "schedule", "milestone", "work plan"]) {
        TIMELINE_GUIDELINE
    } else if has(&["requirement", "scope", "deliverable", "specification"]) {
        REQUIREMENTS_GUIDELINE
    } else {
        PROSE_GUIDELINE
    }
}

fn build_sections_prompt(
    ai_sections: &[&str],
    template: Option<&TemplateRow>,
    rfp: &RfpRow,
) -> String {
    let section_keys = serde_json::to_string_pretty(ai_sections).unwrap_or_default();

    let guidelines = ai_sections
        .iter()
        .map(|name| {
            let mut line = format!("- \"{name}\": {}", guideline_for(name));
            let placeholders = template.and_then(|t| {
                t.sections
                    .0
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(name))
                    .filter(|s| !s.placeholders.is_empty())
                    .map(|s| s.placeholders.join(", "))
            });
            if let Some(placeholders) = placeholders {
                line.push_str(&format!(" Address: {placeholders}."));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    let rfp_summary = format!(
        "Title: {}\nClient: {}\nBudget: {}\nSubmission deadline: {}\nKey requirements:\n{}\nDeliverables:\n{}\nContact: {}",
        rfp.title,
        rfp.client_name,
        rfp.budget_range,
        rfp.submission_deadline,
        bullet_list(&rfp.key_requirements),
        bullet_list(&rfp.deliverables),
        rfp.contact_information,
    );

    let rfp_text: String = rfp.raw_text.chars().take(MAX_RFP_PROMPT_CHARS).collect();

    SECTIONS_PROMPT_TEMPLATE
        .replace("{section_keys}", &section_keys)
        .replace("{guidelines}", &guidelines)
        .replace("{rfp_summary}", &rfp_summary)
        .replace("{rfp_text}", &rfp_text)
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none listed)".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}
