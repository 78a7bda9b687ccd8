//! Section Classifier — decides which content-library category (if any)
//! supplies a section's content.
//!
//! Tiers, in order: exact title match, Redis cache, model classification,
//! keyword table. The model tier reports `ClassificationUncertain` instead of
//! guessing; the keyword table is the explicit recovery step for that case.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::TextGenerator;
use crate::proposal::prompts::{CLASSIFIER_PROMPT_TEMPLATE, CLASSIFIER_SYSTEM};

const CACHE_PREFIX: &str = "section-class:";
const CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const NONE_LABEL: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryCategory {
    Title,
    CoverLetter,
    Experience,
    Team,
    References,
}

impl LibraryCategory {
    pub const ALL: [LibraryCategory; 5] = [
        LibraryCategory::Title,
        LibraryCategory::CoverLetter,
        LibraryCategory::Experience,
        LibraryCategory::Team,
        LibraryCategory::References,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LibraryCategory::Title => "title",
            LibraryCategory::CoverLetter => "cover-letter",
            LibraryCategory::Experience => "experience",
            LibraryCategory::Team => "team",
            LibraryCategory::References => "references",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Which tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationTier {
    Exact,
    Cached,
    Model,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Option<LibraryCategory>,
    pub tier: ClassificationTier,
}

/// The model could not give a usable answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("classification uncertain: {reason}")]
pub struct ClassificationUncertain {
    pub reason: String,
}

/// Keyword table used when the model is unavailable or uncertain.
/// Checked in order; earlier rows win ("Key Personnel and Experience" is team).
const KEYWORD_TABLE: &[(LibraryCategory, &[&str])] = &[
    (
        LibraryCategory::CoverLetter,
        &[
            "cover letter",
            "letter of transmittal",
            "transmittal letter",
            "letter of interest",
            "introduction letter",
        ],
    ),
    (LibraryCategory::Title, &["title page", "cover page"]),
    (
        LibraryCategory::References,
        &["reference", "client testimonial", "testimonials"],
    ),
    (
        LibraryCategory::Team,
        &[
            "personnel",
            "team",
            "staff",
            "key people",
            "resumes",
            "project manager",
            "organizational chart",
        ],
    ),
    (
        LibraryCategory::Experience,
        &[
            "experience",
            "qualification",
            "past performance",
            "company background",
            "company profile",
            "firm profile",
            "firm background",
            "about us",
            "corporate capabilit",
            "company overview",
        ],
    ),
];

pub struct SectionClassifier<'a> {
    llm: &'a dyn TextGenerator,
    cache: Option<&'a redis::Client>,
}

impl<'a> SectionClassifier<'a> {
    pub fn new(llm: &'a dyn TextGenerator, cache: Option<&'a redis::Client>) -> Self {
        Self { llm, cache }
    }

    /// Never fails; the worst case is `category: None` (AI-generated section).
    pub async fn classify(&self, title: &str) -> Classification {
        if let Some(category) = exact_match(title) {
            return Classification {
                category: Some(category),
                tier: ClassificationTier::Exact,
            };
        }

        if let Some(category) = self.cached(title).await {
            return Classification {
                category,
                tier: ClassificationTier::Cached,
            };
        }

        match self.classify_with_model(title).await {
            Ok(category) => {
                self.store(title, category).await;
                Classification {
                    category,
                    tier: ClassificationTier::Model,
                }
            }
            Err(uncertain) => {
                debug!("Falling back to keyword table for '{title}': {uncertain}");
                Classification {
                    category: classify_by_keywords(title),
                    tier: ClassificationTier::Keyword,
                }
            }
        }
    }

    /// Single 6-way model call.
    pub async fn classify_with_model(
        &self,
        title: &str,
    ) -> Result<Option<LibraryCategory>, ClassificationUncertain> {
        let prompt = CLASSIFIER_PROMPT_TEMPLATE.replace("{title}", title.trim());
        let answer = self
            .llm
            .complete(&prompt, CLASSIFIER_SYSTEM)
            .await
            .map_err(|e| ClassificationUncertain {
                reason: format!("model call failed: {e}"),
            })?;
        parse_label(&answer)
    }

    async fn cached(&self, title: &str) -> Option<Option<LibraryCategory>> {
        let client = self.cache?;
        let key = cache_key(title);
        let lookup: redis::RedisResult<Option<String>> = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::cmd("GET").arg(&key).query_async(&mut conn).await
        }
        .await;
        match lookup {
            Ok(Some(label)) if label == NONE_LABEL => Some(None),
            Ok(Some(label)) => LibraryCategory::from_label(&label).map(Some),
            Ok(None) => None,
            Err(e) => {
                warn!("Classification cache read failed: {e}");
                None
            }
        }
    }

    async fn store(&self, title: &str, category: Option<LibraryCategory>) {
        let Some(client) = self.cache else {
            return;
        };
        let label = category.map(|c| c.label()).unwrap_or(NONE_LABEL);
        let key = cache_key(title);
        let write: redis::RedisResult<()> = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::cmd("SET")
                .arg(&key)
                .arg(label)
                .arg("EX")
                .arg(CACHE_TTL_SECS)
                .query_async(&mut conn)
                .await
        }
        .await;
        if let Err(e) = write {
            warn!("Classification cache write failed: {e}");
        }
    }
}

fn cache_key(title: &str) -> String {
    format!("{CACHE_PREFIX}{}", normalize(title))
}

fn normalize(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// "Title" and "Cover Letter" never need a model call.
pub fn exact_match(title: &str) -> Option<LibraryCategory> {
    match normalize(title).as_str() {
        "title" => Some(LibraryCategory::Title),
        "cover letter" => Some(LibraryCategory::CoverLetter),
        _ => None,
    }
}

/// Keyword-substring fallback.
pub fn classify_by_keywords(title: &str) -> Option<LibraryCategory> {
    let title = normalize(title);
    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| title.contains(k)))
        .map(|(category, _)| *category)
}

/// Accepts exactly one known label (quotes, case and trailing punctuation
/// ignored). Anything else is uncertain.
fn parse_label(answer: &str) -> Result<Option<LibraryCategory>, ClassificationUncertain> {
    let first_line = answer.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let cleaned = first_line
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
        .trim()
        .to_lowercase()
        .replace(['_', ' '], "-");

    if cleaned == NONE_LABEL {
        return Ok(None);
    }
    if let Some(category) = LibraryCategory::from_label(&cleaned) {
        return Ok(Some(category));
    }

    Err(ClassificationUncertain {
        reason: format!(
            "unrecognized answer '{}'",
            answer.chars().take(60).collect::<String>()
        ),
    })
}
