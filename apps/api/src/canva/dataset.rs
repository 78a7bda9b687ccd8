//! Maps proposal, RFP and library data onto a brand template's dataset fields.
//!
//! `build_dataset_values` and `diagnose_dataset_values` share `resolve_field`,
//! so a field is reported as filled exactly when a value is emitted for it.

use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::canva::{FieldMapping, FieldMappingRule};
use crate::models::library::{CompanyRow, ProjectReferenceRow, TeamMemberRow};
use crate::models::proposal::{ProposalRow, TitleContact};
use crate::models::rfp::RfpRow;
use crate::proposal::parse::value_to_text;
use crate::proposal::title_contact::format_title_object_to_text;

static TEAM_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^team_?member_?(\d+)_(name|title|bio|photo)$").expect("valid regex")
});

static REFERENCE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^reference_?(\d+)_(title|client|scope|contact)$").expect("valid regex")
});

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Image,
    Chart,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetField {
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

/// Field key -> field definition, as returned for a brand template.
pub type DatasetDefinition = IndexMap<String, DatasetField>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatasetValue {
    Text { text: String },
    Image { asset_id: String },
}

impl DatasetValue {
    fn preview(&self) -> String {
        match self {
            DatasetValue::Text { text } => {
                let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
                if text.chars().count() > PREVIEW_CHARS {
                    preview.push('…');
                }
                preview
            }
            DatasetValue::Image { asset_id } => format!("asset {asset_id}"),
        }
    }
}

/// Everything a field can be filled from.
#[derive(Debug, Clone, Copy)]
pub struct DatasetContext<'a> {
    pub proposal: &'a ProposalRow,
    pub rfp: &'a RfpRow,
    pub company: Option<&'a CompanyRow>,
    /// Active members in display order.
    pub team: &'a [&'a TeamMemberRow],
    /// Active references in listing order.
    pub references: &'a [&'a ProjectReferenceRow],
    pub logo_asset_id: Option<&'a str>,
    /// member_id -> uploaded photo asset id.
    pub team_photo_asset_ids: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Filled,
    Blank,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Mapped,
    Auto,
    Unsupported,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDiagnosis {
    pub field: String,
    pub field_type: FieldKind,
    pub status: FieldStatus,
    pub source: FieldSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Filled(DatasetValue, FieldSource),
    Blank(FieldSource, String),
    Unsupported(String),
}

pub fn build_dataset_values(
    dataset: &DatasetDefinition,
    mapping: &FieldMapping,
    ctx: &DatasetContext<'_>,
) -> IndexMap<String, DatasetValue> {
    dataset
        .iter()
        .filter_map(|(key, field)| match resolve_field(key, field.kind, mapping, ctx) {
            Resolution::Filled(value, _) => Some((key.clone(), value)),
            _ => None,
        })
        .collect()
}

pub fn diagnose_dataset_values(
    dataset: &DatasetDefinition,
    mapping: &FieldMapping,
    ctx: &DatasetContext<'_>,
) -> Vec<FieldDiagnosis> {
    dataset
        .iter()
        .map(|(key, field)| {
            let (status, source, reason, preview) =
                match resolve_field(key, field.kind, mapping, ctx) {
                    Resolution::Filled(value, source) => {
                        (FieldStatus::Filled, source, None, Some(value.preview()))
                    }
                    Resolution::Blank(source, reason) => {
                        (FieldStatus::Blank, source, Some(reason), None)
                    }
                    Resolution::Unsupported(reason) => (
                        FieldStatus::Unsupported,
                        FieldSource::Unsupported,
                        Some(reason),
                        None,
                    ),
                };
            FieldDiagnosis {
                field: key.clone(),
                field_type: field.kind,
                status,
                source,
                reason,
                preview,
            }
        })
        .collect()
}

fn resolve_field(
    key: &str,
    kind: FieldKind,
    mapping: &FieldMapping,
    ctx: &DatasetContext<'_>,
) -> Resolution {
    match kind {
        FieldKind::Chart => {
            return Resolution::Unsupported("chart fields cannot be autofilled".to_string())
        }
        FieldKind::Other => {
            return Resolution::Unsupported("unknown field type".to_string());
        }
        FieldKind::Text | FieldKind::Image => {}
    }

    if let Some(rule) = mapping.get(key) {
        return resolve_mapped(rule, kind, ctx);
    }

    match heuristic_value(key, kind, ctx) {
        Some(value) => Resolution::Filled(value, FieldSource::Auto),
        None => Resolution::Blank(
            FieldSource::None,
            "no mapping and no matching data".to_string(),
        ),
    }
}

fn resolve_mapped(rule: &FieldMappingRule, kind: FieldKind, ctx: &DatasetContext<'_>) -> Resolution {
    let blank = |reason: String| Resolution::Blank(FieldSource::Mapped, reason);

    match (rule, kind) {
        (FieldMappingRule::Literal { value }, _) if value.trim().is_empty() => {
            blank("literal value is empty".to_string())
        }
        (FieldMappingRule::Literal { value }, FieldKind::Image) => Resolution::Filled(
            DatasetValue::Image {
                asset_id: value.trim().to_string(),
            },
            FieldSource::Mapped,
        ),
        (FieldMappingRule::Literal { value }, _) => Resolution::Filled(
            DatasetValue::Text {
                text: value.clone(),
            },
            FieldSource::Mapped,
        ),
        (FieldMappingRule::Asset { asset_id }, FieldKind::Image) if !asset_id.trim().is_empty() => {
            Resolution::Filled(
                DatasetValue::Image {
                    asset_id: asset_id.trim().to_string(),
                },
                FieldSource::Mapped,
            )
        }
        (FieldMappingRule::Asset { .. }, FieldKind::Image) => blank("asset id is empty".to_string()),
        (FieldMappingRule::Asset { .. }, _) => {
            blank("asset mappings only apply to image fields".to_string())
        }
        (FieldMappingRule::Source { .. }, FieldKind::Image) => {
            blank("source mappings only apply to text fields".to_string())
        }
        (FieldMappingRule::Source { source }, _) => match resolve_source(source, ctx) {
            Some(text) => Resolution::Filled(DatasetValue::Text { text }, FieldSource::Mapped),
            None => blank(format!("source '{source}' has no value")),
        },
    }
}

/// Resolves a dotted path such as `proposal.sections.Cover Letter.content`
/// or `company.name`. Key segments may contain spaces and match
/// case-insensitively.
pub fn resolve_source(path: &str, ctx: &DatasetContext<'_>) -> Option<String> {
    let (root, rest) = path.trim().split_once('.')?;
    let root_value = match root.to_ascii_lowercase().as_str() {
        "proposal" => serde_json::to_value(ctx.proposal).ok()?,
        "rfp" => serde_json::to_value(ctx.rfp).ok()?,
        "company" => serde_json::to_value(ctx.company?).ok()?,
        _ => return None,
    };

    let segments: Vec<&str> = rest.split('.').collect();
    let value = walk(&root_value, &segments)?;
    non_empty(render_value(value))
}

/// Descends one object level per step, joining segments when a key itself
/// contains dots.
fn walk<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    if segments.is_empty() {
        return Some(value);
    }
    let Value::Object(fields) = value else {
        return None;
    };
    for take in 1..=segments.len() {
        let candidate = segments[..take].join(".");
        let found = fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(candidate.trim()))
            .map(|(_, v)| v);
        if let Some(next) = found {
            if let Some(resolved) = walk(next, &segments[take..]) {
                return Some(resolved);
            }
        }
    }
    None
}

fn render_value(value: &Value) -> String {
    if let Value::Object(fields) = value {
        if fields.contains_key("submittedBy") {
            if let Ok(contact) = serde_json::from_value::<TitleContact>(value.clone()) {
                return format_title_object_to_text(&contact);
            }
        }
    }
    value_to_text(value)
}

fn heuristic_value(key: &str, kind: FieldKind, ctx: &DatasetContext<'_>) -> Option<DatasetValue> {
    let key = key.trim().to_ascii_lowercase();
    let text = |s: Option<String>| {
        non_empty(s?).map(|text| DatasetValue::Text { text })
    };

    if let Some(caps) = TEAM_FIELD.captures(&key) {
        let member = nth(ctx.team, &caps[1])?;
        return match (&caps[2], kind) {
            ("photo", FieldKind::Image) => ctx
                .team_photo_asset_ids
                .get(&member.member_id)
                .map(|id| DatasetValue::Image {
                    asset_id: id.clone(),
                }),
            ("photo", _) | (_, FieldKind::Image) => None,
            ("name", _) => text(Some(member.name.clone())),
            ("title", _) => text(Some(member.title.clone())),
            _ => text(Some(member.bio.clone())),
        };
    }

    if let Some(caps) = REFERENCE_FIELD.captures(&key) {
        if kind == FieldKind::Image {
            return None;
        }
        let reference = nth(ctx.references, &caps[1])?;
        return match &caps[2] {
            "title" => text(Some(reference.project_name.clone())),
            "client" => text(Some(reference.organization.clone())),
            "scope" => text(Some(reference.scope.clone())),
            _ => text(Some(reference_contact(reference))),
        };
    }

    if kind == FieldKind::Image {
        return key.contains("logo").then(|| ctx.logo_asset_id).flatten().map(|id| {
            DatasetValue::Image {
                asset_id: id.to_string(),
            }
        });
    }

    if key.contains("title") {
        return text(Some(ctx.rfp.title.clone()));
    }
    if key.contains("client") {
        return text(Some(ctx.rfp.client_name.clone()));
    }
    if key.contains("company") {
        return text(ctx.company.map(|c| c.name.clone()));
    }
    if key.contains("cover") && key.contains("letter") {
        return text(section_text(ctx.proposal, |slug| slug == "cover_letter"));
    }
    if key.contains("summary") {
        return text(section_text(ctx.proposal, |slug| slug.contains("summary")));
    }
    let key_slug = slug(&key);
    text(section_text(ctx.proposal, |section| section == key_slug))
}

fn nth<'a, T>(items: &[&'a T], one_based: &str) -> Option<&'a T> {
    let n: usize = one_based.parse().ok()?;
    items.get(n.checked_sub(1)?).copied()
}

fn reference_contact(reference: &ProjectReferenceRow) -> String {
    [
        &reference.contact_name,
        &reference.contact_email,
        &reference.contact_phone,
    ]
    .into_iter()
    .flatten()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

fn section_text(proposal: &ProposalRow, matches: impl Fn(&str) -> bool) -> Option<String> {
    proposal
        .sections
        .0
        .iter()
        .find(|(name, _)| matches(&slug(name)))
        .map(|(_, record)| record.content.to_text())
}

/// `"Cover Letter"` -> `"cover_letter"`.
pub fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use sqlx::types::Json;
    use uuid::Uuid;

    use super::*;
    use crate::models::proposal::{SectionContent, SectionMap, SectionRecord, SectionType};
    use crate::proposal::library_sections::fixtures;

    fn record(content: SectionContent) -> SectionRecord {
        SectionRecord {
            content,
            section_type: SectionType::AiGenerated,
            last_modified: Utc::now(),
            selected_ids: None,
        }
    }

    fn proposal() -> ProposalRow {
        let mut sections = SectionMap::new();
        sections.insert(
            "Title".to_string(),
            record(SectionContent::Contact(TitleContact {
                submitted_by: "Acme Engineering".to_string(),
                name: "Ann Lee".to_string(),
                email: "ann@acme.example".to_string(),
                number: "555-0100".to_string(),
            })),
        );
        sections.insert(
            "Cover Letter".to_string(),
            record(SectionContent::Text("Dear Selection Committee".to_string())),
        );
        sections.insert(
            "Executive Summary".to_string(),
            record(SectionContent::Text("We will deliver the bridge.".to_string())),
        );
        sections.insert(
            "Project Approach".to_string(),
            record(SectionContent::Text("Phased construction.".to_string())),
        );
        ProposalRow {
            id: Uuid::new_v4(),
            rfp_id: Uuid::new_v4(),
            title: "Bridge Proposal".to_string(),
            status: "draft".to_string(),
            sections: Json(sections),
            template_id: None,
            company_id: Some("acme".to_string()),
            created_by: "u1".to_string(),
            last_modified_by: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn dataset(fields: &[(&str, &str)]) -> DatasetDefinition {
        fields
            .iter()
            .map(|(k, t)| {
                (
                    k.to_string(),
                    serde_json::from_value(json!({ "type": t })).unwrap(),
                )
            })
            .collect()
    }

    struct Fixture {
        proposal: ProposalRow,
        rfp: RfpRow,
        company: CompanyRow,
        members: Vec<TeamMemberRow>,
        references: Vec<ProjectReferenceRow>,
        photos: HashMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut photos = HashMap::new();
            photos.insert("m-1".to_string(), "PHOTO1".to_string());
            Self {
                proposal: proposal(),
                rfp: fixtures::rfp(),
                company: fixtures::company(),
                members: vec![fixtures::member("m-1", "Ann Lee", 1), fixtures::member("m-2", "Bo Chan", 2)],
                references: vec![fixtures::reference("r-1", "Elm Street Bridge")],
                photos,
            }
        }

        fn run<R>(&self, f: impl FnOnce(&DatasetContext<'_>) -> R) -> R {
            let team: Vec<&TeamMemberRow> = self.members.iter().collect();
            let references: Vec<&ProjectReferenceRow> = self.references.iter().collect();
            let ctx = DatasetContext {
                proposal: &self.proposal,
                rfp: &self.rfp,
                company: Some(&self.company),
                team: &team,
                references: &references,
                logo_asset_id: Some("LOGO"),
                team_photo_asset_ids: &self.photos,
            };
            f(&ctx)
        }
    }

    fn text(s: &str) -> DatasetValue {
        DatasetValue::Text {
            text: s.to_string(),
        }
    }

    #[test]
    fn test_chart_fields_never_emitted_even_when_mapped() {
        let fx = Fixture::new();
        let ds = dataset(&[("sales_chart", "chart")]);
        let mut mapping = FieldMapping::new();
        mapping.insert(
            "sales_chart".to_string(),
            FieldMappingRule::Literal {
                value: "1,2,3".to_string(),
            },
        );
        let values = fx.run(|ctx| build_dataset_values(&ds, &mapping, ctx));
        assert!(values.is_empty());

        let diagnosis = fx.run(|ctx| diagnose_dataset_values(&ds, &mapping, ctx));
        assert_eq!(diagnosis[0].status, FieldStatus::Unsupported);
        assert_eq!(diagnosis[0].source, FieldSource::Unsupported);
    }

    #[test]
    fn test_explicit_mapping_beats_heuristic() {
        let fx = Fixture::new();
        let ds = dataset(&[("client_name", "text"), ("rfp_title", "text")]);
        let mut mapping = FieldMapping::new();
        mapping.insert(
            "client_name".to_string(),
            FieldMappingRule::Literal {
                value: "Springfield DOT".to_string(),
            },
        );
        let values = fx.run(|ctx| build_dataset_values(&ds, &mapping, ctx));
        assert_eq!(values["client_name"], text("Springfield DOT"));
        assert_eq!(values["rfp_title"], text("Main Street Bridge Replacement"));
    }

    #[test]
    fn test_source_paths_resolve_sections_with_spaces() {
        let fx = Fixture::new();
        let ds = dataset(&[("intro", "text"), ("contact", "text"), ("hq", "text")]);
        let mut mapping = FieldMapping::new();
        mapping.insert(
            "intro".to_string(),
            FieldMappingRule::Source {
                source: "proposal.sections.Cover Letter.content".to_string(),
            },
        );
        mapping.insert(
            "contact".to_string(),
            FieldMappingRule::Source {
                source: "proposal.sections.title.content".to_string(),
            },
        );
        mapping.insert(
            "hq".to_string(),
            FieldMappingRule::Source {
                source: "company.headquarters".to_string(),
            },
        );
        let values = fx.run(|ctx| build_dataset_values(&ds, &mapping, ctx));
        assert_eq!(values["intro"], text("Dear Selection Committee"));
        assert_eq!(values["hq"], text("Denver, CO"));
        match &values["contact"] {
            DatasetValue::Text { text } => {
                assert!(text.starts_with("Submitted by: Acme Engineering"));
                assert!(text.contains("ann@acme.example"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_asset_rule_on_text_field_is_blank_with_reason() {
        let fx = Fixture::new();
        let ds = dataset(&[("headline", "text"), ("hero", "image")]);
        let mut mapping = FieldMapping::new();
        mapping.insert(
            "headline".to_string(),
            FieldMappingRule::Asset {
                asset_id: "A1".to_string(),
            },
        );
        mapping.insert(
            "hero".to_string(),
            FieldMappingRule::Asset {
                asset_id: "A2".to_string(),
            },
        );
        let values = fx.run(|ctx| build_dataset_values(&ds, &mapping, ctx));
        assert!(!values.contains_key("headline"));
        assert_eq!(
            values["hero"],
            DatasetValue::Image {
                asset_id: "A2".to_string()
            }
        );

        let diagnosis = fx.run(|ctx| diagnose_dataset_values(&ds, &mapping, ctx));
        assert_eq!(diagnosis[0].status, FieldStatus::Blank);
        assert_eq!(diagnosis[0].source, FieldSource::Mapped);
        assert!(diagnosis[0].reason.as_deref().unwrap().contains("image"));
    }

    #[test]
    fn test_team_and_reference_heuristics_are_one_based() {
        let fx = Fixture::new();
        let ds = dataset(&[
            ("team_member_1_name", "text"),
            ("team_member_2_title", "text"),
            ("team_member_1_photo", "image"),
            ("team_member_2_photo", "image"),
            ("team_member_3_name", "text"),
            ("reference_1_title", "text"),
            ("reference_1_contact", "text"),
            ("company_logo", "image"),
        ]);
        let values = fx.run(|ctx| build_dataset_values(&ds, &FieldMapping::new(), ctx));
        assert_eq!(values["team_member_1_name"], text("Ann Lee"));
        assert_eq!(values["team_member_2_title"], text("Project Manager"));
        assert_eq!(
            values["team_member_1_photo"],
            DatasetValue::Image {
                asset_id: "PHOTO1".to_string()
            }
        );
        assert!(!values.contains_key("team_member_2_photo"));
        assert!(!values.contains_key("team_member_3_name"));
        assert_eq!(values["reference_1_title"], text("Elm Street Bridge"));
        assert_eq!(values["reference_1_contact"], text("Pat Doe, pat@springfield.gov"));
        assert_eq!(
            values["company_logo"],
            DatasetValue::Image {
                asset_id: "LOGO".to_string()
            }
        );
    }

    #[test]
    fn test_section_slug_heuristics() {
        let fx = Fixture::new();
        let ds = dataset(&[
            ("cover_letter_body", "text"),
            ("summary", "text"),
            ("project_approach", "text"),
            ("company", "text"),
            ("unrelated_field", "text"),
        ]);
        let values = fx.run(|ctx| build_dataset_values(&ds, &FieldMapping::new(), ctx));
        assert_eq!(values["cover_letter_body"], text("Dear Selection Committee"));
        assert_eq!(values["summary"], text("We will deliver the bridge."));
        assert_eq!(values["project_approach"], text("Phased construction."));
        assert_eq!(values["company"], text("Acme Engineering"));
        assert!(!values.contains_key("unrelated_field"));
    }

    #[test]
    fn test_section_heuristic_slugs_the_field_key() {
        let fx = Fixture::new();
        let ds = dataset(&[("Project-Approach", "text"), ("project approach", "text")]);
        let values = fx.run(|ctx| build_dataset_values(&ds, &FieldMapping::new(), ctx));
        assert_eq!(values["Project-Approach"], text("Phased construction."));
        assert_eq!(values["project approach"], text("Phased construction."));
    }

    #[test]
    fn test_diagnosis_filled_set_matches_build_output() {
        let fx = Fixture::new();
        let ds = dataset(&[
            ("title", "text"),
            ("chart_1", "chart"),
            ("team_member_1_bio", "text"),
            ("team_member_9_bio", "text"),
            ("logo", "image"),
            ("hero", "image"),
            ("mystery", "text"),
            ("widget", "video"),
        ]);
        let mut mapping = FieldMapping::new();
        mapping.insert(
            "mystery".to_string(),
            FieldMappingRule::Source {
                source: "rfp.nonexistent".to_string(),
            },
        );
        let values = fx.run(|ctx| build_dataset_values(&ds, &mapping, ctx));
        let diagnosis = fx.run(|ctx| diagnose_dataset_values(&ds, &mapping, ctx));

        assert_eq!(diagnosis.len(), ds.len());
        for entry in &diagnosis {
            assert_eq!(
                entry.status == FieldStatus::Filled,
                values.contains_key(&entry.field),
                "disagreement on {}",
                entry.field
            );
        }
        let widget = diagnosis.iter().find(|d| d.field == "widget").unwrap();
        assert_eq!(widget.field_type, FieldKind::Other);
        assert_eq!(widget.status, FieldStatus::Unsupported);
    }

    #[test]
    fn test_dataset_value_wire_shape() {
        assert_eq!(
            serde_json::to_value(text("Hi")).unwrap(),
            json!({"type": "text", "text": "Hi"})
        );
        assert_eq!(
            serde_json::to_value(DatasetValue::Image {
                asset_id: "A".to_string()
            })
            .unwrap(),
            json!({"type": "image", "asset_id": "A"})
        );
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Cover Letter"), "cover_letter");
        assert_eq!(slug("  Budget & Cost Proposal "), "budget_cost_proposal");
    }
}
