use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Provenance of a section's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionType {
    AiGenerated,
    ContentLibrary,
    Custom,
}

/// Contact block shown on the Title section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleContact {
    pub submitted_by: String,
    pub name: String,
    pub email: String,
    pub number: String,
}

/// Section content is plain text except for the Title section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    Text(String),
    Contact(TitleContact),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub content: SectionContent,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub last_modified: DateTime<Utc>,
    /// Library entity ids chosen for team / reference sections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_ids: Option<Vec<String>>,
}

/// Ordered section name -> record map owned by a proposal.
pub type SectionMap = IndexMap<String, SectionRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    InReview,
    Final,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::InReview => "in_review",
            ProposalStatus::Final => "final",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProposalRow {
    pub id: Uuid,
    pub rfp_id: Uuid,
    pub title: String,
    pub status: String,
    pub sections: Json<SectionMap>,
    pub template_id: Option<Uuid>,
    pub company_id: Option<String>,
    pub created_by: String,
    pub last_modified_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_record_uses_stored_field_names() {
        let record = SectionRecord {
            content: SectionContent::Text("Body".to_string()),
            section_type: SectionType::ContentLibrary,
            last_modified: Utc::now(),
            selected_ids: Some(vec!["m-1".to_string()]),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "content-library");
        assert_eq!(value["selectedIds"][0], "m-1");
        assert!(value.get("lastModified").is_some());
    }

    #[test]
    fn test_selected_ids_omitted_when_absent() {
        let record = SectionRecord {
            content: SectionContent::Text("Body".to_string()),
            section_type: SectionType::AiGenerated,
            last_modified: Utc::now(),
            selected_ids: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("selectedIds").is_none());
    }

    #[test]
    fn test_title_content_deserializes_as_contact() {
        let value = json!({
            "content": {"submittedBy": "Acme", "name": "Jo", "email": "jo@acme.com", "number": "555"},
            "type": "content-library",
            "lastModified": "2026-01-01T00:00:00Z"
        });
        let record: SectionRecord = serde_json::from_value(value).unwrap();
        match record.content {
            SectionContent::Contact(c) => assert_eq!(c.submitted_by, "Acme"),
            other => panic!("expected contact, got {other:?}"),
        }
    }

    #[test]
    fn test_section_map_preserves_insertion_order() {
        let mut map = SectionMap::new();
        for name in ["Title", "Cover Letter", "Budget", "References"] {
            map.insert(
                name.to_string(),
                SectionRecord {
                    content: SectionContent::Text(String::new()),
                    section_type: SectionType::Custom,
                    last_modified: Utc::now(),
                    selected_ids: None,
                },
            );
        }
        let json = serde_json::to_string(&map).unwrap();
        let back: SectionMap = serde_json::from_str(&json).unwrap();
        let keys: Vec<_> = back.keys().cloned().collect();
        assert_eq!(keys, vec!["Title", "Cover Letter", "Budget", "References"]);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result: Result<ProposalStatus, _> = serde_json::from_str("\"archived\"");
        assert!(result.is_err());
    }
}
