use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// How a single external dataset field is filled.
///
/// Closed set: an unrecognized `kind` fails deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldMappingRule {
    Literal {
        value: String,
    },
    Source {
        source: String,
    },
    Asset {
        #[serde(rename = "assetId", alias = "asset_id")]
        asset_id: String,
    },
}

/// External field key -> mapping rule.
pub type FieldMapping = IndexMap<String, FieldMappingRule>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CanvaConnectionRow {
    pub user_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CanvaAssetLinkRow {
    pub owner_type: String,
    pub owner_id: String,
    pub source_url: String,
    pub asset_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CanvaCompanyTemplateRow {
    pub company_id: String,
    pub brand_template_id: String,
    pub field_mapping: Json<FieldMapping>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CanvaProposalDesignRow {
    pub proposal_id: Uuid,
    pub company_id: String,
    pub brand_template_id: String,
    pub design_id: String,
    pub edit_url: Option<String>,
    pub view_url: Option<String>,
    pub export_url: Option<String>,
    pub last_proposal_updated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_rules_deserialize_by_kind() {
        let mapping: FieldMapping = serde_json::from_str(
            r#"{
                "headline": {"kind": "literal", "value": "Our Proposal"},
                "intro": {"kind": "source", "source": "proposal.sections.Cover Letter.content"},
                "hero": {"kind": "asset", "assetId": "A123"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            mapping["headline"],
            FieldMappingRule::Literal {
                value: "Our Proposal".to_string()
            }
        );
        assert!(matches!(mapping["intro"], FieldMappingRule::Source { .. }));
        assert_eq!(
            mapping["hero"],
            FieldMappingRule::Asset {
                asset_id: "A123".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result: Result<FieldMappingRule, _> =
            serde_json::from_str(r#"{"kind": "formula", "value": "x"}"#);
        assert!(result.is_err(), "unknown kinds must not be silently accepted");
    }

    #[test]
    fn test_connection_tokens_never_serialized() {
        let row = CanvaConnectionRow {
            user_id: "u1".to_string(),
            access_token: "secret".to_string(),
            refresh_token: Some("refresh".to_string()),
            scope: None,
            expires_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("refresh"));
    }
}
