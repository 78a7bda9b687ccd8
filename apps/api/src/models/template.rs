use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateContentType {
    #[default]
    AiGenerated,
    ContentLibrary,
    Static,
}

/// One section descriptor within a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    pub name: String,
    #[serde(default)]
    pub content_type: TemplateContentType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub project_type: String,
    pub company_id: Option<String>,
    pub is_active: bool,
    pub sections: Json<Vec<TemplateSection>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateRow {
    /// Section descriptors sorted by `order`; ties keep their stored order.
    pub fn ordered_sections(&self) -> Vec<&TemplateSection> {
        let mut sections: Vec<_> = self.sections.0.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, order: i32) -> TemplateSection {
        TemplateSection {
            name: name.to_string(),
            content_type: TemplateContentType::AiGenerated,
            is_required: true,
            order,
            placeholders: vec![],
        }
    }

    #[test]
    fn test_ordered_sections_sorts_by_order_stably() {
        let template = TemplateRow {
            id: Uuid::new_v4(),
            name: "Construction".to_string(),
            description: String::new(),
            project_type: "construction".to_string(),
            company_id: None,
            is_active: true,
            sections: Json(vec![
                section("Budget", 3),
                section("Scope", 1),
                section("Timeline", 3),
            ]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let names: Vec<_> = template
            .ordered_sections()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Scope", "Budget", "Timeline"]);
    }

    #[test]
    fn test_template_section_defaults() {
        let s: TemplateSection = serde_json::from_str(r#"{"name": "Approach"}"#).unwrap();
        assert_eq!(s.content_type, TemplateContentType::AiGenerated);
        assert!(!s.is_required);
        assert!(s.placeholders.is_empty());
    }
}
