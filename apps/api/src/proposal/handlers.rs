//! Axum route handlers for the Proposals API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::library::store as library_store;
use crate::models::proposal::{
    ProposalRow, ProposalStatus, SectionContent, SectionMap, SectionRecord, SectionType,
};
use crate::proposal::assembler::{
    assemble, AssembleInput, LibraryContext, LibrarySelection, SectionClassificationReport,
};
use crate::proposal::classifier::SectionClassifier;
use crate::proposal::ordering::{insertion_index, TITLE_SECTION};
use crate::proposal::parse::ParseConfidence;
use crate::proposal::store::{self, NewProposal};
use crate::proposal::title_contact::parse_title_text_to_object;
use crate::rfp::store as rfp_store;
use crate::state::AppState;
use crate::templates::store as template_store;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub rfp_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub section_titles: Vec<String>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(flatten)]
    pub selection: LibrarySelection,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub proposal: ProposalRow,
    /// `best_effort` when the model ignored the JSON format.
    pub parse_confidence: Option<ParseConfidence>,
    pub classifications: Vec<SectionClassificationReport>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub rfp_id: Option<Uuid>,
}

/// One edited section. `type` defaults to `custom`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEdit {
    pub content: SectionContent,
    #[serde(default, rename = "type")]
    pub section_type: Option<SectionType>,
    #[serde(default)]
    pub selected_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSectionsRequest {
    pub sections: IndexMap<String, SectionEdit>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ProposalStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/proposals/generate
///
/// Runs the assembler once and persists the result as a draft.
pub async fn handle_generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let rfp = rfp_store::get_rfp(&state.db, request.rfp_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("RFP {} not found", request.rfp_id)))?;

    let company_id = request
        .company_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let company = match company_id {
        Some(id) => Some(
            library_store::get_company(&state.db, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?,
        ),
        None => None,
    };

    let template = match (request.template_id, company_id) {
        (Some(template_id), _) => Some(
            template_store::get_template(&state.db, template_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Template {template_id} not found")))?,
        ),
        (None, Some(id)) => template_store::active_template_for_company(&state.db, id).await?,
        (None, None) => None,
    };

    let (team, references) = match company_id {
        Some(id) => tokio::try_join!(
            library_store::list_team(&state.db, id),
            library_store::list_references(&state.db, id),
        )?,
        None => (Vec::new(), Vec::new()),
    };

    let classifier = SectionClassifier::new(state.llm.as_ref(), state.redis.as_ref());
    let assembled = assemble(
        state.llm.as_ref(),
        &classifier,
        AssembleInput {
            rfp: &rfp,
            section_titles: &request.section_titles,
            template: template.as_ref(),
            library: LibraryContext {
                company: company.as_ref(),
                team: &team,
                references: &references,
            },
            selection: &request.selection,
        },
    )
    .await?;

    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("Proposal for {}", rfp.title));

    let proposal = store::insert_proposal(
        &state.db,
        NewProposal {
            rfp_id: rfp.id,
            title: &title,
            sections: &assembled.sections,
            template_id: template.as_ref().map(|t| t.id),
            company_id,
            created_by: &user.user_id,
        },
    )
    .await?;

    info!(
        "Generated proposal {} for RFP {} with {} sections",
        proposal.id,
        rfp.id,
        proposal.sections.0.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            proposal,
            parse_confidence: assembled.parse_confidence,
            classifications: assembled.classifications,
        }),
    ))
}

/// GET /api/proposals
pub async fn handle_list_proposals(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProposalRow>>, AppError> {
    Ok(Json(store::list_proposals(&state.db, query.rfp_id).await?))
}

/// GET /api/proposals/:id
pub async fn handle_get_proposal(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProposalRow>, AppError> {
    let proposal = store::get_proposal(&state.db, id)
        .await?
        .ok_or_else(|| proposal_not_found(id))?;
    Ok(Json(proposal))
}

/// PUT /api/proposals/:id/sections
///
/// Partial edit: only the named sections change. Unknown names are added
/// before a trailing "References" section.
pub async fn handle_update_sections(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSectionsRequest>,
) -> Result<Json<ProposalRow>, AppError> {
    if request.sections.is_empty() {
        return Err(AppError::Validation(
            "sections must name at least one section".to_string(),
        ));
    }

    let proposal = store::get_proposal(&state.db, id)
        .await?
        .ok_or_else(|| proposal_not_found(id))?;

    let mut sections = proposal.sections.0;
    apply_section_edits(&mut sections, request.sections, Utc::now())?;

    let updated = store::update_sections(&state.db, id, &sections, &user.user_id)
        .await?
        .ok_or_else(|| proposal_not_found(id))?;
    Ok(Json(updated))
}

/// PUT /api/proposals/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ProposalRow>, AppError> {
    let updated = store::update_status(&state.db, id, request.status, &user.user_id)
        .await?
        .ok_or_else(|| proposal_not_found(id))?;
    info!("Proposal {id} moved to {}", request.status.as_str());
    Ok(Json(updated))
}

/// DELETE /api/proposals/:id
pub async fn handle_delete_proposal(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if store::delete_proposal(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(proposal_not_found(id))
    }
}

fn proposal_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Proposal {id} not found"))
}

/// Applies edits in request order. Title text is normalized into a contact block.
fn apply_section_edits(
    sections: &mut SectionMap,
    edits: IndexMap<String, SectionEdit>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    for (name, edit) in edits {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("section names cannot be blank".to_string()));
        }

        let content = match edit.content {
            SectionContent::Text(text) if name.eq_ignore_ascii_case(TITLE_SECTION) => {
                SectionContent::Contact(parse_title_text_to_object(&text))
            }
            other => other,
        };
        let section_type = edit.section_type.unwrap_or(SectionType::Custom);

        // Stored spelling wins; "budget" edits "Budget".
        let existing = sections
            .keys()
            .position(|key| key.trim().eq_ignore_ascii_case(&name));
        match existing
            .and_then(|index| sections.get_index_mut(index))
            .map(|(_, record)| record)
        {
            Some(record) => {
                record.content = content;
                record.section_type = section_type;
                record.last_modified = now;
                if edit.selected_ids.is_some() {
                    record.selected_ids = edit.selected_ids;
                }
            }
            None => {
                let index = insertion_index(sections.keys());
                sections.shift_insert(
                    index,
                    name,
                    SectionRecord {
                        content,
                        section_type,
                        last_modified: now,
                        selected_ids: edit.selected_ids,
                    },
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(text: &str, at: DateTime<Utc>) -> SectionRecord {
        SectionRecord {
            content: SectionContent::Text(text.to_string()),
            section_type: SectionType::AiGenerated,
            last_modified: at,
            selected_ids: None,
        }
    }

    fn existing(at: DateTime<Utc>) -> SectionMap {
        let mut map = SectionMap::new();
        map.insert("Title".to_string(), record("", at));
        map.insert("Executive Summary".to_string(), record("Old summary", at));
        map.insert("Budget".to_string(), record("Old budget", at));
        map.insert("References".to_string(), record("Refs", at));
        map
    }

    fn edit(text: &str) -> SectionEdit {
        SectionEdit {
            content: SectionContent::Text(text.to_string()),
            section_type: None,
            selected_ids: None,
        }
    }

    #[test]
    fn test_edit_touches_only_named_sections() {
        let before = Utc::now() - Duration::hours(1);
        let now = Utc::now();
        let mut sections = existing(before);

        let mut edits = IndexMap::new();
        edits.insert("Budget".to_string(), edit("New budget table"));
        apply_section_edits(&mut sections, edits, now).unwrap();

        let budget = &sections["Budget"];
        assert_eq!(budget.content.to_text(), "New budget table");
        assert_eq!(budget.section_type, SectionType::Custom);
        assert_eq!(budget.last_modified, now);

        let summary = &sections["Executive Summary"];
        assert_eq!(summary.content.to_text(), "Old summary");
        assert_eq!(summary.last_modified, before);
        assert_eq!(summary.section_type, SectionType::AiGenerated);
    }

    #[test]
    fn test_edit_matches_existing_section_case_insensitively() {
        let before = Utc::now() - Duration::hours(1);
        let now = Utc::now();
        let mut sections = existing(before);

        let mut edits = IndexMap::new();
        edits.insert(" budget ".to_string(), edit("Revised budget"));
        apply_section_edits(&mut sections, edits, now).unwrap();

        let keys: Vec<_> = sections.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["Title", "Executive Summary", "Budget", "References"]
        );
        assert_eq!(sections["Budget"].content.to_text(), "Revised budget");
        assert_eq!(sections["Budget"].last_modified, now);
    }

    #[test]
    fn test_new_section_lands_before_references() {
        let now = Utc::now();
        let mut sections = existing(now);

        let mut edits = IndexMap::new();
        edits.insert("Risk Management".to_string(), edit("Risk register attached."));
        apply_section_edits(&mut sections, edits, now).unwrap();

        let keys: Vec<_> = sections.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["Title", "Executive Summary", "Budget", "Risk Management", "References"]
        );
    }

    #[test]
    fn test_title_text_is_stored_as_contact() {
        let now = Utc::now();
        let mut sections = existing(now);

        let mut edits = IndexMap::new();
        edits.insert(
            "Title".to_string(),
            edit("Submitted by: Acme\nName: Jo\nEmail: jo@acme.example\nNumber: 555"),
        );
        apply_section_edits(&mut sections, edits, now).unwrap();

        match &sections["Title"].content {
            SectionContent::Contact(c) => {
                assert_eq!(c.submitted_by, "Acme");
                assert_eq!(c.number, "555");
            }
            other => panic!("expected contact, got {other:?}"),
        }
    }

    #[test]
    fn test_caller_supplied_type_and_selection_are_kept() {
        let now = Utc::now();
        let mut sections = existing(now);

        let mut edits = IndexMap::new();
        edits.insert(
            "References".to_string(),
            SectionEdit {
                content: SectionContent::Text("### Elm Bridge".to_string()),
                section_type: Some(SectionType::ContentLibrary),
                selected_ids: Some(vec!["r1".to_string()]),
            },
        );
        apply_section_edits(&mut sections, edits, now).unwrap();

        let refs = &sections["References"];
        assert_eq!(refs.section_type, SectionType::ContentLibrary);
        assert_eq!(refs.selected_ids, Some(vec!["r1".to_string()]));
    }

    #[test]
    fn test_blank_section_name_rejected() {
        let mut sections = existing(Utc::now());
        let mut edits = IndexMap::new();
        edits.insert("   ".to_string(), edit("text"));
        assert!(matches!(
            apply_section_edits(&mut sections, edits, Utc::now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_edit_request_deserializes_camel_case() {
        let request: UpdateSectionsRequest = serde_json::from_value(serde_json::json!({
            "sections": {
                "Key Personnel": {"content": "Alex", "type": "content-library", "selectedIds": ["m1"]}
            }
        }))
        .unwrap();
        let edit = &request.sections["Key Personnel"];
        assert_eq!(edit.section_type, Some(SectionType::ContentLibrary));
        assert_eq!(edit.selected_ids.as_deref(), Some(&["m1".to_string()][..]));
    }
}
