//! Axum route handlers for the Content Library API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::library::store::{
    self, entity_id, slugify, CompanyInput, ReferenceInput, TeamMemberInput,
};
use crate::models::library::{CompanyRow, ProjectReferenceRow, TeamMemberRow};
use crate::state::AppState;

/// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

// ────────────────────────────────────────────────────────────────────────────
// Companies
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/content/companies
pub async fn handle_list_companies(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<CompanyRow>>, AppError> {
    Ok(Json(store::list_companies(&state.db).await?))
}

/// POST /api/content/companies
pub async fn handle_create_company(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(input): Json<CompanyInput>,
) -> Result<(StatusCode, Json<CompanyRow>), AppError> {
    let name = required(input.name.as_deref(), "name")?;
    let company_id = match input.company_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => slugify(name),
    };
    if company_id.is_empty() {
        return Err(AppError::Validation(
            "company_id could not be derived from name".to_string(),
        ));
    }

    let company = store::insert_company(&state.db, &company_id, name, &input)
        .await
        .map_err(|e| conflict_as_validation(e, &format!("Company {company_id} already exists")))?;
    info!("Created company {}", company.company_id);
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /api/content/companies/:companyId
pub async fn handle_get_company(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
) -> Result<Json<CompanyRow>, AppError> {
    let company = store::get_company(&state.db, &company_id)
        .await?
        .ok_or_else(|| company_not_found(&company_id))?;
    Ok(Json(company))
}

/// PUT /api/content/companies/:companyId
pub async fn handle_update_company(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
    Json(input): Json<CompanyInput>,
) -> Result<Json<CompanyRow>, AppError> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("name cannot be blank".to_string()));
    }
    let company = store::update_company(&state.db, &company_id, &input)
        .await?
        .ok_or_else(|| company_not_found(&company_id))?;
    Ok(Json(company))
}

// ────────────────────────────────────────────────────────────────────────────
// Team members
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/content/companies/:companyId/team
pub async fn handle_list_team(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
) -> Result<Json<Vec<TeamMemberRow>>, AppError> {
    ensure_company(&state, &company_id).await?;
    Ok(Json(store::list_team(&state.db, &company_id).await?))
}

/// POST /api/content/companies/:companyId/team
pub async fn handle_create_team_member(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
    Json(input): Json<TeamMemberInput>,
) -> Result<(StatusCode, Json<TeamMemberRow>), AppError> {
    let name = required(input.name.as_deref(), "name")?;
    let title = required(input.title.as_deref(), "title")?;
    ensure_company(&state, &company_id).await?;

    let member_id = entity_id(input.member_id.as_deref(), "member");
    let member =
        store::insert_team_member(&state.db, &company_id, &member_id, name, title, &input)
            .await
            .map_err(|e| {
                conflict_as_validation(e, &format!("Team member {member_id} already exists"))
            })?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// PUT /api/content/team/:memberId
pub async fn handle_update_team_member(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(member_id): Path<String>,
    Json(input): Json<TeamMemberInput>,
) -> Result<Json<TeamMemberRow>, AppError> {
    let member = store::update_team_member(&state.db, &member_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team member {member_id} not found")))?;
    Ok(Json(member))
}

/// DELETE /api/content/team/:memberId
pub async fn handle_delete_team_member(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(member_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if store::delete_team_member(&state.db, &member_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Team member {member_id} not found")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Project references
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/content/companies/:companyId/references
pub async fn handle_list_references(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
) -> Result<Json<Vec<ProjectReferenceRow>>, AppError> {
    ensure_company(&state, &company_id).await?;
    Ok(Json(store::list_references(&state.db, &company_id).await?))
}

/// POST /api/content/companies/:companyId/references
pub async fn handle_create_reference(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
    Json(input): Json<ReferenceInput>,
) -> Result<(StatusCode, Json<ProjectReferenceRow>), AppError> {
    let organization = required(input.organization.as_deref(), "organization")?;
    let project_name = required(input.project_name.as_deref(), "project_name")?;
    ensure_company(&state, &company_id).await?;

    let reference_id = entity_id(input.reference_id.as_deref(), "ref");
    let reference = store::insert_reference(
        &state.db,
        &company_id,
        &reference_id,
        organization,
        project_name,
        &input,
    )
    .await
    .map_err(|e| conflict_as_validation(e, &format!("Reference {reference_id} already exists")))?;
    Ok((StatusCode::CREATED, Json(reference)))
}

/// PUT /api/content/references/:referenceId
pub async fn handle_update_reference(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(reference_id): Path<String>,
    Json(input): Json<ReferenceInput>,
) -> Result<Json<ProjectReferenceRow>, AppError> {
    let reference = store::update_reference(&state.db, &reference_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reference {reference_id} not found")))?;
    Ok(Json(reference))
}

/// DELETE /api/content/references/:referenceId
pub async fn handle_delete_reference(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(reference_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if store::delete_reference(&state.db, &reference_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Reference {reference_id} not found")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

fn company_not_found(company_id: &str) -> AppError {
    AppError::NotFound(format!("Company {company_id} not found"))
}

async fn ensure_company(state: &AppState, company_id: &str) -> Result<(), AppError> {
    store::get_company(&state.db, company_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| company_not_found(company_id))
}

fn conflict_as_validation(error: sqlx::Error, message: &str) -> AppError {
    let is_conflict = error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if is_conflict {
        AppError::Validation(message.to_string())
    } else {
        AppError::Database(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  Acme "), "name").unwrap(), "Acme");
        assert!(matches!(required(Some("   "), "name"), Err(AppError::Validation(_))));
        assert!(matches!(required(None, "name"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = conflict_as_validation(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, AppError::Database(_)));
    }
}
