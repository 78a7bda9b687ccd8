//! Axum route handlers for the Templates API.

use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::template::{TemplateRow, TemplateSection};
use crate::state::AppState;
use crate::templates::store::{self, TemplateData};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub company_id: Option<String>,
    pub project_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project_type: String,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub sections: Vec<TemplateSection>,
}

fn default_active() -> bool {
    true
}

impl TemplateRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.project_type.trim().is_empty() {
            return Err(AppError::Validation("project_type is required".to_string()));
        }
        if self.sections.is_empty() {
            return Err(AppError::Validation(
                "a template needs at least one section".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for section in &self.sections {
            let key = section.name.trim().to_lowercase();
            if key.is_empty() {
                return Err(AppError::Validation("section names cannot be blank".to_string()));
            }
            if !seen.insert(key) {
                return Err(AppError::Validation(format!(
                    "duplicate section '{}'",
                    section.name.trim()
                )));
            }
        }
        Ok(())
    }

    fn data(&self) -> TemplateData<'_> {
        TemplateData {
            name: self.name.trim(),
            description: &self.description,
            project_type: self.project_type.trim(),
            company_id: self
                .company_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty()),
            is_active: self.is_active,
            sections: &self.sections,
        }
    }
}

/// GET /api/templates
pub async fn handle_list_templates(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TemplateRow>>, AppError> {
    let templates = store::list_templates(
        &state.db,
        query.company_id.as_deref(),
        query.project_type.as_deref(),
    )
    .await?;
    Ok(Json(templates))
}

/// POST /api/templates
pub async fn handle_create_template(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<TemplateRow>), AppError> {
    request.validate()?;
    let template = store::insert_template(&state.db, request.data()).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/templates/:templateId
pub async fn handle_get_template(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateRow>, AppError> {
    let template = store::get_template(&state.db, id)
        .await?
        .ok_or_else(|| template_not_found(id))?;
    Ok(Json(template))
}

/// PUT /api/templates/:templateId
pub async fn handle_update_template(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TemplateRequest>,
) -> Result<Json<TemplateRow>, AppError> {
    request.validate()?;
    let template = store::update_template(&state.db, id, request.data())
        .await?
        .ok_or_else(|| template_not_found(id))?;
    Ok(Json(template))
}

/// DELETE /api/templates/:templateId
pub async fn handle_delete_template(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if store::delete_template(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(template_not_found(id))
    }
}

fn template_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Template {id} not found"))
}
