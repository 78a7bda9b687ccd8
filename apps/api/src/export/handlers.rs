//! Axum route handlers for proposal downloads.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::export::{docx, markdown, pdf, ExportFormat};
use crate::models::proposal::ProposalRow;
use crate::proposal::store as proposal_store;
use crate::state::AppState;
use crate::storage::{put_object, sanitize_filename};

/// GET /api/proposals/:id/export/markdown
pub async fn handle_export_markdown(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let proposal = load_proposal(&state, id).await?;
    let text = markdown::render_markdown(&proposal.sections.0);
    store_and_download(&state, &proposal, ExportFormat::Markdown, text.into_bytes()).await
}

/// GET /api/proposals/:id/export/docx
pub async fn handle_export_docx(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let proposal = load_proposal(&state, id).await?;
    let bytes = docx::build_docx(&proposal.sections.0)?;
    store_and_download(&state, &proposal, ExportFormat::Docx, bytes).await
}

/// GET /api/proposals/:id/export/pdf
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let proposal = load_proposal(&state, id).await?;
    let docx_bytes = docx::build_docx(&proposal.sections.0)?;
    let filename = download_name(&proposal, ExportFormat::Docx);
    let bytes = pdf::convert_docx_to_pdf(
        &state.http,
        &state.config.pdf_service_url,
        &filename,
        docx_bytes,
    )
    .await?;
    store_and_download(&state, &proposal, ExportFormat::Pdf, bytes).await
}

async fn load_proposal(state: &AppState, id: Uuid) -> Result<ProposalRow, AppError> {
    proposal_store::get_proposal(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proposal {id} not found")))
}

async fn store_and_download(
    state: &AppState,
    proposal: &ProposalRow,
    format: ExportFormat,
    bytes: Vec<u8>,
) -> Result<Response, AppError> {
    put_object(
        &state.s3,
        &state.config.s3_bucket,
        &export_key(proposal.id, format),
        bytes.clone(),
        format.content_type(),
    )
    .await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_name(proposal, format)
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn export_key(proposal_id: Uuid, format: ExportFormat) -> String {
    format!(
        "exports/{proposal_id}/{}.{}",
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
        format.extension()
    )
}

fn download_name(proposal: &ProposalRow, format: ExportFormat) -> String {
    format!(
        "{}.{}",
        sanitize_filename(&proposal.title),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_key_layout() {
        let id = Uuid::new_v4();
        let key = export_key(id, ExportFormat::Pdf);
        assert!(key.starts_with(&format!("exports/{id}/")));
        assert!(key.ends_with(".pdf"));
    }
}
