//! Axum route handlers for the RFP API.

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::llm_client::TextGenerator;
use crate::models::rfp::{Attachment, RfpRow};
use crate::rfp::analyzer::{analyze, RfpFields};
use crate::rfp::store::{self, NewRfp};
use crate::state::AppState;
use crate::storage::{put_object, sanitize_filename};

pub const MAX_RFP_PDF_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;
/// Extracted text shorter than this is treated as an empty document.
const MIN_TEXT_CHARS: usize = 50;

const ATTACHMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "text/plain",
    "text/csv",
    "image/png",
    "image/jpeg",
];

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeUrlRequest {
    pub url: String,
    #[serde(default = "default_true")]
    pub use_llm: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub text: String,
    #[serde(default)]
    pub source_label: Option<String>,
    #[serde(default = "default_true")]
    pub use_llm: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRfpRequest {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub submission_deadline: Option<String>,
    pub questions_deadline: Option<String>,
    pub pre_bid_meeting: Option<String>,
    pub award_date: Option<String>,
    pub budget_range: Option<String>,
    pub key_requirements: Option<Vec<String>>,
    pub deliverables: Option<Vec<String>>,
    pub evaluation_criteria: Option<Vec<String>>,
    pub contact_information: Option<String>,
    pub section_titles: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/rfp/upload
///
/// Multipart form: `file` (PDF, at most 10 MB) and optional `use_llm=false`.
pub async fn handle_upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RfpRow>), AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut use_llm = true;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = Some(read_file(field, MAX_RFP_PDF_BYTES).await?),
            Some("use_llm") => {
                let value = field.text().await.map_err(multipart_error)?;
                use_llm = !matches!(value.trim(), "false" | "0" | "no");
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("A PDF file is required".to_string()))?;
    let is_pdf = file.content_type == "application/pdf"
        || file.filename.to_ascii_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err(AppError::Validation("Only PDF files are accepted".to_string()));
    }

    let text = extract_pdf_text(file.bytes.clone()).await?;

    let id = Uuid::new_v4();
    let filename = sanitize_filename(&file.filename);
    let s3_key = format!("rfps/{id}/{filename}");
    put_object(
        &state.s3,
        &state.config.s3_bucket,
        &s3_key,
        file.bytes.to_vec(),
        "application/pdf",
    )
    .await?;

    let attachment = Attachment {
        s3_key,
        filename: filename.clone(),
        content_type: "application/pdf".to_string(),
        size_bytes: file.bytes.len() as i64,
        uploaded_at: Utc::now(),
    };

    let fields = analyze(llm_if(&state, use_llm), &text, &filename).await;
    let rfp = store::insert_rfp(
        &state.db,
        id,
        NewRfp {
            fields: &fields,
            raw_text: &text,
            source_label: &filename,
            attachments: vec![attachment],
            created_by: &user.user_id,
        },
    )
    .await?;

    info!("Created RFP {} from upload '{}'", rfp.id, filename);
    Ok((StatusCode::CREATED, Json(rfp)))
}

/// POST /api/rfp/analyze-url
pub async fn handle_analyze_url(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AnalyzeUrlRequest>,
) -> Result<(StatusCode, Json<RfpRow>), AppError> {
    let url = url::Url::parse(request.url.trim())
        .map_err(|e| AppError::Validation(format!("Invalid url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation("url must be http or https".to_string()));
    }

    let response = state
        .http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| upstream(format!("Failed to fetch {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(upstream(format!(
            "Fetching {url} returned status {}",
            response.status()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let body = response
        .bytes()
        .await
        .map_err(|e| upstream(format!("Failed to read {url}: {e}")))?;

    let text = if content_type.contains("application/pdf") {
        if body.len() > MAX_RFP_PDF_BYTES {
            return Err(AppError::PayloadTooLarge(
                "Linked PDF exceeds the 10 MB limit".to_string(),
            ));
        }
        extract_pdf_text(body).await?
    } else {
        html_to_text(&String::from_utf8_lossy(&body))
    };
    ensure_enough_text(&text)?;

    let source_label = url.to_string();
    let fields = analyze(llm_if(&state, request.use_llm), &text, &source_label).await;
    let rfp = store::insert_rfp(
        &state.db,
        Uuid::new_v4(),
        NewRfp {
            fields: &fields,
            raw_text: &text,
            source_label: &source_label,
            attachments: Vec::new(),
            created_by: &user.user_id,
        },
    )
    .await?;

    info!("Created RFP {} from {}", rfp.id, source_label);
    Ok((StatusCode::CREATED, Json(rfp)))
}

/// POST /api/rfp/analyze-text
pub async fn handle_analyze_text(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AnalyzeTextRequest>,
) -> Result<(StatusCode, Json<RfpRow>), AppError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    let source_label = request
        .source_label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| "pasted text".to_string());

    let fields = analyze(llm_if(&state, request.use_llm), text, &source_label).await;
    let rfp = store::insert_rfp(
        &state.db,
        Uuid::new_v4(),
        NewRfp {
            fields: &fields,
            raw_text: text,
            source_label: &source_label,
            attachments: Vec::new(),
            created_by: &user.user_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(rfp)))
}

/// GET /api/rfp
pub async fn handle_list_rfps(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<RfpRow>>, AppError> {
    Ok(Json(store::list_rfps(&state.db).await?))
}

/// GET /api/rfp/:id
pub async fn handle_get_rfp(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RfpRow>, AppError> {
    let rfp = store::get_rfp(&state.db, id)
        .await?
        .ok_or_else(|| rfp_not_found(id))?;
    Ok(Json(rfp))
}

/// PUT /api/rfp/:id
pub async fn handle_update_rfp(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRfpRequest>,
) -> Result<Json<RfpRow>, AppError> {
    let existing = store::get_rfp(&state.db, id)
        .await?
        .ok_or_else(|| rfp_not_found(id))?;

    let mut fields = RfpFields::from(&existing);
    apply_update(&mut fields, request);

    let updated = store::update_rfp(&state.db, id, &fields)
        .await?
        .ok_or_else(|| rfp_not_found(id))?;
    if updated.is_disqualified != existing.is_disqualified {
        info!("RFP {id} disqualification changed to {}", updated.is_disqualified);
    }
    Ok(Json(updated))
}

/// DELETE /api/rfp/:id
pub async fn handle_delete_rfp(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if store::delete_rfp(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(rfp_not_found(id))
    }
}

/// POST /api/rfp/:id/attachments
///
/// Multipart form with a single `file` field, at most 50 MB.
pub async fn handle_add_attachment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RfpRow>), AppError> {
    let rfp = store::get_rfp(&state.db, id)
        .await?
        .ok_or_else(|| rfp_not_found(id))?;

    let mut file: Option<UploadedFile> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            file = Some(read_file(field, MAX_ATTACHMENT_BYTES).await?);
        }
    }
    let file = file.ok_or_else(|| AppError::Validation("A file is required".to_string()))?;

    if !ATTACHMENT_TYPES.contains(&file.content_type.as_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported attachment type '{}'",
            file.content_type
        )));
    }

    let filename = sanitize_filename(&file.filename);
    let s3_key = format!("rfps/{id}/attachments/{}-{filename}", Uuid::new_v4());
    put_object(
        &state.s3,
        &state.config.s3_bucket,
        &s3_key,
        file.bytes.to_vec(),
        &file.content_type,
    )
    .await?;

    let attachment = Attachment {
        s3_key,
        filename,
        content_type: file.content_type,
        size_bytes: file.bytes.len() as i64,
        uploaded_at: Utc::now(),
    };
    let updated = store::add_attachment(&state.db, &rfp, &attachment)
        .await?
        .ok_or_else(|| rfp_not_found(id))?;

    Ok((StatusCode::CREATED, Json(updated)))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn rfp_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("RFP {id} not found"))
}

fn upstream(message: String) -> AppError {
    AppError::Upstream {
        message,
        details: None,
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

fn llm_if(state: &AppState, use_llm: bool) -> Option<&dyn TextGenerator> {
    use_llm.then(|| state.llm.as_ref())
}

async fn read_file(field: Field<'_>, limit: usize) -> Result<UploadedFile, AppError> {
    let filename = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    let bytes = field.bytes().await.map_err(multipart_error)?;
    if bytes.len() > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "'{filename}' is {} bytes; the limit is {} MB",
            bytes.len(),
            limit / (1024 * 1024)
        )));
    }
    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}

/// PDF text extraction is CPU-bound; run it off the async workers.
async fn extract_pdf_text(bytes: Bytes) -> Result<String, AppError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
        .map_err(|e| {
            warn!("PDF text extraction failed: {e}");
            AppError::Validation("Could not read text from the PDF".to_string())
        })?;
    ensure_enough_text(&text)?;
    Ok(text)
}

fn ensure_enough_text(text: &str) -> Result<(), AppError> {
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(AppError::Validation(
            "The document contains too little readable text to analyze".to_string(),
        ));
    }
    Ok(())
}

fn apply_update(fields: &mut RfpFields, request: UpdateRfpRequest) {
    let UpdateRfpRequest {
        title,
        client_name,
        submission_deadline,
        questions_deadline,
        pre_bid_meeting,
        award_date,
        budget_range,
        key_requirements,
        deliverables,
        evaluation_criteria,
        contact_information,
        section_titles,
    } = request;

    let scalars = [
        (title, &mut fields.title),
        (client_name, &mut fields.client_name),
        (submission_deadline, &mut fields.submission_deadline),
        (questions_deadline, &mut fields.questions_deadline),
        (pre_bid_meeting, &mut fields.pre_bid_meeting),
        (award_date, &mut fields.award_date),
        (budget_range, &mut fields.budget_range),
        (contact_information, &mut fields.contact_information),
    ];
    for (value, target) in scalars {
        if let Some(value) = value {
            *target = value.trim().to_string();
        }
    }

    let lists = [
        (key_requirements, &mut fields.key_requirements),
        (deliverables, &mut fields.deliverables),
        (evaluation_criteria, &mut fields.evaluation_criteria),
        (section_titles, &mut fields.section_titles),
    ];
    for (value, target) in lists {
        if let Some(value) = value {
            *target = value;
        }
    }
}

/// Visible text of an HTML page, one block per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let skip = ["script", "style", "noscript", "nav", "header", "footer", "template"];

    let root = ["main", "article", "body"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines: Vec<String> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| skip.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::library_sections::fixtures::rfp;

    #[test]
    fn test_html_to_text_drops_scripts_and_chrome() {
        let html = r#"<html><head><style>p{}</style></head><body>
            <nav>Home | About</nav>
            <h1>Request for Proposals: Park Lighting</h1>
            <p>Proposals are   due June 1, 2099.</p>
            <script>var x = 1;</script>
            <footer>Copyright</footer>
        </body></html>"#;
        let text = html_to_text(html);
        assert_eq!(
            text,
            "Request for Proposals: Park Lighting\nProposals are due June 1, 2099."
        );
    }

    #[test]
    fn test_html_to_text_prefers_main_content() {
        let html = "<body><div>Sidebar</div><main><p>Scope of work</p></main></body>";
        assert_eq!(html_to_text(html), "Scope of work");
    }

    #[test]
    fn test_apply_update_changes_only_supplied_fields() {
        let row = rfp();
        let mut fields = RfpFields::from(&row);
        apply_update(
            &mut fields,
            UpdateRfpRequest {
                submission_deadline: Some(" 2020-01-01 ".to_string()),
                deliverables: Some(vec!["Final plans".to_string()]),
                ..Default::default()
            },
        );
        assert_eq!(fields.submission_deadline, "2020-01-01");
        assert_eq!(fields.deliverables, vec!["Final plans"]);
        assert_eq!(fields.title, row.title);
        assert_eq!(fields.key_requirements, row.key_requirements);
    }

    #[test]
    fn test_too_little_text_is_rejected() {
        assert!(matches!(
            ensure_enough_text("   tiny   "),
            Err(AppError::Validation(_))
        ));
        assert!(ensure_enough_text(&"word ".repeat(20)).is_ok());
    }
}
