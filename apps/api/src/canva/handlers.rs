//! Axum route handlers for the Canva integration.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::canva::client::{CanvaError, Pkce};
use crate::canva::dataset::{diagnose_dataset_values, FieldDiagnosis, FieldStatus};
use crate::canva::design::{access_token, load_inputs, AutofillGenerator};
use crate::canva::design_cache::{
    ensure_canva_design_for_proposal, DesignKey, EnsuredDesign, PgDesignCache,
};
use crate::canva::polling::{poll_job, EXPORT};
use crate::canva::{oauth, store};
use crate::errors::AppError;
use crate::library::store as library_store;
use crate::models::canva::{CanvaCompanyTemplateRow, FieldMapping};
use crate::models::library::CompanyRow;
use crate::models::proposal::ProposalRow;
use crate::models::rfp::RfpRow;
use crate::proposal::store as proposal_store;
use crate::rfp::store as rfp_store;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompanyTemplateRequest {
    pub brand_template_id: String,
    #[serde(default)]
    pub field_mapping: FieldMapping,
}

#[derive(Debug, Deserialize)]
pub struct DesignQuery {
    /// Defaults to the proposal's company.
    pub company_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnoseResponse {
    pub proposal_id: Uuid,
    pub company_id: String,
    pub brand_template_id: String,
    pub filled: usize,
    pub total: usize,
    pub fields: Vec<FieldDiagnosis>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub design_id: String,
    pub cached: bool,
    pub export_url: String,
    pub urls: Vec<String>,
}

/// GET /api/canva/connect
pub async fn handle_connect(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<Value>, AppError> {
    if !state.canva.is_configured() {
        return Err(CanvaError::NotConfigured.into());
    }
    let return_to = oauth::validate_return_to(query.return_to)?;

    let pkce = Pkce::generate();
    let state_id = Uuid::new_v4();
    store::insert_oauth_state(&state.db, state_id, &user.user_id, &pkce.verifier).await?;

    let signed_state = state.jwt.sign_state(&user.user_id, return_to, state_id)?;
    let authorize_url = state.canva.authorize_url(&signed_state, &pkce.challenge)?;

    Ok(Json(json!({ "authorize_url": authorize_url })))
}

/// GET /api/canva/callback
/// Unauthenticated: the caller is identified by the signed `state`.
pub async fn handle_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let signed_state = query
        .state
        .ok_or_else(|| AppError::Validation("Missing state parameter".to_string()))?;
    let claims = state.jwt.verify_state(&signed_state).map_err(|e| {
        debug!("Rejected OAuth state: {e}");
        AppError::Unauthorized("Invalid or expired OAuth state".to_string())
    })?;

    if let Some(error) = query.error {
        warn!("Canva authorization declined for user {}: {error}", claims.user_id);
        return Ok(oauth::finish(claims.return_to.as_deref(), Err(error.as_str())));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::Validation("Missing code parameter".to_string()))?;
    let verifier = store::take_oauth_state(&state.db, claims.state_id, &claims.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("OAuth state was already used or has expired".to_string())
        })?;

    let token = state.canva.exchange_code(&code, &verifier).await?;
    store::upsert_connection(
        &state.db,
        &claims.user_id,
        &token.access_token,
        token.refresh_token.as_deref(),
        token.scope.as_deref(),
        Utc::now() + Duration::seconds(token.expires_in),
    )
    .await?;

    info!("Connected Canva account for user {}", claims.user_id);
    Ok(oauth::finish(claims.return_to.as_deref(), Ok(())))
}

/// GET /api/canva/status
pub async fn handle_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let configured = state.canva.is_configured();
    let body = match store::get_connection(&state.db, &user.user_id).await? {
        None => json!({ "configured": configured, "connected": false }),
        Some(connection) => {
            let expired = connection.expires_at <= Utc::now();
            json!({
                "configured": configured,
                "connected": !expired,
                "expired": expired,
                "expires_at": connection.expires_at,
                "scope": connection.scope,
            })
        }
    };
    Ok(Json(body))
}

/// GET /api/canva/companies/:companyId/template
pub async fn handle_get_company_template(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
) -> Result<Json<CanvaCompanyTemplateRow>, AppError> {
    let binding = store::get_company_template(&state.db, &company_id)
        .await?
        .ok_or_else(|| binding_not_found(&company_id))?;
    Ok(Json(binding))
}

/// PUT /api/canva/companies/:companyId/template
pub async fn handle_put_company_template(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(company_id): Path<String>,
    Json(request): Json<CompanyTemplateRequest>,
) -> Result<Json<CanvaCompanyTemplateRow>, AppError> {
    let brand_template_id = request.brand_template_id.trim();
    if brand_template_id.is_empty() {
        return Err(AppError::Validation(
            "brand_template_id is required".to_string(),
        ));
    }
    library_store::get_company(&state.db, &company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {company_id} not found")))?;

    let binding = store::upsert_company_template(
        &state.db,
        &company_id,
        brand_template_id,
        &request.field_mapping,
    )
    .await?;
    info!(
        "Bound brand template {brand_template_id} to company {company_id} ({} mapped fields)",
        request.field_mapping.len()
    );
    Ok(Json(binding))
}

/// POST /api/canva/proposals/:id/diagnose
pub async fn handle_diagnose(
    State(state): State<AppState>,
    user: AuthUser,
    Path(proposal_id): Path<Uuid>,
    Query(query): Query<DesignQuery>,
) -> Result<Json<DiagnoseResponse>, AppError> {
    let ctx = DesignRequestContext::load(&state, &user, proposal_id, query.company_id).await?;

    let (dataset, inputs) = tokio::try_join!(
        async {
            state
                .canva
                .brand_template_dataset(&ctx.token, &ctx.binding.brand_template_id)
                .await
                .map_err(AppError::from)
        },
        load_inputs(&state, &ctx.token, &ctx.company),
    )?;

    let fields = inputs.with_context(&ctx.proposal, &ctx.rfp, Some(&ctx.company), |dc| {
        diagnose_dataset_values(&dataset, &ctx.binding.field_mapping.0, dc)
    });
    let filled = fields
        .iter()
        .filter(|f| f.status == FieldStatus::Filled)
        .count();

    Ok(Json(DiagnoseResponse {
        proposal_id,
        company_id: ctx.company.company_id.clone(),
        brand_template_id: ctx.binding.brand_template_id.clone(),
        filled,
        total: fields.len(),
        fields,
    }))
}

/// POST /api/canva/proposals/:id/create-design
pub async fn handle_create_design(
    State(state): State<AppState>,
    user: AuthUser,
    Path(proposal_id): Path<Uuid>,
    Query(query): Query<DesignQuery>,
) -> Result<Json<EnsuredDesign>, AppError> {
    let ctx = DesignRequestContext::load(&state, &user, proposal_id, query.company_id).await?;
    let ensured = ctx.ensure_design(&state).await?;
    Ok(Json(ensured))
}

/// POST /api/canva/proposals/:id/export
pub async fn handle_export_design(
    State(state): State<AppState>,
    user: AuthUser,
    Path(proposal_id): Path<Uuid>,
    Query(query): Query<DesignQuery>,
) -> Result<Json<ExportResponse>, AppError> {
    let ctx = DesignRequestContext::load(&state, &user, proposal_id, query.company_id).await?;
    let ensured = ctx.ensure_design(&state).await?;
    let design_id = ensured.design.design_id.as_str();

    let canva = &state.canva;
    let token = ctx.token.as_str();
    let job = canva.create_export(token, design_id).await?;
    let job_id = job.id.as_str();
    let urls = poll_job(EXPORT, move || async move {
        Ok(canva.get_export(token, job_id).await?.status())
    })
    .await?;

    let export_url = urls.first().cloned().ok_or_else(|| AppError::Upstream {
        message: "Export finished without a download URL".to_string(),
        details: None,
    })?;
    store::set_design_export_url(&state.db, proposal_id, design_id, &export_url).await?;
    info!("Exported design {design_id} for proposal {proposal_id}");

    Ok(Json(ExportResponse {
        design_id: design_id.to_string(),
        cached: ensured.cached,
        export_url,
        urls,
    }))
}

/// Records shared by the design endpoints.
struct DesignRequestContext {
    token: String,
    proposal: ProposalRow,
    rfp: RfpRow,
    company: CompanyRow,
    binding: CanvaCompanyTemplateRow,
}

impl DesignRequestContext {
    async fn load(
        state: &AppState,
        user: &AuthUser,
        proposal_id: Uuid,
        company_override: Option<String>,
    ) -> Result<Self, AppError> {
        let proposal = proposal_store::get_proposal(&state.db, proposal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {proposal_id} not found")))?;

        let company_id = company_override
            .or_else(|| proposal.company_id.clone())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(
                    "Proposal has no company; pass company_id".to_string(),
                )
            })?;

        let (token, rfp, company, binding) = tokio::try_join!(
            access_token(state, &user.user_id),
            async {
                rfp_store::get_rfp(&state.db, proposal.rfp_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("RFP {} not found", proposal.rfp_id)))
            },
            async {
                library_store::get_company(&state.db, &company_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Company {company_id} not found")))
            },
            async {
                store::get_company_template(&state.db, &company_id)
                    .await?
                    .ok_or_else(|| binding_not_found(&company_id))
            },
        )?;

        Ok(Self {
            token,
            proposal,
            rfp,
            company,
            binding,
        })
    }

    async fn ensure_design(&self, state: &AppState) -> Result<EnsuredDesign, AppError> {
        let cache = PgDesignCache { pool: &state.db };
        let generator = AutofillGenerator {
            state,
            token: &self.token,
            binding: &self.binding,
            proposal: &self.proposal,
            rfp: &self.rfp,
            company: &self.company,
        };
        let key = DesignKey {
            proposal_id: self.proposal.id,
            company_id: &self.company.company_id,
            brand_template_id: &self.binding.brand_template_id,
        };
        ensure_canva_design_for_proposal(&cache, &generator, key, self.proposal.updated_at).await
    }
}

fn binding_not_found(company_id: &str) -> AppError {
    AppError::NotFound(format!(
        "No Canva brand template is configured for company {company_id}"
    ))
}
