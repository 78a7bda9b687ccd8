//! Design generation against a live Canva connection: access tokens, cached
//! image assets, dataset inputs and the autofill job.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::canva::dataset::{build_dataset_values, DatasetContext};
use crate::canva::design_cache::{DesignGenerator, GeneratedDesign};
use crate::canva::polling::{poll_job, ASSET_UPLOAD, AUTOFILL};
use crate::canva::store;
use crate::errors::AppError;
use crate::library::store as library_store;
use crate::models::canva::CanvaCompanyTemplateRow;
use crate::models::library::{CompanyRow, ProjectReferenceRow, TeamMemberRow};
use crate::models::proposal::ProposalRow;
use crate::models::rfp::RfpRow;
use crate::proposal::library_sections::active_in_order;
use crate::state::AppState;

const COMPANY_OWNER: &str = "company";
const TEAM_MEMBER_OWNER: &str = "team_member";

/// Returns the caller's stored access token if it has not expired.
pub async fn access_token(state: &AppState, user_id: &str) -> Result<String, AppError> {
    let connection = store::get_connection(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Canva account is not connected".to_string()))?;

    if connection.expires_at <= Utc::now() {
        return Err(AppError::Unauthorized(
            "Canva connection has expired; reconnect".to_string(),
        ));
    }
    Ok(connection.access_token)
}

/// Library data and uploaded images needed to fill a dataset.
#[derive(Debug, Default)]
pub struct DesignInputs {
    pub team: Vec<TeamMemberRow>,
    pub references: Vec<ProjectReferenceRow>,
    pub logo_asset_id: Option<String>,
    pub team_photo_asset_ids: HashMap<String, String>,
}

impl DesignInputs {
    pub fn with_context<R>(
        &self,
        proposal: &ProposalRow,
        rfp: &RfpRow,
        company: Option<&CompanyRow>,
        f: impl FnOnce(&DatasetContext<'_>) -> R,
    ) -> R {
        let team = active_in_order(&self.team, None);
        let references: Vec<&ProjectReferenceRow> =
            self.references.iter().filter(|r| r.is_active).collect();
        let ctx = DatasetContext {
            proposal,
            rfp,
            company,
            team: &team,
            references: &references,
            logo_asset_id: self.logo_asset_id.as_deref(),
            team_photo_asset_ids: &self.team_photo_asset_ids,
        };
        f(&ctx)
    }
}

/// Loads team, references and the logo asset concurrently, then team photos.
pub async fn load_inputs(
    state: &AppState,
    token: &str,
    company: &CompanyRow,
) -> Result<DesignInputs, AppError> {
    let (team, references, logo_asset_id) = tokio::try_join!(
        async {
            library_store::list_team(&state.db, &company.company_id)
                .await
                .map_err(AppError::from)
        },
        async {
            library_store::list_references(&state.db, &company.company_id)
                .await
                .map_err(AppError::from)
        },
        async {
            let logo = match company.logo_url.as_deref().filter(|u| !u.trim().is_empty()) {
                Some(url) => ensure_asset(state, token, COMPANY_OWNER, &company.company_id, url).await,
                None => None,
            };
            Ok::<_, AppError>(logo)
        },
    )?;

    let mut team_photo_asset_ids = HashMap::new();
    for member in active_in_order(&team, None) {
        let Some(url) = member.photo_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            continue;
        };
        if let Some(asset_id) =
            ensure_asset(state, token, TEAM_MEMBER_OWNER, &member.member_id, url).await
        {
            team_photo_asset_ids.insert(member.member_id.clone(), asset_id);
        }
    }

    Ok(DesignInputs {
        team,
        references,
        logo_asset_id,
        team_photo_asset_ids,
    })
}

/// Image uploads are best effort; a failure leaves the image field blank.
async fn ensure_asset(
    state: &AppState,
    token: &str,
    owner_type: &str,
    owner_id: &str,
    source_url: &str,
) -> Option<String> {
    match upload_cached_asset(state, token, owner_type, owner_id, source_url).await {
        Ok(asset_id) => Some(asset_id),
        Err(e) => {
            warn!("Could not upload {owner_type} {owner_id} image {source_url}: {e}");
            None
        }
    }
}

async fn upload_cached_asset(
    state: &AppState,
    token: &str,
    owner_type: &str,
    owner_id: &str,
    source_url: &str,
) -> Result<String, AppError> {
    if let Some(link) = store::get_asset_link(&state.db, owner_type, owner_id, source_url).await? {
        debug!("Asset cache hit for {owner_type} {owner_id}");
        return Ok(link.asset_id);
    }

    let bytes = fetch_image(&state.http, source_url).await?;
    let name = format!("{owner_type}-{owner_id}");
    let job = state.canva.create_asset_upload(token, &name, bytes).await?;

    let canva = &state.canva;
    let job_id = job.id.as_str();
    let asset_id = poll_job(ASSET_UPLOAD, move || async move {
        Ok(canva.get_asset_upload(token, job_id).await?.status())
    })
    .await?;

    store::upsert_asset_link(&state.db, owner_type, owner_id, source_url, &asset_id).await?;
    info!("Uploaded {owner_type} {owner_id} image as asset {asset_id}");
    Ok(asset_id)
}

async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, AppError> {
    let upstream = |e: reqwest::Error| AppError::Upstream {
        message: format!("Failed to download {url}: {e}"),
        details: None,
    };
    let response = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(upstream)?;
    let bytes = response.bytes().await.map_err(upstream)?;
    Ok(bytes.to_vec())
}

/// Builds the dataset for a proposal and runs an autofill job.
pub struct AutofillGenerator<'a> {
    pub state: &'a AppState,
    pub token: &'a str,
    pub binding: &'a CanvaCompanyTemplateRow,
    pub proposal: &'a ProposalRow,
    pub rfp: &'a RfpRow,
    pub company: &'a CompanyRow,
}

#[async_trait]
impl DesignGenerator for AutofillGenerator<'_> {
    async fn generate(&self) -> Result<GeneratedDesign, AppError> {
        let canva = &self.state.canva;
        let token = self.token;
        let brand_template_id = self.binding.brand_template_id.as_str();

        let (dataset, inputs) = tokio::try_join!(
            async {
                canva
                    .brand_template_dataset(token, brand_template_id)
                    .await
                    .map_err(AppError::from)
            },
            load_inputs(self.state, token, self.company),
        )?;

        let values = inputs.with_context(self.proposal, self.rfp, Some(self.company), |ctx| {
            build_dataset_values(&dataset, &self.binding.field_mapping.0, ctx)
        });
        if values.is_empty() {
            return Err(AppError::Validation(format!(
                "None of the {} fields of brand template {brand_template_id} could be filled",
                dataset.len()
            )));
        }
        info!(
            "Autofilling {} of {} fields for proposal {}",
            values.len(),
            dataset.len(),
            self.proposal.id
        );

        let job = canva
            .create_autofill(token, brand_template_id, &self.proposal.title, &values)
            .await?;
        let job_id = job.id.as_str();
        let design = poll_job(AUTOFILL, move || async move {
            Ok(canva.get_autofill(token, job_id).await?.status())
        })
        .await?;

        Ok(GeneratedDesign {
            design_id: design.id,
            edit_url: design.urls.edit_url,
            view_url: design.urls.view_url,
        })
    }
}
