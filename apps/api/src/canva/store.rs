use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::canva::{
    CanvaAssetLinkRow, CanvaCompanyTemplateRow, CanvaConnectionRow, CanvaProposalDesignRow,
    FieldMapping,
};

/// Verifiers older than this are ignored on callback.
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

pub async fn upsert_connection(
    pool: &PgPool,
    user_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    scope: Option<&str>,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<CanvaConnectionRow> {
    sqlx::query_as::<_, CanvaConnectionRow>(
        r#"
        INSERT INTO canva_connections (user_id, access_token, refresh_token, scope, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE SET
            access_token = EXCLUDED.access_token,
            refresh_token = EXCLUDED.refresh_token,
            scope = EXCLUDED.scope,
            expires_at = EXCLUDED.expires_at,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(scope)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

pub async fn get_connection(
    pool: &PgPool,
    user_id: &str,
) -> sqlx::Result<Option<CanvaConnectionRow>> {
    sqlx::query_as::<_, CanvaConnectionRow>("SELECT * FROM canva_connections WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_oauth_state(
    pool: &PgPool,
    state_id: Uuid,
    user_id: &str,
    code_verifier: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO canva_oauth_states (state_id, user_id, code_verifier) VALUES ($1, $2, $3)",
    )
    .bind(state_id)
    .bind(user_id)
    .bind(code_verifier)
    .execute(pool)
    .await?;
    Ok(())
}

/// Consumes a stored PKCE verifier; each state can be redeemed once.
pub async fn take_oauth_state(
    pool: &PgPool,
    state_id: Uuid,
    user_id: &str,
) -> sqlx::Result<Option<String>> {
    let cutoff = Utc::now() - Duration::minutes(OAUTH_STATE_TTL_MINUTES);
    sqlx::query_scalar::<_, String>(
        r#"
        DELETE FROM canva_oauth_states
        WHERE state_id = $1 AND user_id = $2 AND created_at >= $3
        RETURNING code_verifier
        "#,
    )
    .bind(state_id)
    .bind(user_id)
    .bind(cutoff)
    .fetch_optional(pool)
    .await
}

pub async fn get_asset_link(
    pool: &PgPool,
    owner_type: &str,
    owner_id: &str,
    source_url: &str,
) -> sqlx::Result<Option<CanvaAssetLinkRow>> {
    sqlx::query_as::<_, CanvaAssetLinkRow>(
        r#"
        SELECT * FROM canva_asset_links
        WHERE owner_type = $1 AND owner_id = $2 AND source_url = $3
        "#,
    )
    .bind(owner_type)
    .bind(owner_id)
    .bind(source_url)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_asset_link(
    pool: &PgPool,
    owner_type: &str,
    owner_id: &str,
    source_url: &str,
    asset_id: &str,
) -> sqlx::Result<CanvaAssetLinkRow> {
    sqlx::query_as::<_, CanvaAssetLinkRow>(
        r#"
        INSERT INTO canva_asset_links (owner_type, owner_id, source_url, asset_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (owner_type, owner_id, source_url) DO UPDATE SET
            asset_id = EXCLUDED.asset_id
        RETURNING *
        "#,
    )
    .bind(owner_type)
    .bind(owner_id)
    .bind(source_url)
    .bind(asset_id)
    .fetch_one(pool)
    .await
}

pub async fn get_company_template(
    pool: &PgPool,
    company_id: &str,
) -> sqlx::Result<Option<CanvaCompanyTemplateRow>> {
    sqlx::query_as::<_, CanvaCompanyTemplateRow>(
        "SELECT * FROM canva_company_templates WHERE company_id = $1",
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_company_template(
    pool: &PgPool,
    company_id: &str,
    brand_template_id: &str,
    field_mapping: &FieldMapping,
) -> sqlx::Result<CanvaCompanyTemplateRow> {
    sqlx::query_as::<_, CanvaCompanyTemplateRow>(
        r#"
        INSERT INTO canva_company_templates (company_id, brand_template_id, field_mapping)
        VALUES ($1, $2, $3)
        ON CONFLICT (company_id) DO UPDATE SET
            brand_template_id = EXCLUDED.brand_template_id,
            field_mapping = EXCLUDED.field_mapping,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(company_id)
    .bind(brand_template_id)
    .bind(Json(field_mapping))
    .fetch_one(pool)
    .await
}

pub async fn get_proposal_design(
    pool: &PgPool,
    proposal_id: Uuid,
    company_id: &str,
    brand_template_id: &str,
) -> sqlx::Result<Option<CanvaProposalDesignRow>> {
    sqlx::query_as::<_, CanvaProposalDesignRow>(
        r#"
        SELECT * FROM canva_proposal_designs
        WHERE proposal_id = $1 AND company_id = $2 AND brand_template_id = $3
        "#,
    )
    .bind(proposal_id)
    .bind(company_id)
    .bind(brand_template_id)
    .fetch_optional(pool)
    .await
}

/// Last write wins.
pub async fn upsert_proposal_design(
    pool: &PgPool,
    row: &CanvaProposalDesignRow,
) -> sqlx::Result<CanvaProposalDesignRow> {
    sqlx::query_as::<_, CanvaProposalDesignRow>(
        r#"
        INSERT INTO canva_proposal_designs (
            proposal_id, company_id, brand_template_id, design_id,
            edit_url, view_url, export_url, last_proposal_updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (proposal_id, company_id, brand_template_id) DO UPDATE SET
            design_id = EXCLUDED.design_id,
            edit_url = EXCLUDED.edit_url,
            view_url = EXCLUDED.view_url,
            export_url = EXCLUDED.export_url,
            last_proposal_updated_at = EXCLUDED.last_proposal_updated_at,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(row.proposal_id)
    .bind(&row.company_id)
    .bind(&row.brand_template_id)
    .bind(&row.design_id)
    .bind(&row.edit_url)
    .bind(&row.view_url)
    .bind(&row.export_url)
    .bind(row.last_proposal_updated_at)
    .fetch_one(pool)
    .await
}

pub async fn set_design_export_url(
    pool: &PgPool,
    proposal_id: Uuid,
    design_id: &str,
    export_url: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE canva_proposal_designs SET export_url = $3, updated_at = NOW()
        WHERE proposal_id = $1 AND design_id = $2
        "#,
    )
    .bind(proposal_id)
    .bind(design_id)
    .bind(export_url)
    .execute(pool)
    .await?;
    Ok(())
}
