use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::proposal::{ProposalRow, ProposalStatus, SectionMap};

pub struct NewProposal<'a> {
    pub rfp_id: Uuid,
    pub title: &'a str,
    pub sections: &'a SectionMap,
    pub template_id: Option<Uuid>,
    pub company_id: Option<&'a str>,
    pub created_by: &'a str,
}

pub async fn insert_proposal(pool: &PgPool, new: NewProposal<'_>) -> sqlx::Result<ProposalRow> {
    sqlx::query_as::<_, ProposalRow>(
        r#"
        INSERT INTO proposals
            (id, rfp_id, title, status, sections, template_id, company_id,
             created_by, last_modified_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.rfp_id)
    .bind(new.title)
    .bind(ProposalStatus::Draft.as_str())
    .bind(Json(new.sections))
    .bind(new.template_id)
    .bind(new.company_id)
    .bind(new.created_by)
    .fetch_one(pool)
    .await
}

pub async fn get_proposal(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ProposalRow>> {
    sqlx::query_as::<_, ProposalRow>("SELECT * FROM proposals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Newest first, optionally restricted to one RFP.
pub async fn list_proposals(pool: &PgPool, rfp_id: Option<Uuid>) -> sqlx::Result<Vec<ProposalRow>> {
    sqlx::query_as::<_, ProposalRow>(
        r#"
        SELECT * FROM proposals
        WHERE ($1::uuid IS NULL OR rfp_id = $1)
        ORDER BY updated_at DESC
        "#,
    )
    .bind(rfp_id)
    .fetch_all(pool)
    .await
}

pub async fn update_sections(
    pool: &PgPool,
    id: Uuid,
    sections: &SectionMap,
    modified_by: &str,
) -> sqlx::Result<Option<ProposalRow>> {
    sqlx::query_as::<_, ProposalRow>(
        r#"
        UPDATE proposals
        SET sections = $2, last_modified_by = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(Json(sections))
    .bind(modified_by)
    .fetch_optional(pool)
    .await
}

pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: ProposalStatus,
    modified_by: &str,
) -> sqlx::Result<Option<ProposalRow>> {
    sqlx::query_as::<_, ProposalRow>(
        r#"
        UPDATE proposals
        SET status = $2, last_modified_by = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(modified_by)
    .fetch_optional(pool)
    .await
}

/// Returns false when no row matched.
pub async fn delete_proposal(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM proposals WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
