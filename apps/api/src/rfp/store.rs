use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::rfp::{Attachment, RfpRow};
use crate::rfp::analyzer::RfpFields;
use crate::rfp::deadlines::is_disqualified;

pub struct NewRfp<'a> {
    pub fields: &'a RfpFields,
    pub raw_text: &'a str,
    pub source_label: &'a str,
    pub attachments: Vec<Attachment>,
    pub created_by: &'a str,
}

/// Inserts a new RFP. The disqualification flag is computed here so every
/// save path applies it.
pub async fn insert_rfp(pool: &PgPool, id: Uuid, new: NewRfp<'_>) -> sqlx::Result<RfpRow> {
    let fields = new.fields;
    sqlx::query_as::<_, RfpRow>(
        r#"
        INSERT INTO rfps
            (id, title, client_name, submission_deadline, questions_deadline,
             pre_bid_meeting, award_date, budget_range, key_requirements, deliverables,
             evaluation_criteria, contact_information, raw_text, section_titles,
             attachments, source_label, is_disqualified, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.client_name)
    .bind(&fields.submission_deadline)
    .bind(&fields.questions_deadline)
    .bind(&fields.pre_bid_meeting)
    .bind(&fields.award_date)
    .bind(&fields.budget_range)
    .bind(&fields.key_requirements)
    .bind(&fields.deliverables)
    .bind(&fields.evaluation_criteria)
    .bind(&fields.contact_information)
    .bind(new.raw_text)
    .bind(&fields.section_titles)
    .bind(Json(new.attachments))
    .bind(new.source_label)
    .bind(is_disqualified(fields.deadlines(), Utc::now()))
    .bind(new.created_by)
    .fetch_one(pool)
    .await
}

pub async fn get_rfp(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<RfpRow>> {
    sqlx::query_as::<_, RfpRow>("SELECT * FROM rfps WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_rfps(pool: &PgPool) -> sqlx::Result<Vec<RfpRow>> {
    sqlx::query_as::<_, RfpRow>("SELECT * FROM rfps ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Rewrites the analyzed fields and recomputes disqualification.
pub async fn update_rfp(pool: &PgPool, id: Uuid, fields: &RfpFields) -> sqlx::Result<Option<RfpRow>> {
    sqlx::query_as::<_, RfpRow>(
        r#"
        UPDATE rfps SET
            title = $2, client_name = $3, submission_deadline = $4, questions_deadline = $5,
            pre_bid_meeting = $6, award_date = $7, budget_range = $8, key_requirements = $9,
            deliverables = $10, evaluation_criteria = $11, contact_information = $12,
            section_titles = $13, is_disqualified = $14, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.client_name)
    .bind(&fields.submission_deadline)
    .bind(&fields.questions_deadline)
    .bind(&fields.pre_bid_meeting)
    .bind(&fields.award_date)
    .bind(&fields.budget_range)
    .bind(&fields.key_requirements)
    .bind(&fields.deliverables)
    .bind(&fields.evaluation_criteria)
    .bind(&fields.contact_information)
    .bind(&fields.section_titles)
    .bind(is_disqualified(fields.deadlines(), Utc::now()))
    .fetch_optional(pool)
    .await
}

/// Appends to the attachment list; also a save, so disqualification is refreshed.
pub async fn add_attachment(
    pool: &PgPool,
    rfp: &RfpRow,
    attachment: &Attachment,
) -> sqlx::Result<Option<RfpRow>> {
    sqlx::query_as::<_, RfpRow>(
        r#"
        UPDATE rfps
        SET attachments = attachments || $2, is_disqualified = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(rfp.id)
    .bind(Json(vec![attachment]))
    .bind(is_disqualified(rfp.deadline_fields(), Utc::now()))
    .fetch_optional(pool)
    .await
}

pub async fn delete_rfp(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM rfps WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
