use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::template::{TemplateRow, TemplateSection};

pub struct TemplateData<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub project_type: &'a str,
    pub company_id: Option<&'a str>,
    pub is_active: bool,
    pub sections: &'a [TemplateSection],
}

pub async fn list_templates(
    pool: &PgPool,
    company_id: Option<&str>,
    project_type: Option<&str>,
) -> sqlx::Result<Vec<TemplateRow>> {
    sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT * FROM templates
        WHERE ($1::text IS NULL OR company_id = $1)
          AND ($2::text IS NULL OR project_type = $2)
        ORDER BY name
        "#,
    )
    .bind(company_id)
    .bind(project_type)
    .fetch_all(pool)
    .await
}

pub async fn get_template(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<TemplateRow>> {
    sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn active_template_for_company(
    pool: &PgPool,
    company_id: &str,
) -> sqlx::Result<Option<TemplateRow>> {
    sqlx::query_as::<_, TemplateRow>(
        "SELECT * FROM templates WHERE company_id = $1 AND is_active LIMIT 1",
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

/// Inserts a template. Activating it deactivates the company's previous
/// active template in the same transaction.
pub async fn insert_template(pool: &PgPool, data: TemplateData<'_>) -> sqlx::Result<TemplateRow> {
    let mut tx = pool.begin().await?;
    if data.is_active {
        deactivate_others(&mut tx, data.company_id, None).await?;
    }
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO templates (id, name, description, project_type, company_id, is_active, sections)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(data.name)
    .bind(data.description)
    .bind(data.project_type)
    .bind(data.company_id)
    .bind(data.is_active)
    .bind(Json(data.sections))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(row)
}

pub async fn update_template(
    pool: &PgPool,
    id: Uuid,
    data: TemplateData<'_>,
) -> sqlx::Result<Option<TemplateRow>> {
    let mut tx = pool.begin().await?;
    if data.is_active {
        deactivate_others(&mut tx, data.company_id, Some(id)).await?;
    }
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        UPDATE templates SET
            name = $2, description = $3, project_type = $4, company_id = $5,
            is_active = $6, sections = $7, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(data.name)
    .bind(data.description)
    .bind(data.project_type)
    .bind(data.company_id)
    .bind(data.is_active)
    .bind(Json(data.sections))
    .fetch_optional(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(row)
}

async fn deactivate_others(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Option<&str>,
    keep: Option<Uuid>,
) -> sqlx::Result<()> {
    let Some(company_id) = company_id else {
        return Ok(());
    };
    sqlx::query(
        r#"
        UPDATE templates SET is_active = FALSE, updated_at = NOW()
        WHERE company_id = $1 AND is_active AND ($2::uuid IS NULL OR id <> $2)
        "#,
    )
    .bind(company_id)
    .bind(keep)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete_template(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM templates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
