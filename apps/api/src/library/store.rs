use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::library::{CompanyRow, ProjectReferenceRow, TeamMemberRow};

/// Create / update payload. On update, absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct CompanyInput {
    pub company_id: Option<String>,
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub established: Option<i32>,
    pub employee_count: Option<i32>,
    pub headquarters: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub services: Option<Vec<String>>,
    pub specializations: Option<Vec<String>>,
    pub cover_letter: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamMemberInput {
    pub member_id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i32>,
    pub education: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub photo_url: Option<String>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferenceInput {
    pub reference_id: Option<String>,
    pub organization: Option<String>,
    pub project_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub scope: Option<String>,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub is_active: Option<bool>,
}

/// Stable id from a display name: lowercase ASCII words joined by `-`.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Caller-supplied id when present, otherwise `prefix` plus a random suffix.
pub fn entity_id(supplied: Option<&str>, prefix: &str) -> String {
    supplied
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12]))
}

// ────────────────────────────────────────────────────────────────────────────
// Companies
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_companies(pool: &PgPool) -> sqlx::Result<Vec<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_company(pool: &PgPool, company_id: &str) -> sqlx::Result<Option<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE company_id = $1")
        .bind(company_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_company(
    pool: &PgPool,
    company_id: &str,
    name: &str,
    input: &CompanyInput,
) -> sqlx::Result<CompanyRow> {
    sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies
            (company_id, name, tagline, description, established, employee_count,
             headquarters, email, phone, website, services, specializations,
             cover_letter, logo_url)
        VALUES ($1, $2, $3, COALESCE($4, ''), $5, $6, $7, $8, $9, $10,
                COALESCE($11, '{}'), COALESCE($12, '{}'), $13, $14)
        RETURNING *
        "#,
    )
    .bind(company_id)
    .bind(name)
    .bind(&input.tagline)
    .bind(&input.description)
    .bind(input.established)
    .bind(input.employee_count)
    .bind(&input.headquarters)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.website)
    .bind(&input.services)
    .bind(&input.specializations)
    .bind(&input.cover_letter)
    .bind(&input.logo_url)
    .fetch_one(pool)
    .await
}

pub async fn update_company(
    pool: &PgPool,
    company_id: &str,
    input: &CompanyInput,
) -> sqlx::Result<Option<CompanyRow>> {
    sqlx::query_as::<_, CompanyRow>(
        r#"
        UPDATE companies SET
            name = COALESCE($2, name),
            tagline = COALESCE($3, tagline),
            description = COALESCE($4, description),
            established = COALESCE($5, established),
            employee_count = COALESCE($6, employee_count),
            headquarters = COALESCE($7, headquarters),
            email = COALESCE($8, email),
            phone = COALESCE($9, phone),
            website = COALESCE($10, website),
            services = COALESCE($11, services),
            specializations = COALESCE($12, specializations),
            cover_letter = COALESCE($13, cover_letter),
            logo_url = COALESCE($14, logo_url),
            updated_at = NOW()
        WHERE company_id = $1
        RETURNING *
        "#,
    )
    .bind(company_id)
    .bind(&input.name)
    .bind(&input.tagline)
    .bind(&input.description)
    .bind(input.established)
    .bind(input.employee_count)
    .bind(&input.headquarters)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.website)
    .bind(&input.services)
    .bind(&input.specializations)
    .bind(&input.cover_letter)
    .bind(&input.logo_url)
    .fetch_optional(pool)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// Team members
// ────────────────────────────────────────────────────────────────────────────

/// Every member of a company (active or not), in display order.
pub async fn list_team(pool: &PgPool, company_id: &str) -> sqlx::Result<Vec<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE company_id = $1 ORDER BY display_order, name",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_team_member(
    pool: &PgPool,
    company_id: &str,
    member_id: &str,
    name: &str,
    title: &str,
    input: &TeamMemberInput,
) -> sqlx::Result<TeamMemberRow> {
    sqlx::query_as::<_, TeamMemberRow>(
        r#"
        INSERT INTO team_members
            (member_id, company_id, name, title, bio, experience_years, education,
             certifications, photo_url, is_active, display_order)
        VALUES ($1, $2, $3, $4, COALESCE($5, ''), $6, COALESCE($7, '{}'),
                COALESCE($8, '{}'), $9, COALESCE($10, TRUE), COALESCE($11, 0))
        RETURNING *
        "#,
    )
    .bind(member_id)
    .bind(company_id)
    .bind(name)
    .bind(title)
    .bind(&input.bio)
    .bind(input.experience_years)
    .bind(&input.education)
    .bind(&input.certifications)
    .bind(&input.photo_url)
    .bind(input.is_active)
    .bind(input.display_order)
    .fetch_one(pool)
    .await
}

pub async fn update_team_member(
    pool: &PgPool,
    member_id: &str,
    input: &TeamMemberInput,
) -> sqlx::Result<Option<TeamMemberRow>> {
    sqlx::query_as::<_, TeamMemberRow>(
        r#"
        UPDATE team_members SET
            name = COALESCE($2, name),
            title = COALESCE($3, title),
            bio = COALESCE($4, bio),
            experience_years = COALESCE($5, experience_years),
            education = COALESCE($6, education),
            certifications = COALESCE($7, certifications),
            photo_url = COALESCE($8, photo_url),
            is_active = COALESCE($9, is_active),
            display_order = COALESCE($10, display_order)
        WHERE member_id = $1
        RETURNING *
        "#,
    )
    .bind(member_id)
    .bind(&input.name)
    .bind(&input.title)
    .bind(&input.bio)
    .bind(input.experience_years)
    .bind(&input.education)
    .bind(&input.certifications)
    .bind(&input.photo_url)
    .bind(input.is_active)
    .bind(input.display_order)
    .fetch_optional(pool)
    .await
}

pub async fn delete_team_member(pool: &PgPool, member_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM team_members WHERE member_id = $1")
        .bind(member_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ────────────────────────────────────────────────────────────────────────────
// Project references
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_references(
    pool: &PgPool,
    company_id: &str,
) -> sqlx::Result<Vec<ProjectReferenceRow>> {
    sqlx::query_as::<_, ProjectReferenceRow>(
        "SELECT * FROM project_references WHERE company_id = $1 ORDER BY created_at",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_reference(
    pool: &PgPool,
    company_id: &str,
    reference_id: &str,
    organization: &str,
    project_name: &str,
    input: &ReferenceInput,
) -> sqlx::Result<ProjectReferenceRow> {
    sqlx::query_as::<_, ProjectReferenceRow>(
        r#"
        INSERT INTO project_references
            (reference_id, company_id, organization, project_name, contact_name,
             contact_email, contact_phone, scope, timeline, budget, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, ''), $9, $10, COALESCE($11, TRUE))
        RETURNING *
        "#,
    )
    .bind(reference_id)
    .bind(company_id)
    .bind(organization)
    .bind(project_name)
    .bind(&input.contact_name)
    .bind(&input.contact_email)
    .bind(&input.contact_phone)
    .bind(&input.scope)
    .bind(&input.timeline)
    .bind(&input.budget)
    .bind(input.is_active)
    .fetch_one(pool)
    .await
}

pub async fn update_reference(
    pool: &PgPool,
    reference_id: &str,
    input: &ReferenceInput,
) -> sqlx::Result<Option<ProjectReferenceRow>> {
    sqlx::query_as::<_, ProjectReferenceRow>(
        r#"
        UPDATE project_references SET
            organization = COALESCE($2, organization),
            project_name = COALESCE($3, project_name),
            contact_name = COALESCE($4, contact_name),
            contact_email = COALESCE($5, contact_email),
            contact_phone = COALESCE($6, contact_phone),
            scope = COALESCE($7, scope),
            timeline = COALESCE($8, timeline),
            budget = COALESCE($9, budget),
            is_active = COALESCE($10, is_active)
        WHERE reference_id = $1
        RETURNING *
        "#,
    )
    .bind(reference_id)
    .bind(&input.organization)
    .bind(&input.project_name)
    .bind(&input.contact_name)
    .bind(&input.contact_email)
    .bind(&input.contact_phone)
    .bind(&input.scope)
    .bind(&input.timeline)
    .bind(&input.budget)
    .bind(input.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_reference(pool: &PgPool, reference_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM project_references WHERE reference_id = $1")
        .bind(reference_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
