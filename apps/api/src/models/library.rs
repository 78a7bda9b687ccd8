use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct CompanyRow {
    pub company_id: String,
    pub name: String,
    pub tagline: Option<String>,
    pub description: String,
    pub established: Option<i32>,
    pub employee_count: Option<i32>,
    pub headquarters: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub services: Vec<String>,
    pub specializations: Vec<String>,
    pub cover_letter: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct TeamMemberRow {
    pub member_id: String,
    pub company_id: String,
    pub name: String,
    pub title: String,
    pub bio: String,
    pub experience_years: Option<i32>,
    pub education: Vec<String>,
    pub certifications: Vec<String>,
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct ProjectReferenceRow {
    pub reference_id: String,
    pub company_id: String,
    pub organization: String,
    pub project_name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub scope: String,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
