use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A file stored alongside an RFP (the original PDF or a later attachment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub s3_key: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RfpRow {
    pub id: Uuid,
    pub title: String,
    pub client_name: String,
    pub submission_deadline: String,
    pub questions_deadline: String,
    pub pre_bid_meeting: String,
    pub award_date: String,
    pub budget_range: String,
    pub key_requirements: Vec<String>,
    pub deliverables: Vec<String>,
    pub evaluation_criteria: Vec<String>,
    pub contact_information: String,
    pub raw_text: String,
    pub section_titles: Vec<String>,
    pub attachments: Json<Vec<Attachment>>,
    pub source_label: String,
    pub is_disqualified: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RfpRow {
    /// The four loosely-typed deadline fields, in the order they are checked.
    pub fn deadline_fields(&self) -> [&str; 4] {
        [
            &self.submission_deadline,
            &self.questions_deadline,
            &self.pre_bid_meeting,
            &self.award_date,
        ]
    }
}
