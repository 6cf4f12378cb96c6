use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Activity {
    #[schema(example = 1)]
    pub id: u64,
    pub school_id: u64,
    pub teacher_id: u64,
    #[schema(example = "Photosynthesis practical")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "JSS 2A")]
    pub class_name: String,
    #[schema(example = "Basic Science")]
    pub subject: String,
    #[schema(example = "2024-06-03", format = "date", value_type = String)]
    pub activity_date: NaiveDate,
    #[schema(example = "activities/2024/06/20240603101500_9f0c.pdf", nullable = true)]
    pub attachment_path: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}
