use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Waitlisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
    Waitlist,
}

impl ApplicationStatus {
    /// pending → approved | rejected | waitlisted, waitlisted → approved | rejected.
    /// Approved and rejected applications are final.
    pub fn apply(self, action: ReviewAction) -> Option<ApplicationStatus> {
        use ApplicationStatus::*;
        match (self, action) {
            (Pending | Waitlisted, ReviewAction::Approve) => Some(Approved),
            (Pending | Waitlisted, ReviewAction::Reject) => Some(Rejected),
            (Pending, ReviewAction::Waitlist) => Some(Waitlisted),
            _ => None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ApplicationSql {
    pub id: u64,
    pub school_id: u64,
    pub applicant_name: String,
    pub date_of_birth: NaiveDate,
    pub guardian_name: String,
    pub guardian_email: String,
    pub guardian_phone: String,
    pub class_applied: String,
    pub status: String,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Application {
    pub id: u64,
    pub applicant_name: String,
    #[schema(example = "2016-04-12", format = "date", value_type = String)]
    pub date_of_birth: NaiveDate,
    pub guardian_name: String,
    pub guardian_email: String,
    pub guardian_phone: String,
    #[schema(example = "Primary 3")]
    pub class_applied: String,
    pub status: ApplicationStatus,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub reviewed_at: Option<NaiveDateTime>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ApplicationSql> for Application {
    fn from(row: ApplicationSql) -> Self {
        Self {
            id: row.id,
            applicant_name: row.applicant_name,
            date_of_birth: row.date_of_birth,
            guardian_name: row.guardian_name,
            guardian_email: row.guardian_email,
            guardian_phone: row.guardian_phone,
            class_applied: row.class_applied,
            status: row.status.parse().unwrap_or(ApplicationStatus::Pending),
            review_notes: row.review_notes,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
        }
    }
}
