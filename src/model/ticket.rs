use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Answered,
    Closed,
}

impl TicketStatus {
    /// Status after a reply: support answering marks it answered, the owner reopens it.
    /// Closed tickets take no replies.
    pub fn after_reply(self, by_owner: bool) -> Option<TicketStatus> {
        match self {
            TicketStatus::Closed => None,
            _ if by_owner => Some(TicketStatus::Open),
            _ => Some(TicketStatus::Answered),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TicketSql {
    pub id: u64,
    pub school_id: u64,
    pub user_id: u64,
    pub subject: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TicketSql {
    pub fn status(&self) -> TicketStatus {
        self.status.parse().unwrap_or(TicketStatus::Open)
    }
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct TicketReply {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "Mrs. Bello")]
    pub author: String,
    pub message: String,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketResponse {
    pub id: u64,
    pub user_id: u64,
    pub subject: String,
    pub status: TicketStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub updated_at: Option<DateTime<Utc>>,
    pub replies: Vec<TicketReply>,
}

impl TicketResponse {
    pub fn new(ticket: TicketSql, replies: Vec<TicketReply>) -> Self {
        Self {
            status: ticket.status(),
            id: ticket.id,
            user_id: ticket.user_id,
            subject: ticket.subject,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
            replies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_reply_marks_answered() {
        assert_eq!(TicketStatus::Open.after_reply(false), Some(TicketStatus::Answered));
        assert_eq!(TicketStatus::Answered.after_reply(false), Some(TicketStatus::Answered));
    }

    #[test]
    fn owner_reply_reopens() {
        assert_eq!(TicketStatus::Answered.after_reply(true), Some(TicketStatus::Open));
    }

    #[test]
    fn closed_tickets_take_no_replies() {
        assert_eq!(TicketStatus::Closed.after_reply(true), None);
        assert_eq!(TicketStatus::Closed.after_reply(false), None);
    }
}
