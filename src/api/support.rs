use crate::{
    auth::context::RequestContext,
    error::{AppError, AppResult},
    model::ticket::{TicketReply, TicketResponse, TicketSql, TicketStatus},
    utils::input::{clean_text, validate_not_blank},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTicket {
    #[validate(length(min = 3, max = 150), custom(function = "validate_not_blank"))]
    #[schema(example = "Cannot upload lesson notes")]
    pub subject: String,
    #[validate(length(min = 1, max = 5000), custom(function = "validate_not_blank"))]
    #[schema(example = "The upload button spins forever on Chrome.")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReplyTicket {
    #[validate(length(min = 1, max = 5000), custom(function = "validate_not_blank"))]
    #[schema(example = "Please clear your cache and try again.")]
    pub message: String,
}

/// Loads a ticket the caller may see: the owner, or an admin of its school.
async fn load_ticket(pool: &MySqlPool, ctx: &RequestContext, ticket_id: u64) -> AppResult<TicketSql> {
    let ticket = sqlx::query_as::<_, TicketSql>(
        r#"
        SELECT id, school_id, user_id, subject, status, created_at, updated_at
        FROM support_tickets
        WHERE id = ?
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(pool)
    .await?
    .filter(|t| ctx.can_access_school(t.school_id))
    .ok_or_else(|| AppError::NotFound("Ticket not found".into()))?;

    if ticket.user_id != ctx.user_id && !ctx.is_admin() {
        return Err(AppError::Forbidden("Not your ticket".into()));
    }
    Ok(ticket)
}

/// Open a support ticket
#[utoipa::path(
    post,
    path = "/api/support/tickets",
    request_body = CreateTicket,
    responses(
        (status = 201, description = "Ticket opened", body = Object, example = json!({
            "message": "Ticket opened",
            "id": 8
        })),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Support"
)]
pub async fn open_ticket(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTicket>,
) -> AppResult<HttpResponse> {
    let ticket = CreateTicket {
        subject: clean_text(&payload.subject),
        message: clean_text(&payload.message),
    };
    ticket.validate()?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO support_tickets (school_id, user_id, subject) VALUES (?, ?, ?)",
    )
    .bind(ctx.school_id)
    .bind(ctx.user_id)
    .bind(&ticket.subject)
    .execute(&mut *tx)
    .await?;
    let ticket_id = result.last_insert_id();

    sqlx::query("INSERT INTO ticket_replies (ticket_id, user_id, message) VALUES (?, ?, ?)")
        .bind(ticket_id)
        .bind(ctx.user_id)
        .bind(&ticket.message)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(ticket_id, user_id = ctx.user_id, "Support ticket opened");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Ticket opened",
        "id": ticket_id
    })))
}

/// Ticket with its conversation
#[utoipa::path(
    get,
    path = "/api/support/tickets/{ticket_id}",
    params(
        ("ticket_id" = u64, Path, description = "ID of the ticket")
    ),
    responses(
        (status = 200, description = "Ticket found", body = TicketResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Ticket not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Support"
)]
pub async fn get_ticket(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let ticket = load_ticket(pool.get_ref(), &ctx, path.into_inner()).await?;

    let replies = sqlx::query_as::<_, TicketReply>(
        r#"
        SELECT r.id, r.user_id, u.full_name AS author, r.message, r.created_at
        FROM ticket_replies r
        JOIN users u ON u.id = r.user_id
        WHERE r.ticket_id = ?
        ORDER BY r.created_at, r.id
        "#,
    )
    .bind(ticket.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(TicketResponse::new(ticket, replies)))
}

/// Reply to a support ticket
#[utoipa::path(
    post,
    path = "/api/support/tickets/{ticket_id}/replies",
    params(
        ("ticket_id" = u64, Path, description = "ID of the ticket to reply to")
    ),
    request_body = ReplyTicket,
    responses(
        (status = 201, description = "Reply posted", body = Object, example = json!({
            "message": "Reply posted",
            "status": "answered"
        })),
        (status = 400, description = "Invalid message"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Ticket is closed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Support"
)]
pub async fn reply_ticket(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReplyTicket>,
) -> AppResult<HttpResponse> {
    let reply = ReplyTicket {
        message: clean_text(&payload.message),
    };
    reply.validate()?;

    let ticket = load_ticket(pool.get_ref(), &ctx, path.into_inner()).await?;
    let by_owner = ticket.user_id == ctx.user_id;
    let status = ticket
        .status()
        .after_reply(by_owner)
        .ok_or_else(|| AppError::Conflict("Ticket is closed".into()))?;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO ticket_replies (ticket_id, user_id, message) VALUES (?, ?, ?)")
        .bind(ticket.id)
        .bind(ctx.user_id)
        .bind(&reply.message)
        .execute(&mut *tx)
        .await?;

    let updated = sqlx::query(
        "UPDATE support_tickets SET status = ? WHERE id = ? AND status <> 'closed'",
    )
    .bind(status.as_ref())
    .bind(ticket.id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::Conflict("Ticket is closed".into()));
    }

    tx.commit().await?;

    info!(ticket_id = ticket.id, user_id = ctx.user_id, %status, "Ticket reply posted");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Reply posted",
        "status": status
    })))
}

/// Close a support ticket
#[utoipa::path(
    put,
    path = "/api/support/tickets/{ticket_id}/close",
    params(
        ("ticket_id" = u64, Path, description = "ID of the ticket to close")
    ),
    responses(
        (status = 200, description = "Ticket closed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Ticket not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Support"
)]
pub async fn close_ticket(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let ticket = load_ticket(pool.get_ref(), &ctx, path.into_inner()).await?;

    sqlx::query("UPDATE support_tickets SET status = ? WHERE id = ?")
        .bind(TicketStatus::Closed.as_ref())
        .bind(ticket.id)
        .execute(pool.get_ref())
        .await?;

    info!(ticket_id = ticket.id, user_id = ctx.user_id, "Ticket closed");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Ticket closed",
        "status": TicketStatus::Closed
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reply_is_invalid() {
        let reply = ReplyTicket {
            message: clean_text("  <p> </p> "),
        };
        assert!(reply.validate().is_err());
    }

    #[test]
    fn short_subject_is_invalid() {
        let ticket = CreateTicket {
            subject: "hi".into(),
            message: "Something broke".into(),
        };
        let errors = ticket.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("subject"));
    }
}
