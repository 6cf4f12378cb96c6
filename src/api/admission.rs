use crate::{
    auth::context::RequestContext,
    db::pagination,
    error::{AppError, AppResult},
    model::admission::{Application, ApplicationSql, ApplicationStatus, ReviewAction},
    report::period::parse_ymd,
    utils::input::{clean_optional, clean_text, today, validate_not_blank, validate_phone, validate_ymd},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApplication {
    #[validate(length(min = 2, max = 150), custom(function = "validate_not_blank"))]
    #[schema(example = "Chidera Okafor")]
    pub applicant_name: String,
    #[validate(custom(function = "validate_ymd"))]
    #[schema(example = "2016-04-12", format = "date")]
    pub date_of_birth: String,
    #[validate(length(min = 2, max = 150))]
    #[schema(example = "Amaka Okafor")]
    pub guardian_name: String,
    #[validate(email)]
    #[schema(example = "amaka@example.com", format = "email")]
    pub guardian_email: String,
    #[validate(custom(function = "validate_phone"))]
    #[schema(example = "+234 803 555 0199")]
    pub guardian_phone: String,
    #[validate(length(min = 1, max = 60))]
    #[schema(example = "Primary 3")]
    pub class_applied: String,
}

impl CreateApplication {
    fn cleaned(&self) -> Self {
        Self {
            applicant_name: clean_text(&self.applicant_name),
            date_of_birth: self.date_of_birth.trim().to_string(),
            guardian_name: clean_text(&self.guardian_name),
            guardian_email: self.guardian_email.trim().to_ascii_lowercase(),
            guardian_phone: self.guardian_phone.trim().to_string(),
            class_applied: clean_text(&self.class_applied),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProcessApplication {
    pub action: ReviewAction,
    #[validate(length(max = 1000))]
    #[schema(example = "Entrance assessment passed")]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ApplicationFilter {
    /// pending, approved, rejected or waitlisted
    #[schema(example = "pending")]
    pub status: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct ApplicationListResponse {
    pub data: Vec<Application>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

const APPLICATION_COLUMNS: &str = r#"
    id, school_id, applicant_name, date_of_birth, guardian_name, guardian_email,
    guardian_phone, class_applied, status, review_notes, reviewed_by, reviewed_at, created_at
"#;

/// Submit an admission application
#[utoipa::path(
    post,
    path = "/api/admissions",
    request_body = CreateApplication,
    responses(
        (status = 201, description = "Application received", body = Object, example = json!({
            "message": "Application received",
            "id": 3,
            "status": "pending"
        })),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admissions"
)]
pub async fn submit_application(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateApplication>,
) -> AppResult<HttpResponse> {
    let application = payload.cleaned();
    application.validate()?;

    let date_of_birth = parse_ymd(&application.date_of_birth)
        .ok_or_else(|| AppError::Validation("date_of_birth must be YYYY-MM-DD".into()))?;
    if date_of_birth >= today() {
        return Err(AppError::Validation("date_of_birth must be in the past".into()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO admission_applications
            (school_id, applicant_name, date_of_birth, guardian_name, guardian_email,
             guardian_phone, class_applied, submitted_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(ctx.school_id)
    .bind(&application.applicant_name)
    .bind(date_of_birth)
    .bind(&application.guardian_name)
    .bind(&application.guardian_email)
    .bind(&application.guardian_phone)
    .bind(&application.class_applied)
    .bind(ctx.user_id)
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    info!(application_id = id, school_id = ctx.school_id, "Admission application received");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Application received",
        "id": id,
        "status": ApplicationStatus::Pending
    })))
}

/// List admission applications
#[utoipa::path(
    get,
    path = "/api/admissions",
    params(ApplicationFilter),
    responses(
        (status = 200, description = "Paginated applications", body = ApplicationListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admissions"
)]
pub async fn list_applications(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    query: web::Query<ApplicationFilter>,
) -> AppResult<HttpResponse> {
    ctx.require_admin()?;

    let (page, per_page, offset) = pagination(query.page, query.per_page);
    // unknown status filters are ignored
    let status = clean_optional(query.status.as_deref())
        .and_then(|s| s.to_ascii_lowercase().parse::<ApplicationStatus>().ok());

    let mut where_sql = String::from(" WHERE school_id = ?");
    if status.is_some() {
        where_sql.push_str(" AND status = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM admission_applications{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql).bind(ctx.school_id);
    if let Some(s) = status {
        count_q = count_q.bind(s.to_string());
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM admission_applications{where_sql} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut data_q = sqlx::query_as::<_, ApplicationSql>(&data_sql).bind(ctx.school_id);
    if let Some(s) = status {
        data_q = data_q.bind(s.to_string());
    }
    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ApplicationListResponse {
        data: rows.into_iter().map(Application::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Approve, reject or waitlist an application
#[utoipa::path(
    put,
    path = "/api/admissions/{application_id}/process",
    params(
        ("application_id" = u64, Path, description = "ID of the application to process")
    ),
    request_body = ProcessApplication,
    responses(
        (status = 200, description = "Application processed", body = Object, example = json!({
            "message": "Application processed",
            "status": "approved"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Application not found"),
        (status = 409, description = "Application already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admissions"
)]
pub async fn process_application(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ProcessApplication>,
) -> AppResult<HttpResponse> {
    ctx.require_admin()?;
    payload.validate()?;

    let application_id = path.into_inner();

    let current = sqlx::query_as::<_, (u64, String)>(
        "SELECT school_id, status FROM admission_applications WHERE id = ?",
    )
    .bind(application_id)
    .fetch_optional(pool.get_ref())
    .await?
    .filter(|(school_id, _)| ctx.can_access_school(*school_id))
    .ok_or_else(|| AppError::NotFound("Application not found".into()))?;

    let from: ApplicationStatus = current
        .1
        .parse()
        .map_err(|_| AppError::Conflict(format!("Application has unknown status `{}`", current.1)))?;
    let to = from
        .apply(payload.action)
        .ok_or_else(|| AppError::Conflict(format!("Cannot {} a {from} application", payload.action)))?;

    let notes = clean_optional(payload.notes.as_deref());

    // status in the WHERE guards against a concurrent decision
    let result = sqlx::query(
        r#"
        UPDATE admission_applications
        SET status = ?, review_notes = COALESCE(?, review_notes), reviewed_by = ?, reviewed_at = NOW()
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(to.as_ref())
    .bind(&notes)
    .bind(ctx.user_id)
    .bind(application_id)
    .bind(from.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Application was processed by someone else".into()));
    }

    info!(application_id, %from, %to, reviewer = ctx.user_id, "Admission application processed");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Application processed",
        "status": to
    })))
}
