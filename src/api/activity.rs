use crate::{
    auth::context::RequestContext,
    config::Config,
    db::pagination,
    error::{AppError, AppResult},
    model::{activity::Activity, role::Role},
    report::period::parse_ymd,
    utils::{
        input::{clean_optional, clean_text, today, validate_not_blank, validate_ymd},
        upload::{UploadForm, UploadPolicy, discard, read_upload_form},
    },
};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const ATTACHMENT_TYPES: &[&str] = &["jpg", "jpeg", "png", "pdf", "doc", "docx"];

/// Multipart form accepted by `add_activity`
#[derive(Debug, Validate, ToSchema)]
pub struct NewActivity {
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    #[schema(example = "Photosynthesis practical")]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 60))]
    #[schema(example = "JSS 2A")]
    pub class_name: String,
    #[validate(length(min = 1, max = 80))]
    #[schema(example = "Basic Science")]
    pub subject: String,
    #[validate(custom(function = "validate_ymd"))]
    #[schema(example = "2024-06-03", format = "date")]
    pub activity_date: String,
    /// Optional attachment: jpg, jpeg, png, pdf, doc or docx
    #[schema(value_type = Option<String>, format = Binary)]
    pub attachment: Option<Vec<u8>>,
}

impl NewActivity {
    fn from_form(form: &UploadForm) -> Self {
        let field = |name: &str| clean_text(form.text(name).unwrap_or_default());
        Self {
            title: field("title"),
            description: clean_optional(form.text("description")),
            class_name: field("class_name"),
            subject: field("subject"),
            activity_date: field("activity_date"),
            attachment: None,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ActivityQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
    /// Admins only; teachers always see their own entries
    pub teacher_id: Option<u64>,
    pub class_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub data: Vec<Activity>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Add an activity diary entry
#[utoipa::path(
    post,
    path = "/api/activities",
    request_body(content = NewActivity, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Activity recorded", body = Object, example = json!({
            "message": "Activity recorded",
            "id": 12
        })),
        (status = 400, description = "Invalid fields or file type"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 413, description = "Attachment too large")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Activities"
)]
pub async fn add_activity(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    ctx.require_any(&[Role::Teacher, Role::SchoolAdmin])?;

    let policy = UploadPolicy {
        category: "activities",
        allowed_extensions: ATTACHMENT_TYPES,
        max_bytes: config.max_upload_bytes,
    };
    let form = read_upload_form(
        payload,
        "attachment",
        &config.upload_dir,
        &policy,
        Local::now().naive_local(),
    )
    .await?;

    match insert_activity(&ctx, pool.get_ref(), &form).await {
        Ok(id) => {
            info!(activity_id = id, teacher_id = ctx.user_id, "Activity recorded");
            Ok(HttpResponse::Created().json(serde_json::json!({
                "message": "Activity recorded",
                "id": id
            })))
        }
        Err(e) => {
            if let Some(file) = &form.file {
                discard(&config.upload_dir, file).await;
            }
            Err(e)
        }
    }
}

async fn insert_activity(ctx: &RequestContext, pool: &MySqlPool, form: &UploadForm) -> AppResult<u64> {
    let activity = NewActivity::from_form(form);
    activity.validate()?;

    let activity_date = parse_ymd(&activity.activity_date)
        .ok_or_else(|| AppError::Validation("activity_date must be YYYY-MM-DD".into()))?;
    if activity_date > today() {
        return Err(AppError::Validation("activity_date cannot be in the future".into()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO activities
            (school_id, teacher_id, title, description, class_name, subject, activity_date, attachment_path)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(ctx.school_id)
    .bind(ctx.user_id)
    .bind(&activity.title)
    .bind(&activity.description)
    .bind(&activity.class_name)
    .bind(&activity.subject)
    .bind(activity_date)
    .bind(form.file.as_ref().map(|f| f.relative_path.as_str()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_id())
}

/// List activity diary entries
#[utoipa::path(
    get,
    path = "/api/activities",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Paginated activities", body = ActivityListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Activities"
)]
pub async fn list_activities(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> AppResult<HttpResponse> {
    ctx.require_any(&[Role::Teacher, Role::SchoolAdmin, Role::SuperAdmin])?;

    let (page, per_page, offset) = pagination(query.page, query.per_page);
    let teacher_id = if ctx.is_teacher() {
        Some(ctx.user_id)
    } else {
        query.teacher_id
    };
    let class_name = clean_optional(query.class_name.as_deref());

    let mut where_sql = String::from(" WHERE school_id = ?");
    if teacher_id.is_some() {
        where_sql.push_str(" AND teacher_id = ?");
    }
    if class_name.is_some() {
        where_sql.push_str(" AND class_name = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM activities{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql).bind(ctx.school_id);
    if let Some(id) = teacher_id {
        count_q = count_q.bind(id);
    }
    if let Some(name) = &class_name {
        count_q = count_q.bind(name);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT id, school_id, teacher_id, title, description, class_name, subject,
               activity_date, attachment_path, created_at
        FROM activities
        {where_sql}
        ORDER BY activity_date DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    );
    let mut data_q = sqlx::query_as::<_, Activity>(&data_sql).bind(ctx.school_id);
    if let Some(id) = teacher_id {
        data_q = data_q.bind(id);
    }
    if let Some(name) = &class_name {
        data_q = data_q.bind(name);
    }
    let data = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ActivityListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
