use crate::{
    auth::context::RequestContext,
    config::Config,
    error::{AppError, AppResult},
    model::{role::Role, subscription::SubscriptionSql},
    utils::upload::{UploadPolicy, content_type_for, discard, read_upload_form, resolve_stored},
};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, http::header, web};
use chrono::Local;
use sqlx::MySqlPool;
use tracing::{info, warn};

const PROOF_TYPES: &[&str] = &["pdf", "png", "jpg", "jpeg"];

async fn load_subscription(
    pool: &MySqlPool,
    ctx: &RequestContext,
    subscription_id: u64,
    roles: &[Role],
) -> AppResult<SubscriptionSql> {
    ctx.require_any(roles)?;

    sqlx::query_as::<_, SubscriptionSql>(
        "SELECT id, school_id, proof_path FROM subscriptions WHERE id = ?",
    )
    .bind(subscription_id)
    .fetch_optional(pool)
    .await?
    .filter(|s| ctx.can_access_school(s.school_id))
    .ok_or_else(|| AppError::NotFound("Subscription not found".into()))
}

/// Upload proof of payment for a subscription
#[utoipa::path(
    post,
    path = "/api/subscriptions/{subscription_id}/proof",
    params(
        ("subscription_id" = u64, Path, description = "ID of the subscription")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "`proof` file: pdf, png, jpg or jpeg"),
    responses(
        (status = 200, description = "Proof stored"),
        (status = 400, description = "Missing or unsupported file"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Subscription not found"),
        (status = 413, description = "File too large")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Subscriptions"
)]
pub async fn upload_proof(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    // billing proof comes from the school itself
    let subscription =
        load_subscription(pool.get_ref(), &ctx, path.into_inner(), &[Role::SchoolAdmin]).await?;

    let policy = UploadPolicy {
        category: "subscription_proofs",
        allowed_extensions: PROOF_TYPES,
        max_bytes: config.max_upload_bytes,
    };
    let form = read_upload_form(
        payload,
        "proof",
        &config.upload_dir,
        &policy,
        Local::now().naive_local(),
    )
    .await?;
    let file = form
        .file
        .ok_or_else(|| AppError::Validation("A `proof` file is required".into()))?;

    if let Err(e) = sqlx::query("UPDATE subscriptions SET proof_path = ? WHERE id = ?")
        .bind(&file.relative_path)
        .bind(subscription.id)
        .execute(pool.get_ref())
        .await
    {
        discard(&config.upload_dir, &file).await;
        return Err(e.into());
    }

    // the previous proof is no longer referenced
    if let Some(old) = subscription.proof_path.as_deref() {
        if let Some(old_path) = resolve_stored(&config.upload_dir, old) {
            if let Err(e) = tokio::fs::remove_file(&old_path).await {
                warn!(error = %e, path = old, "Failed to remove replaced proof");
            }
        }
    }

    info!(
        subscription_id = subscription.id,
        user_id = ctx.user_id,
        size = file.size,
        "Subscription proof uploaded"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Proof stored",
        "file": file.original_name
    })))
}

/// Download the proof of payment for a subscription
#[utoipa::path(
    get,
    path = "/api/subscriptions/{subscription_id}/proof",
    params(
        ("subscription_id" = u64, Path, description = "ID of the subscription")
    ),
    responses(
        (status = 200, description = "Proof file"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Subscription or proof not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Subscriptions"
)]
pub async fn serve_proof(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let subscription = load_subscription(
        pool.get_ref(),
        &ctx,
        path.into_inner(),
        &[Role::SuperAdmin, Role::SchoolAdmin],
    )
    .await?;

    let stored = subscription
        .proof_path
        .as_deref()
        .and_then(|p| resolve_stored(&config.upload_dir, p))
        .ok_or_else(|| AppError::NotFound("No proof uploaded".into()))?;

    let body = match tokio::fs::read(&stored).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(subscription_id = subscription.id, path = %stored.display(), "Proof file missing on disk");
            return Err(AppError::NotFound("No proof uploaded".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let extension = stored
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&stored))
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename=\"subscription_{}_proof.{}\"",
                subscription.id, extension
            ),
        ))
        .body(body))
}
