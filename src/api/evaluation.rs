use crate::{
    auth::context::RequestContext,
    error::{AppError, AppResult},
    model::evaluation::{EvaluationItem, EvaluationSql, EvaluationTotals},
    report::render::fill_template,
};
use actix_web::{HttpResponse, web};
use htmlescape::encode_minimal;
use sqlx::MySqlPool;

fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

pub fn render_evaluation(evaluation: &EvaluationSql, items: &[EvaluationItem]) -> String {
    let template = include_str!("../templates/evaluation.html");
    let totals = EvaluationTotals::from_items(items);

    let item_rows = if items.is_empty() {
        r#"    <tr><td colspan="4">No criteria scored</td></tr>"#.to_string()
    } else {
        items
            .iter()
            .map(|item| {
                format!(
                    "    <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{}</td></tr>",
                    encode_minimal(&item.criterion),
                    format_score(item.score),
                    format_score(item.max_score),
                    encode_minimal(item.comment.as_deref().unwrap_or("")),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    fill_template(
        template,
        &[
            ("id", evaluation.id.to_string()),
            ("teacher_name", encode_minimal(&evaluation.teacher_name)),
            ("evaluator_name", encode_minimal(&evaluation.evaluator_name)),
            ("term", encode_minimal(&evaluation.term)),
            (
                "session",
                format!("{}/{}", evaluation.year, evaluation.year + 1),
            ),
            ("item_rows", item_rows),
            ("total_score", format_score(totals.score)),
            ("max_score", format_score(totals.max_score)),
            ("percentage", format!("{:.2}", totals.percentage)),
            ("band", totals.band.to_string()),
            (
                "comments",
                encode_minimal(evaluation.comments.as_deref().unwrap_or("-")),
            ),
        ],
    )
}

/// Printable teacher evaluation
#[utoipa::path(
    get,
    path = "/api/evaluations/{evaluation_id}/print",
    params(
        ("evaluation_id" = u64, Path, description = "ID of the evaluation to print")
    ),
    responses(
        (status = 200, description = "Printable HTML page"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Evaluation not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Evaluations"
)]
pub async fn print_evaluation(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let evaluation_id = path.into_inner();

    let evaluation = sqlx::query_as::<_, EvaluationSql>(
        r#"
        SELECT
            e.id,
            e.school_id,
            e.teacher_id,
            t.full_name AS teacher_name,
            ev.full_name AS evaluator_name,
            e.term,
            e.year,
            e.comments
        FROM evaluations e
        JOIN users t ON t.id = e.teacher_id
        JOIN users ev ON ev.id = e.evaluator_id
        WHERE e.id = ?
        "#,
    )
    .bind(evaluation_id)
    .fetch_optional(pool.get_ref())
    .await?
    .filter(|e| ctx.can_access_school(e.school_id))
    .ok_or_else(|| AppError::NotFound("Evaluation not found".into()))?;

    if !ctx.is_admin() && evaluation.teacher_id != ctx.user_id {
        return Err(AppError::Forbidden("Only admins or the evaluated teacher may print this".into()));
    }

    let items = sqlx::query_as::<_, EvaluationItem>(
        r#"
        SELECT criterion, score, max_score, comment
        FROM evaluation_items
        WHERE evaluation_id = ?
        ORDER BY id
        "#,
    )
    .bind(evaluation_id)
    .fetch_all(pool.get_ref())
    .await?;

    tracing::info!(evaluation_id, user_id = ctx.user_id, "Evaluation printed");

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(render_evaluation(&evaluation, &items)))
}
