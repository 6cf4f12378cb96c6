use crate::{
    auth::context::RequestContext,
    config::Config,
    error::AppResult,
    model::{
        attendance::{AttendanceRow, AttendanceRowSql},
        role::Role,
    },
    report::{
        aggregate::{SummaryCounts, TeacherSummary, build_overall_summary, build_per_teacher_summaries},
        period::{PeriodParams, ReportPeriod, ResolvedPeriod, resolve_period},
        render::{ReportParams, render_document},
    },
};
use actix_web::{HttpResponse, http::header, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ReportQuery {
    /// "all" or a teacher's user id
    #[schema(example = "all")]
    pub teacher_id: Option<String>,
    /// daily, weekly, monthly, termly or yearly
    #[schema(example = "monthly")]
    pub report_type: Option<String>,
    #[schema(example = "2024-06-01")]
    pub start_date: Option<String>,
    #[schema(example = "2024-06-30")]
    pub end_date: Option<String>,
    #[schema(example = "2nd Term")]
    pub term: Option<String>,
    #[schema(example = "2024")]
    pub year: Option<String>,
    #[schema(example = "6")]
    pub month: Option<String>,
    /// Another school's report; super admins only
    pub school_id: Option<u64>,
    /// "json" returns the summaries instead of a document
    #[schema(example = "pdf")]
    pub format: Option<String>,
}

impl ReportQuery {
    fn period_params(&self) -> PeriodParams<'_> {
        PeriodParams {
            report_type: self.report_type.as_deref(),
            start_date: self.start_date.as_deref(),
            end_date: self.end_date.as_deref(),
            term: self.term.as_deref(),
            year: self.year.as_deref(),
            month: self.month.as_deref(),
        }
    }

    fn wants_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
    }
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceReportResponse {
    pub period: ResolvedPeriod,
    pub period_label: String,
    pub teachers: Vec<TeacherSummary>,
    pub overall: SummaryCounts,
}

/// Teachers only ever see themselves; admins pick "all" or one id.
/// Anything that is not a number means everyone.
pub fn teacher_filter(ctx: &RequestContext, requested: Option<&str>) -> Option<u64> {
    if ctx.is_teacher() {
        return Some(ctx.user_id);
    }
    requested
        .map(str::trim)
        .filter(|t| !t.eq_ignore_ascii_case("all"))
        .and_then(|t| t.parse().ok())
}

fn report_school(ctx: &RequestContext, requested: Option<u64>) -> u64 {
    match requested {
        Some(school_id) if ctx.role == Role::SuperAdmin => school_id,
        _ => ctx.school_id,
    }
}

pub async fn fetch_attendance_rows(
    pool: &MySqlPool,
    school_id: u64,
    teacher_id: Option<u64>,
    period: &ReportPeriod,
) -> Result<Vec<AttendanceRow>, sqlx::Error> {
    // window lives in the join so teachers without records still yield an absence row
    let window = match period {
        ReportPeriod::Range { .. } => "tr.attendance_date BETWEEN ? AND ?",
        ReportPeriod::Year { .. } => "YEAR(tr.attendance_date) = ?",
    };
    let teacher_clause = if teacher_id.is_some() { " AND u.id = ?" } else { "" };

    let sql = format!(
        r#"
        SELECT
            u.id AS teacher_id,
            u.full_name,
            u.email,
            tr.attendance_date,
            tr.sign_in_time,
            tr.status,
            s.expected_arrival,
            tr.notes
        FROM users u
        LEFT JOIN time_records tr ON tr.user_id = u.id AND {window}
        LEFT JOIN attendance_settings s ON s.user_id = u.id
        WHERE u.school_id = ?
        AND u.role_id = ?
        AND u.is_active = TRUE{teacher_clause}
        ORDER BY u.full_name, u.id, tr.attendance_date, tr.sign_in_time
        "#
    );

    let mut query = sqlx::query_as::<_, AttendanceRowSql>(&sql);
    query = match *period {
        ReportPeriod::Range { start, end } => query.bind(start).bind(end),
        ReportPeriod::Year { year } => query.bind(year),
    };
    query = query.bind(school_id).bind(Role::Teacher.id());
    if let Some(id) = teacher_id {
        query = query.bind(id);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(AttendanceRow::from).collect())
}

async fn school_name(pool: &MySqlPool, school_id: u64) -> Result<String, sqlx::Error> {
    let name = sqlx::query_scalar::<_, String>("SELECT name FROM schools WHERE id = ?")
        .bind(school_id)
        .fetch_optional(pool)
        .await?;
    Ok(name.unwrap_or_else(|| "School".to_string()))
}

/// Attendance report export
#[utoipa::path(
    get,
    path = "/api/reports/attendance",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report document (PDF, or HTML when no converter is configured); summaries when format=json", body = AttendanceReportResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Reports"
)]
pub async fn export_report(
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ReportQuery>,
) -> AppResult<HttpResponse> {
    ctx.require_any(&[Role::SuperAdmin, Role::SchoolAdmin, Role::Teacher])?;

    let school_id = report_school(&ctx, query.school_id);
    let teacher_id = teacher_filter(&ctx, query.teacher_id.as_deref());
    let now = Local::now().naive_local();
    let resolved = resolve_period(&query.period_params(), now.date());

    debug!(school_id, ?teacher_id, period = ?resolved.period, "Resolved report window");

    let rows = fetch_attendance_rows(pool.get_ref(), school_id, teacher_id, &resolved.period).await?;
    let teachers = build_per_teacher_summaries(&rows);
    let overall = build_overall_summary(&rows);

    info!(
        user_id = ctx.user_id,
        school_id,
        rows = rows.len(),
        teachers = teachers.len(),
        "Attendance report built"
    );

    if query.wants_json() {
        return Ok(HttpResponse::Ok().json(AttendanceReportResponse {
            period: resolved,
            period_label: resolved.label(),
            teachers: teachers.into_vec(),
            overall,
        }));
    }

    let school_name = school_name(pool.get_ref(), school_id).await?;
    let document = render_document(
        &ReportParams {
            school_name: &school_name,
            period: &resolved,
            teachers: &teachers,
            overall: &overall,
            generated_at: now,
        },
        config.pdf_converter_cmd.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok()
        .content_type(document.content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.file_name),
        ))
        .body(document.body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support;
    use actix_web::{App, http::StatusCode, middleware::from_fn, test as actix_test};

    fn ctx(role: Role) -> RequestContext {
        RequestContext {
            user_id: 31,
            username: "someone".into(),
            role,
            school_id: 4,
        }
    }

    #[test]
    fn teachers_are_pinned_to_themselves() {
        assert_eq!(teacher_filter(&ctx(Role::Teacher), Some("all")), Some(31));
        assert_eq!(teacher_filter(&ctx(Role::Teacher), Some("99")), Some(31));
    }

    #[test]
    fn admins_choose_all_or_one() {
        let admin = ctx(Role::SchoolAdmin);
        assert_eq!(teacher_filter(&admin, None), None);
        assert_eq!(teacher_filter(&admin, Some("ALL")), None);
        assert_eq!(teacher_filter(&admin, Some(" 12 ")), Some(12));
        assert_eq!(teacher_filter(&admin, Some("twelve")), None);
    }

    #[test]
    fn only_super_admins_switch_school() {
        assert_eq!(report_school(&ctx(Role::SchoolAdmin), Some(9)), 4);
        assert_eq!(report_school(&ctx(Role::SuperAdmin), Some(9)), 9);
        assert_eq!(report_school(&ctx(Role::SuperAdmin), None), 4);
    }

    #[test]
    fn json_format_is_case_insensitive() {
        let query = ReportQuery {
            format: Some(" JSON ".into()),
            ..Default::default()
        };
        assert!(query.wants_json());
        assert!(!ReportQuery::default().wants_json());
    }

    #[actix_web::test]
    async fn parents_cannot_export() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::lazy_pool()))
                .app_data(web::Data::new(test_support::config()))
                .service(
                    web::scope("/api")
                        .wrap(from_fn(crate::auth::middleware::auth_middleware))
                        .route("/reports/attendance", web::get().to(export_report)),
                ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/reports/attendance?report_type=monthly")
            .insert_header(test_support::bearer(Role::Parent, 4))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::get()
            .uri("/api/reports/attendance")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
