use std::process::Stdio;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use htmlescape::encode_minimal;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::aggregate::{OverallSummary, TeacherSummaries};
use super::period::ResolvedPeriod;

pub struct ReportParams<'a> {
    pub school_name: &'a str,
    pub period: &'a ResolvedPeriod,
    pub teachers: &'a TeacherSummaries,
    pub overall: &'a OverallSummary,
    pub generated_at: NaiveDateTime,
}

/// A rendered report ready to be sent as a download.
#[derive(Debug)]
pub struct ReportDocument {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// `attendance_report_<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn report_file_name(generated_at: NaiveDateTime, extension: &str) -> String {
    format!(
        "attendance_report_{}.{}",
        generated_at.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

pub fn render_html(params: &ReportParams<'_>) -> String {
    let template = include_str!("../templates/attendance_report.html");

    let teacher_rows = if params.teachers.is_empty() {
        r#"    <tr><td colspan="8" class="empty">No attendance records for this period</td></tr>"#
            .to_string()
    } else {
        params
            .teachers
            .iter()
            .map(|t| {
                let s = &t.summary;
                format!(
                    "    <tr><td class=\"name\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td></tr>",
                    encode_minimal(&t.full_name),
                    encode_minimal(&t.email),
                    s.present_days,
                    s.absent_days,
                    s.late_days,
                    s.agreed_days,
                    s.not_agreed_days,
                    s.attendance_rate,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let title = format!("{} Attendance Report", params.school_name);
    let overall = params.overall;

    fill_template(
        template,
        &[
            ("title", encode_minimal(&title)),
            ("period", encode_minimal(&params.period.label())),
            (
                "generated_at",
                params.generated_at.format("%Y-%m-%d %H:%M").to_string(),
            ),
            ("teacher_rows", teacher_rows),
            ("total_days", overall.total_days.to_string()),
            ("present_days", overall.present_days.to_string()),
            ("absent_days", overall.absent_days.to_string()),
            ("late_days", overall.late_days.to_string()),
            ("agreed_days", overall.agreed_days.to_string()),
            ("not_agreed_days", overall.not_agreed_days.to_string()),
            ("pending_days", overall.pending_days.to_string()),
            ("attendance_rate", format!("{:.2}", overall.attendance_rate)),
        ],
    )
}

/// Replaces each `{{name}}` in one pass over `template`. Substituted text is
/// never scanned again, so user data cannot expand into other placeholders.
/// Unknown names are left as written.
pub fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 4]),
        }
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Pipes HTML through the configured converter (stdin → stdout), e.g.
/// `wkhtmltopdf --quiet - -`.
pub async fn html_to_pdf(converter_cmd: &str, html: &str) -> Result<Vec<u8>> {
    let mut parts = converter_cmd.split_whitespace();
    let program = parts.next().context("PDF converter command is empty")?;

    let mut child = Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start PDF converter `{program}`"))?;

    let mut stdin = child.stdin.take().context("PDF converter stdin unavailable")?;
    stdin.write_all(html.as_bytes()).await?;
    drop(stdin);

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        bail!(
            "PDF converter exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    if output.stdout.is_empty() {
        bail!("PDF converter produced no output");
    }
    Ok(output.stdout)
}

/// PDF when a converter is configured, the HTML itself otherwise.
pub async fn render_document(
    params: &ReportParams<'_>,
    converter_cmd: Option<&str>,
) -> Result<ReportDocument> {
    let html = render_html(params);

    match converter_cmd {
        Some(cmd) => Ok(ReportDocument {
            file_name: report_file_name(params.generated_at, "pdf"),
            content_type: "application/pdf",
            body: html_to_pdf(cmd, &html).await?,
        }),
        None => Ok(ReportDocument {
            file_name: report_file_name(params.generated_at, "html"),
            content_type: "text/html; charset=utf-8",
            body: html.into_bytes(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceRow, AttendanceStatus};
    use crate::report::aggregate::{build_overall_summary, build_per_teacher_summaries};
    use crate::report::period::{ReportPeriod, ReportType};
    use chrono::NaiveDate;

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    fn period() -> ResolvedPeriod {
        ResolvedPeriod {
            report_type: ReportType::Monthly,
            period: ReportPeriod::Range {
                start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            },
            term: None,
        }
    }

    fn rows() -> Vec<AttendanceRow> {
        vec![AttendanceRow {
            teacher_id: 1,
            full_name: "Ngozi <Admin> & Co".into(),
            email: "ngozi@school.test".into(),
            attendance_date: NaiveDate::from_ymd_opt(2024, 6, 3),
            sign_in_time: None,
            status: AttendanceStatus::Agreed,
            is_late: true,
            expected_arrival: None,
            notes: None,
        }]
    }

    #[test]
    fn file_name_carries_timestamp() {
        assert_eq!(
            report_file_name(generated_at(), "pdf"),
            "attendance_report_2024-06-30_14-05-09.pdf"
        );
    }

    #[test]
    fn renders_escaped_rows_and_summary() {
        let rows = rows();
        let teachers = build_per_teacher_summaries(&rows);
        let overall = build_overall_summary(&rows);
        let period = period();
        let html = render_html(&ReportParams {
            school_name: "Hillside",
            period: &period,
            teachers: &teachers,
            overall: &overall,
            generated_at: generated_at(),
        });

        assert!(html.contains("Hillside Attendance Report"));
        assert!(html.contains("Ngozi &lt;Admin&gt; &amp; Co"));
        assert!(html.contains("<td>100.00</td>"));
        assert!(html.contains("2024-06-01 to 2024-06-30"));
        assert!(html.contains("<tr><td>Total days</td><td>1</td></tr>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn renders_placeholder_for_empty_report() {
        let teachers = TeacherSummaries::default();
        let overall = OverallSummary::default();
        let period = period();
        let html = render_html(&ReportParams {
            school_name: "Hillside",
            period: &period,
            teachers: &teachers,
            overall: &overall,
            generated_at: generated_at(),
        });
        assert!(html.contains("No attendance records for this period"));
        assert!(html.contains("0.00%"));
    }

    #[actix_web::test]
    async fn falls_back_to_html_without_converter() {
        let teachers = TeacherSummaries::default();
        let overall = OverallSummary::default();
        let period = period();
        let params = ReportParams {
            school_name: "Hillside",
            period: &period,
            teachers: &teachers,
            overall: &overall,
            generated_at: generated_at(),
        };
        let doc = render_document(&params, None).await.unwrap();
        assert_eq!(doc.file_name, "attendance_report_2024-06-30_14-05-09.html");
        assert!(doc.content_type.starts_with("text/html"));
    }

    #[actix_web::test]
    async fn empty_converter_command_is_an_error() {
        assert!(html_to_pdf("   ", "<html></html>").await.is_err());
    }

    #[test]
    fn fill_template_substitutes_in_one_pass() {
        let html = fill_template(
            "<h1>{{a}}</h1><p>{{b}}</p>{{missing}} {{open",
            &[("a", "{{b}}".to_string()), ("b", "two".to_string())],
        );
        assert_eq!(html, "<h1>{{b}}</h1><p>two</p>{{missing}} {{open");
    }

    #[test]
    fn names_that_look_like_placeholders_stay_literal() {
        let mut rows = rows();
        rows[0].full_name = "{{attendance_rate}} {{total_days}}".into();
        let teachers = build_per_teacher_summaries(&rows);
        let overall = build_overall_summary(&rows);
        let period = period();
        let html = render_html(&ReportParams {
            school_name: "{{teacher_rows}}",
            period: &period,
            teachers: &teachers,
            overall: &overall,
            generated_at: generated_at(),
        });

        assert!(html.contains("<title>{{teacher_rows}} Attendance Report</title>"));
        assert!(html.contains("<td class=\"name\">{{attendance_rate}} {{total_days}}</td>"));
        assert_eq!(html.matches("<td class=\"name\">").count(), 1);
    }
}
