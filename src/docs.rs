use crate::api::activity::{ActivityListResponse, ActivityQuery, NewActivity};
use crate::api::admission::{
    ApplicationFilter, ApplicationListResponse, CreateApplication, ProcessApplication,
};
use crate::api::report::{AttendanceReportResponse, ReportQuery};
use crate::api::support::{CreateTicket, ReplyTicket};
use crate::model::activity::Activity;
use crate::model::attendance::AttendanceStatus;
use crate::model::admission::{Application, ApplicationStatus, ReviewAction};
use crate::model::ticket::{TicketReply, TicketResponse, TicketStatus};
use crate::report::aggregate::{DailyRecord, SummaryCounts, TeacherSummary};
use crate::report::period::{ReportPeriod, ReportType, ResolvedPeriod, Term, TermDates};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Portal API",
        version = "1.0.0",
        description = r#"
## School Portal

Back office API for schools: staff attendance, classroom activities, evaluations,
admissions, support and subscription billing.

### Key Features
- **Attendance reports**
  - Weekly, monthly, termly and yearly teacher attendance, as JSON or a PDF document
- **Activities**
  - Teachers log classroom activities with an optional attachment
- **Evaluations**
  - Printable teacher evaluation sheets
- **Admissions**
  - Submit applications and approve, reject or waitlist them
- **Support**
  - Ticket threads between schools and the support desk
- **Subscriptions**
  - Upload and view proof of payment

### Security
Every `/api` endpoint requires a **JWT Bearer** access token obtained from `/auth/login`.
Data is scoped to the caller's school.
"#,
    ),
    paths(
        crate::api::report::export_report,

        crate::api::activity::add_activity,
        crate::api::activity::list_activities,

        crate::api::evaluation::print_evaluation,

        crate::api::admission::submit_application,
        crate::api::admission::list_applications,
        crate::api::admission::process_application,

        crate::api::support::open_ticket,
        crate::api::support::get_ticket,
        crate::api::support::reply_ticket,
        crate::api::support::close_ticket,

        crate::api::subscription::upload_proof,
        crate::api::subscription::serve_proof
    ),
    components(
        schemas(
            ReportQuery,
            AttendanceReportResponse,
            ReportType,
            Term,
            TermDates,
            ReportPeriod,
            ResolvedPeriod,
            AttendanceStatus,
            DailyRecord,
            SummaryCounts,
            TeacherSummary,
            NewActivity,
            ActivityQuery,
            Activity,
            ActivityListResponse,
            CreateApplication,
            ProcessApplication,
            ApplicationFilter,
            Application,
            ApplicationStatus,
            ApplicationListResponse,
            ReviewAction,
            CreateTicket,
            ReplyTicket,
            TicketStatus,
            TicketReply,
            TicketResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Reports", description = "Attendance reporting APIs"),
        (name = "Activities", description = "Classroom activity APIs"),
        (name = "Evaluations", description = "Teacher evaluation APIs"),
        (name = "Admissions", description = "Admission application APIs"),
        (name = "Support", description = "Support ticket APIs"),
        (name = "Subscriptions", description = "Subscription billing APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
