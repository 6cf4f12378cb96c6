use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Approval state of a sign-in. Only `Agreed` counts as present.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Agreed,
    NotAgreed,
    Pending,
}

impl AttendanceStatus {
    /// Anything the database holds that is not a known status is pending review.
    pub fn from_db(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(AttendanceStatus::Pending)
    }
}

/// Raw shape of the users / time_records / attendance_settings join.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRowSql {
    pub teacher_id: u64,
    pub full_name: String,
    pub email: String,
    pub attendance_date: Option<NaiveDate>,
    pub sign_in_time: Option<NaiveTime>,
    pub status: Option<String>,
    pub expected_arrival: Option<NaiveTime>,
    pub notes: Option<String>,
}

/// One attendance event for a teacher. `attendance_date == None` is an absence.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRow {
    pub teacher_id: u64,
    pub full_name: String,
    pub email: String,
    pub attendance_date: Option<NaiveDate>,
    pub sign_in_time: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub expected_arrival: Option<NaiveTime>,
    pub notes: Option<String>,
}

impl From<AttendanceRowSql> for AttendanceRow {
    fn from(row: AttendanceRowSql) -> Self {
        let is_late = match (row.sign_in_time, row.expected_arrival) {
            (Some(signed_in), Some(expected)) => signed_in > expected,
            _ => false,
        };

        Self {
            teacher_id: row.teacher_id,
            full_name: row.full_name,
            email: row.email,
            attendance_date: row.attendance_date,
            sign_in_time: row.sign_in_time,
            status: AttendanceStatus::from_db(row.status.as_deref()),
            is_late,
            expected_arrival: row.expected_arrival,
            notes: row.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_row(sign_in: Option<&str>, expected: Option<&str>, status: Option<&str>) -> AttendanceRowSql {
        let time = |s: &str| NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap();
        AttendanceRowSql {
            teacher_id: 7,
            full_name: "Ada Obi".into(),
            email: "ada@school.test".into(),
            attendance_date: NaiveDate::from_ymd_opt(2024, 5, 6),
            sign_in_time: sign_in.map(time),
            status: status.map(str::to_string),
            expected_arrival: expected.map(time),
            notes: None,
        }
    }

    #[test]
    fn late_when_signed_in_after_expected_arrival() {
        let row: AttendanceRow = sql_row(Some("08:05:00"), Some("08:00:00"), Some("agreed")).into();
        assert!(row.is_late);
        assert_eq!(row.status, AttendanceStatus::Agreed);
    }

    #[test]
    fn on_time_or_missing_settings_is_not_late() {
        let on_time: AttendanceRow = sql_row(Some("08:00:00"), Some("08:00:00"), None).into();
        assert!(!on_time.is_late);

        let no_settings: AttendanceRow = sql_row(Some("09:30:00"), None, None).into();
        assert!(!no_settings.is_late);
    }

    #[test]
    fn unknown_status_maps_to_pending() {
        assert_eq!(AttendanceStatus::from_db(Some("not_agreed")), AttendanceStatus::NotAgreed);
        assert_eq!(AttendanceStatus::from_db(Some("approved?")), AttendanceStatus::Pending);
        assert_eq!(AttendanceStatus::from_db(None), AttendanceStatus::Pending);
    }
}
