use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRow, AttendanceStatus};

/// present / total × 100 rounded to two decimals, 0 when nothing was recorded.
pub fn attendance_rate(present_days: u32, total_days: u32) -> f64 {
    if total_days == 0 {
        return 0.0;
    }
    let rate = present_days as f64 / total_days as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyRecord {
    #[schema(value_type = String, format = "date", example = "2024-06-03")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "07:55:00")]
    pub sign_in_time: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SummaryCounts {
    pub total_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub late_days: u32,
    pub agreed_days: u32,
    pub not_agreed_days: u32,
    pub pending_days: u32,
    pub attendance_rate: f64,
}

impl SummaryCounts {
    fn count_status(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Agreed => {
                self.agreed_days += 1;
                self.present_days += 1;
            }
            AttendanceStatus::NotAgreed => self.not_agreed_days += 1,
            AttendanceStatus::Pending => self.pending_days += 1,
        }
    }

    fn finish(&mut self) {
        self.attendance_rate = attendance_rate(self.present_days, self.total_days);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TeacherSummary {
    pub teacher_id: u64,
    pub full_name: String,
    pub email: String,
    pub daily_records: Vec<DailyRecord>,
    pub summary: SummaryCounts,
}

/// Overall totals. `total_days` counts distinct calendar days across all
/// teachers, so it is not the sum of the per-teacher totals.
pub type OverallSummary = SummaryCounts;

/// Per-teacher summaries keyed by teacher id, iterated in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TeacherSummaries {
    summaries: Vec<TeacherSummary>,
    #[serde(skip)]
    index: HashMap<u64, usize>,
}

impl TeacherSummaries {
    pub fn get(&self, teacher_id: u64) -> Option<&TeacherSummary> {
        self.index.get(&teacher_id).map(|&i| &self.summaries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeacherSummary> {
        self.summaries.iter()
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn into_vec(self) -> Vec<TeacherSummary> {
        self.summaries
    }

    fn entry(&mut self, row: &AttendanceRow) -> &mut TeacherSummary {
        let next = self.summaries.len();
        let i = *self.index.entry(row.teacher_id).or_insert(next);
        if i == next {
            self.summaries.push(TeacherSummary {
                teacher_id: row.teacher_id,
                full_name: row.full_name.clone(),
                email: row.email.clone(),
                daily_records: Vec::new(),
                summary: SummaryCounts::default(),
            });
        }
        &mut self.summaries[i]
    }
}

pub fn build_per_teacher_summaries(rows: &[AttendanceRow]) -> TeacherSummaries {
    let mut teachers = TeacherSummaries::default();

    for row in rows {
        let teacher = teachers.entry(row);

        let Some(date) = row.attendance_date else {
            teacher.summary.absent_days += 1;
            continue;
        };

        teacher.daily_records.push(DailyRecord {
            date,
            sign_in_time: row.sign_in_time,
            status: row.status,
            is_late: row.is_late,
            notes: row.notes.clone(),
        });
        teacher.summary.total_days += 1;
        teacher.summary.count_status(row.status);
        if row.is_late {
            teacher.summary.late_days += 1;
        }
    }

    for teacher in &mut teachers.summaries {
        teacher.summary.finish();
    }
    teachers
}

pub fn build_overall_summary(rows: &[AttendanceRow]) -> OverallSummary {
    let mut overall = OverallSummary::default();
    let mut days_seen: HashSet<NaiveDate> = HashSet::new();
    let mut teacher_days_seen: HashSet<(u64, NaiveDate)> = HashSet::new();

    for row in rows {
        let Some(date) = row.attendance_date else {
            overall.absent_days += 1;
            continue;
        };

        if days_seen.insert(date) {
            overall.total_days += 1;
        }

        if teacher_days_seen.insert((row.teacher_id, date)) {
            overall.count_status(row.status);
            if row.is_late {
                overall.late_days += 1;
            }
        }
    }

    overall.finish();
    overall
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn row(teacher_id: u64, date: Option<NaiveDate>, status: AttendanceStatus, is_late: bool) -> AttendanceRow {
        AttendanceRow {
            teacher_id,
            full_name: format!("Teacher {teacher_id}"),
            email: format!("t{teacher_id}@school.test"),
            attendance_date: date,
            sign_in_time: date.map(|_| NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            status,
            is_late,
            expected_arrival: None,
            notes: None,
        }
    }

    #[test]
    fn empty_input_gives_zero_summaries() {
        let teachers = build_per_teacher_summaries(&[]);
        let overall = build_overall_summary(&[]);
        assert!(teachers.is_empty());
        assert_eq!(overall, OverallSummary::default());
        assert_eq!(overall.attendance_rate, 0.0);
    }

    #[test]
    fn ten_rows_for_one_teacher() {
        let mut rows = Vec::new();
        for d in 1..=7 {
            rows.push(row(1, Some(day(d)), AttendanceStatus::Agreed, d <= 3));
        }
        rows.push(row(1, Some(day(8)), AttendanceStatus::NotAgreed, false));
        rows.push(row(1, Some(day(9)), AttendanceStatus::NotAgreed, false));
        rows.push(row(1, Some(day(10)), AttendanceStatus::Pending, false));

        let teachers = build_per_teacher_summaries(&rows);
        let summary = &teachers.get(1).unwrap().summary;
        assert_eq!(summary.total_days, 10);
        assert_eq!(summary.present_days, 7);
        assert_eq!(summary.agreed_days, 7);
        assert_eq!(summary.not_agreed_days, 2);
        assert_eq!(summary.pending_days, 1);
        assert_eq!(summary.late_days, 3);
        assert_eq!(summary.absent_days, 0);
        assert_eq!(summary.attendance_rate, 70.0);
        assert_eq!(teachers.get(1).unwrap().daily_records.len(), 10);

        let overall = build_overall_summary(&rows);
        assert_eq!(overall.total_days, 10);
        assert_eq!(overall.present_days, 7);
        assert_eq!(overall.attendance_rate, 70.0);
    }

    #[test]
    fn absence_only_teacher_has_no_total_days() {
        let rows = vec![row(1, None, AttendanceStatus::Pending, false)];
        let teachers = build_per_teacher_summaries(&rows);
        let teacher = teachers.get(1).unwrap();
        assert_eq!(teacher.summary.total_days, 0);
        assert_eq!(teacher.summary.absent_days, 1);
        assert_eq!(teacher.summary.attendance_rate, 0.0);
        assert!(teacher.daily_records.is_empty());
    }

    #[test]
    fn duplicate_teacher_day_counted_once_overall() {
        let rows = vec![
            row(1, Some(day(3)), AttendanceStatus::Agreed, false),
            row(1, Some(day(3)), AttendanceStatus::Agreed, false),
        ];
        let overall = build_overall_summary(&rows);
        assert_eq!(overall.total_days, 1);
        assert_eq!(overall.present_days, 1);
        assert_eq!(overall.agreed_days, 1);

        // per-teacher counting does not dedup
        let teachers = build_per_teacher_summaries(&rows);
        assert_eq!(teachers.get(1).unwrap().summary.total_days, 2);
    }

    #[test]
    fn overall_days_are_distinct_across_teachers() {
        let rows = vec![
            row(1, Some(day(3)), AttendanceStatus::Agreed, false),
            row(2, Some(day(3)), AttendanceStatus::Agreed, true),
            row(2, Some(day(4)), AttendanceStatus::NotAgreed, false),
            row(3, None, AttendanceStatus::Pending, false),
        ];
        let teachers = build_per_teacher_summaries(&rows);
        let overall = build_overall_summary(&rows);

        let summed: u32 = teachers.iter().map(|t| t.summary.total_days).sum();
        assert_eq!(summed, 3);
        assert_eq!(overall.total_days, 2);
        assert!(summed >= overall.total_days);

        assert_eq!(overall.present_days, 2);
        assert_eq!(overall.not_agreed_days, 1);
        assert_eq!(overall.late_days, 1);
        assert_eq!(overall.absent_days, 1);
        // two present teacher-days over two distinct calendar days
        assert_eq!(overall.attendance_rate, 100.0);
    }

    #[test]
    fn keeps_first_seen_order_and_identity() {
        let mut first = row(9, Some(day(1)), AttendanceStatus::Agreed, false);
        first.full_name = "Zed First".into();
        let mut later = row(9, Some(day(2)), AttendanceStatus::Agreed, false);
        later.full_name = "Zed Renamed".into();
        let rows = vec![first, row(4, None, AttendanceStatus::Pending, false), later];

        let teachers = build_per_teacher_summaries(&rows);
        let ids: Vec<u64> = teachers.iter().map(|t| t.teacher_id).collect();
        assert_eq!(ids, vec![9, 4]);
        assert_eq!(teachers.get(9).unwrap().full_name, "Zed First");
    }

    #[test]
    fn aggregation_is_idempotent() {
        let rows = vec![
            row(1, Some(day(3)), AttendanceStatus::Agreed, true),
            row(2, None, AttendanceStatus::Pending, false),
            row(1, Some(day(4)), AttendanceStatus::Pending, false),
        ];
        assert_eq!(build_per_teacher_summaries(&rows), build_per_teacher_summaries(&rows));
        assert_eq!(build_overall_summary(&rows), build_overall_summary(&rows));
    }

    #[test]
    fn rate_rounds_to_two_decimals() {
        assert_eq!(attendance_rate(2, 3), 66.67);
        assert_eq!(attendance_rate(1, 3), 33.33);
        assert_eq!(attendance_rate(0, 0), 0.0);
    }
}
