use std::collections::HashMap;

use chrono::{Datelike, Days, Months, NaiveDate};
use once_cell::sync::Lazy;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
    Termly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, ToSchema)]
#[strum(ascii_case_insensitive)]
pub enum Term {
    #[serde(rename = "1st Term")]
    #[strum(to_string = "1st Term", serialize = "1st", serialize = "first", serialize = "1")]
    First,
    #[serde(rename = "2nd Term")]
    #[strum(to_string = "2nd Term", serialize = "2nd", serialize = "second", serialize = "2")]
    Second,
    #[serde(rename = "3rd Term")]
    #[strum(to_string = "3rd Term", serialize = "3rd", serialize = "third", serialize = "3")]
    Third,
}

impl Term {
    pub const ALL: [Term; 3] = [Term::First, Term::Second, Term::Third];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TermDates {
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Published term boundaries, keyed by the year the academic session starts.
/// The 2nd and 3rd terms fall in the following calendar year.
const TERM_CALENDAR: &[(i32, Term, (i32, u32, u32), (i32, u32, u32))] = &[
    (2023, Term::First, (2023, 9, 11), (2023, 12, 15)),
    (2023, Term::Second, (2024, 1, 8), (2024, 4, 5)),
    (2023, Term::Third, (2024, 4, 29), (2024, 7, 26)),
    (2024, Term::First, (2024, 9, 9), (2024, 12, 13)),
    (2024, Term::Second, (2025, 1, 8), (2025, 4, 5)),
    (2024, Term::Third, (2025, 4, 28), (2025, 7, 25)),
    (2025, Term::First, (2025, 9, 8), (2025, 12, 12)),
    (2025, Term::Second, (2026, 1, 7), (2026, 4, 3)),
    (2025, Term::Third, (2026, 4, 27), (2026, 7, 24)),
    (2026, Term::First, (2026, 9, 7), (2026, 12, 11)),
    (2026, Term::Second, (2027, 1, 7), (2027, 4, 2)),
    (2026, Term::Third, (2027, 4, 26), (2027, 7, 23)),
];

static TERMS: Lazy<HashMap<(i32, Term), TermDates>> = Lazy::new(|| {
    TERM_CALENDAR
        .iter()
        .map(|&(year, term, (sy, sm, sd), (ey, em, ed))| {
            let dates = TermDates {
                start: ymd(sy, sm, sd),
                end: ymd(ey, em, ed),
            };
            ((year, term), dates)
        })
        .collect()
});

/// Boundaries for years outside the published calendar.
fn standard_term(term: Term, year: i32) -> TermDates {
    match term {
        Term::First => TermDates {
            start: ymd(year, 9, 9),
            end: ymd(year, 12, 13),
        },
        Term::Second => TermDates {
            start: ymd(year + 1, 1, 8),
            end: ymd(year + 1, 4, 5),
        },
        Term::Third => TermDates {
            start: ymd(year + 1, 4, 28),
            end: ymd(year + 1, 7, 25),
        },
    }
}

pub fn term_dates(term: Term, year: i32) -> TermDates {
    TERMS
        .get(&(year, term))
        .copied()
        .unwrap_or_else(|| standard_term(term, year))
}

/// Lookup by display name ("2nd Term"); unknown names resolve to the 1st term.
pub fn get_term_dates(term: &str, year: i32) -> TermDates {
    term_dates(term.trim().parse().unwrap_or(Term::First), year)
}

/// Strict YYYY-MM-DD.
pub fn parse_ymd(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_year(value: Option<&str>) -> Option<i32> {
    value
        .and_then(|v| v.trim().parse::<i32>().ok())
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
}

fn parse_month(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m))
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

/// Year in which the academic session containing `today` started.
fn academic_year(today: NaiveDate) -> i32 {
    if today.month() >= 8 {
        today.year()
    } else {
        today.year() - 1
    }
}

/// The term running on `today`, else the most recent one that has started.
fn current_term(today: NaiveDate, year: i32) -> Term {
    Term::ALL
        .iter()
        .rev()
        .copied()
        .find(|&term| term_dates(term, year).start <= today)
        .unwrap_or(Term::First)
}

/// Caller-supplied report parameters, all optional and unvalidated.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeriodParams<'a> {
    pub report_type: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub term: Option<&'a str>,
    pub year: Option<&'a str>,
    pub month: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPeriod {
    Range {
        #[schema(value_type = String, format = "date")]
        start: NaiveDate,
        #[schema(value_type = String, format = "date")]
        end: NaiveDate,
    },
    Year { year: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResolvedPeriod {
    pub report_type: ReportType,
    pub period: ReportPeriod,
    pub term: Option<Term>,
}

impl ResolvedPeriod {
    pub fn label(&self) -> String {
        match (self.period, self.term) {
            (ReportPeriod::Year { year }, _) => format!("Year {year}"),
            (ReportPeriod::Range { start, end }, Some(term)) => {
                format!("{term}: {start} to {end}")
            }
            (ReportPeriod::Range { start, end }, None) if start == end => start.to_string(),
            (ReportPeriod::Range { start, end }, None) => format!("{start} to {end}"),
        }
    }
}

/// Resolve report parameters against `today`. Never fails: anything malformed
/// falls back to the computed default for that report type.
pub fn resolve_period(params: &PeriodParams<'_>, today: NaiveDate) -> ResolvedPeriod {
    let report_type = params
        .report_type
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(ReportType::Monthly);
    let year = parse_year(params.year);

    let (period, term) = match report_type {
        ReportType::Daily => (
            ReportPeriod::Range {
                start: today,
                end: today,
            },
            None,
        ),
        ReportType::Weekly => {
            let monday = today
                .checked_sub_days(Days::new(today.weekday().num_days_from_monday() as u64))
                .unwrap_or(today);
            let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
            (
                ReportPeriod::Range {
                    start: monday,
                    end: sunday,
                },
                None,
            )
        }
        ReportType::Monthly => {
            let month = parse_month(params.month).unwrap_or(today.month());
            let first = ymd(year.unwrap_or(today.year()), month, 1);
            let mut start = params.start_date.and_then(parse_ymd).unwrap_or(first);
            let mut end = params
                .end_date
                .and_then(parse_ymd)
                .unwrap_or_else(|| last_day_of_month(first));
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            (ReportPeriod::Range { start, end }, None)
        }
        ReportType::Termly => {
            let year = year.unwrap_or_else(|| academic_year(today));
            let term = params
                .term
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or_else(|| current_term(today, year));
            let dates = term_dates(term, year);
            (
                ReportPeriod::Range {
                    start: dates.start,
                    end: dates.end,
                },
                Some(term),
            )
        }
        ReportType::Yearly => (
            ReportPeriod::Year {
                year: year.unwrap_or(today.year()),
            },
            None,
        ),
    };

    ResolvedPeriod {
        report_type,
        period,
        term,
    }
}
