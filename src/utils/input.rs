//! Cleaning and validation helpers for form input.

use std::borrow::Cow;

use chrono::{Local, NaiveDate};
use validator::ValidationError;

use crate::report::period::parse_ymd;

/// Trims, drops markup tags and control characters (newlines and tabs kept).
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;

    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '\n' | '\t' => out.push(c),
            _ if c.is_control() => {}
            _ => out.push(c),
        }
    }

    out.trim().to_string()
}

pub fn clean_optional(raw: Option<&str>) -> Option<String> {
    raw.map(clean_text).filter(|s| !s.is_empty())
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "must not be blank"));
    }
    Ok(())
}

pub fn validate_ymd(value: &str) -> Result<(), ValidationError> {
    parse_ymd(value)
        .map(|_| ())
        .ok_or_else(|| error("date_format", "must be YYYY-MM-DD"))
}

/// Digits with an optional leading `+`, spaces and dashes allowed, 7 to 15 digits.
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let body = value.trim().strip_prefix('+').unwrap_or(value.trim());
    let digits = body.chars().filter(char::is_ascii_digit).count();
    let allowed = body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    if !allowed || !(7..=15).contains(&digits) {
        return Err(error("phone", "must be a phone number"));
    }
    Ok(())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
