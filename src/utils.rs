use crate::config::MAX_MONTHS_BACK;
use crate::error::{DealEngineError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

const MILLIS_PER_DAY: i64 = 86_400_000;

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Moves a (year, month) pair by `delta` calendar months, in either direction.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Inclusive (first day, last day) ranges for the `months_back` calendar months
/// ending with the month that contains `today`, oldest first. The window is
/// clamped to [`MAX_MONTHS_BACK`].
pub fn trailing_month_ranges(today: NaiveDate, months_back: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let months_back = months_back.min(MAX_MONTHS_BACK) as i32;
    (0..months_back)
        .rev()
        .filter_map(|back| {
            let (year, month) = shift_month(today.year(), today.month(), -back);
            let start = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some((start, last_day_of_month(year, month)))
        })
        .collect()
}

/// Whole days elapsed from `from` to `to`, floored. Negative when `from` is later.
pub fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Rounds a currency amount to cents.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Turns an identifier like `gapInsurance` into `Gap Insurance`.
pub fn humanize_identifier(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 4);
    for (i, ch) in id.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            if ch.is_uppercase() {
                out.push(' ');
            }
            out.push(ch);
        }
    }
    out
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_date, end_date)
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let parse_month = |raw: &str, which: &str| -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").map_err(|_| {
            DealEngineError::DateError(format!(
                "Invalid {} date format in period: {}. Expected YYYY-MM",
                which, raw
            ))
        })
    };

    let (start, end_ref) = match parts.as_slice() {
        [single] => {
            let start = parse_month(*single, "start")?;
            (start, start)
        }
        [first, last] => (parse_month(*first, "start")?, parse_month(*last, "end")?),
        _ => {
            return Err(DealEngineError::DateError(format!(
                "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
                period
            )))
        }
    };

    let end = last_day_of_month(end_ref.year(), end_ref.month());
    if end < start {
        return Err(DealEngineError::DateError(format!(
            "Period '{}' ends ({}) before it starts ({})",
            period, end, start
        )));
    }

    Ok((start, end))
}
