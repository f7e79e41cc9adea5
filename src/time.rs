//! Reference-timezone date handling
//!
//! Query parameters carry calendar days (`YYYY-MM-DD`) interpreted in the
//! configured reference timezone; `created_at` columns are stored in UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{AppError, AppResult};

/// Parse an optional `YYYY-MM-DD` query parameter.
pub fn parse_date_param(value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| {
            AppError::ValidationError(format!(
                "Invalid date format: {value:?}. Expected YYYY-MM-DD."
            ))
        })
}

/// Midnight of `date` in `tz`, as a UTC instant.
///
/// A nonexistent or ambiguous local midnight (DST transition) resolves to the
/// earliest valid instant.
pub fn day_start_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&local)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&local))
        .with_timezone(&Utc)
}

/// Convert an inclusive calendar-day range in `tz` into a half-open UTC
/// instant range `[start, end)`.
pub fn day_range_utc(start: NaiveDate, end: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (day_start_utc(start, tz), day_start_utc(end + Duration::days(1), tz))
}

/// Today's calendar date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Render a UTC instant in `tz` for display, e.g. `2024-01-05 09:30:00 ET`.
pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

#[cfg(test)]
mod tests;
