use super::*;
use chrono::NaiveDate;
use chrono_tz::America::New_York;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn parse_date_param_accepts_iso_dates() {
    assert_eq!(parse_date_param(Some("2024-01-05")).unwrap(), Some(d(2024, 1, 5)));
    assert_eq!(parse_date_param(None).unwrap(), None);
    assert_eq!(parse_date_param(Some("  ")).unwrap(), None);
}

#[test]
fn parse_date_param_rejects_garbage() {
    assert!(parse_date_param(Some("01/05/2024")).is_err());
    assert!(parse_date_param(Some("2024-13-01")).is_err());
}

#[test]
fn winter_midnight_is_five_hours_behind_utc() {
    let start = day_start_utc(d(2024, 1, 15), New_York);
    assert_eq!(start.to_rfc3339(), "2024-01-15T05:00:00+00:00");
}

#[test]
fn summer_midnight_is_four_hours_behind_utc() {
    let start = day_start_utc(d(2024, 7, 15), New_York);
    assert_eq!(start.to_rfc3339(), "2024-07-15T04:00:00+00:00");
}

#[test]
fn single_day_range_is_half_open_over_one_local_day() {
    let (start, end) = day_range_utc(d(2024, 1, 1), d(2024, 1, 1), New_York);
    assert_eq!(start.to_rfc3339(), "2024-01-01T05:00:00+00:00");
    assert_eq!(end.to_rfc3339(), "2024-01-02T05:00:00+00:00");
}

#[test]
fn range_spanning_dst_change_keeps_local_day_boundaries() {
    // US spring-forward: 2024-03-10.
    let (start, end) = day_range_utc(d(2024, 3, 9), d(2024, 3, 10), New_York);
    assert_eq!(start.to_rfc3339(), "2024-03-09T05:00:00+00:00");
    // Midnight on the 11th is already EDT.
    assert_eq!(end.to_rfc3339(), "2024-03-11T04:00:00+00:00");
}

#[test]
fn format_local_renders_zone_abbreviation() {
    let at = day_start_utc(d(2024, 1, 15), New_York);
    assert_eq!(format_local(at, New_York), "2024-01-15 00:00:00 EST");
}
