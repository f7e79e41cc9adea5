use chrono_tz::America::New_York;

use super::export::{csv_escape, csv_row, truncate_text};
use super::query_logs::{resolve_filter, LogListParams};
use crate::models::{QueryStatus, StatusFilter};

fn params(start: Option<&str>, end: Option<&str>) -> LogListParams {
    LogListParams {
        start_date: start.map(str::to_string),
        end_date: end.map(str::to_string),
        ..Default::default()
    }
}

#[test]
fn resolve_filter_converts_dates_to_reference_timezone_instants() {
    let filter = resolve_filter(&params(Some("2024-01-01"), Some("2024-01-01")), New_York).unwrap();

    // Midnight ET on Jan 1 through midnight ET on Jan 2, as UTC.
    assert_eq!(
        filter.start_utc.unwrap().to_rfc3339(),
        "2024-01-01T05:00:00+00:00"
    );
    assert_eq!(
        filter.end_utc.unwrap().to_rfc3339(),
        "2024-01-02T05:00:00+00:00"
    );
}

#[test]
fn resolve_filter_accepts_open_ended_ranges() {
    let filter = resolve_filter(&params(Some("2024-06-01"), None), New_York).unwrap();
    assert!(filter.start_utc.is_some());
    assert!(filter.end_utc.is_none());

    let filter = resolve_filter(&params(None, None), New_York).unwrap();
    assert!(filter.start_utc.is_none());
    assert!(filter.end_utc.is_none());
}

#[test]
fn resolve_filter_parses_status_vocabulary() {
    let mut p = params(None, None);
    p.status_filter = Some("blocked".to_string());
    let filter = resolve_filter(&p, New_York).unwrap();
    assert_eq!(filter.status, Some(StatusFilter::Status(QueryStatus::Blocked)));

    p.status_filter = Some("nonsense".to_string());
    assert!(resolve_filter(&p, New_York).is_err());
}

#[test]
fn resolve_filter_bounds_limit_and_offset() {
    let mut p = params(None, None);
    p.limit = Some(0);
    assert!(resolve_filter(&p, New_York).is_err());

    p.limit = Some(100_000);
    assert!(resolve_filter(&p, New_York).is_err());

    p.limit = Some(500);
    p.offset = Some(-1);
    assert!(resolve_filter(&p, New_York).is_err());

    p.offset = Some(20);
    let filter = resolve_filter(&p, New_York).unwrap();
    assert_eq!(filter.limit, Some(500));
    assert_eq!(filter.offset, 20);
}

#[test]
fn resolve_filter_drops_blank_search_text() {
    let mut p = params(None, None);
    p.q = Some("   ".to_string());
    let filter = resolve_filter(&p, New_York).unwrap();
    assert_eq!(filter.text, None);

    p.q = Some("housing".to_string());
    let filter = resolve_filter(&p, New_York).unwrap();
    assert_eq!(filter.text.as_deref(), Some("housing"));
}

#[test]
fn csv_escape_quotes_only_when_needed() {
    assert_eq!(csv_escape("plain"), "plain");
    assert_eq!(csv_escape("a,b"), "\"a,b\"");
    assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
}

#[test]
fn csv_row_joins_fields_with_crlf_terminator() {
    let row = csv_row(&["1".to_string(), "a,b".to_string(), "c".to_string()]);
    assert_eq!(row, "1,\"a,b\",c\r\n");
}

#[test]
fn truncate_text_is_character_boundary_safe() {
    assert_eq!(truncate_text("short", 10), "short");
    assert_eq!(truncate_text("abcdef", 3), "abc…");
    // Multi-byte characters stay intact.
    assert_eq!(truncate_text("héllo wörld", 5), "héllo…");
}
