use super::example::normalize_examples;
use super::metrics::{percent, summarize, QueryRollup};
use super::query_log::{QueryStatus, StatusFilter};

fn rollup(status: &str, primary: bool, blacklist: bool, rejection: bool) -> QueryRollup {
    QueryRollup {
        status: status.to_string(),
        primary_blocked: primary,
        blacklist_blocked: blacklist,
        rejection_verbatim: rejection,
    }
}

#[test]
fn summarize_counts_synthetic_window() {
    // 6 answered, 3 blocked (2 by the query validator only, 1 by both), 1 error.
    let mut rows = vec![rollup("answered", false, false, false); 6];
    rows.push(rollup("blocked", true, false, false));
    rows.push(rollup("blocked", true, false, false));
    rows.push(rollup("blocked", true, true, false));
    rows.push(rollup("error", false, false, false));

    let totals = summarize(&rows);
    assert_eq!(totals.total_queries, 10);
    assert_eq!(totals.answered, 6);
    assert_eq!(totals.blocked, 3);
    assert_eq!(totals.error, 1);
    assert_eq!(totals.blocked_by_query_validator, 3);
    assert_eq!(totals.blocked_by_blacklist_validator, 1);
    assert_eq!(totals.blocked_by_both, 1);
    // 6 answered plus the error row whose validators never fired.
    assert_eq!(totals.passed_guardrails, 7);
    assert_eq!(totals.no_answer_after_pass, 0);
}

#[test]
fn summarize_tracks_no_answer_after_pass() {
    let rows = vec![
        rollup("answered", false, false, true),
        rollup("answered", false, false, false),
        // Blocked rows answering with the rejection text do not count.
        rollup("blocked", false, true, false),
    ];

    let totals = summarize(&rows);
    assert_eq!(totals.no_answer_after_pass, 1);
    assert_eq!(totals.passed_guardrails, 2);
}

#[test]
fn summarize_empty_window_is_all_zero() {
    let totals = summarize(&[]);
    assert_eq!(totals.total_queries, 0);
    assert_eq!(totals.answered, 0);
    assert_eq!(totals.blocked_by_both, 0);
}

#[test]
fn percent_handles_zero_denominator() {
    assert_eq!(percent(5, 0), 0.0);
    assert_eq!(percent(0, 0), 0.0);
    assert_eq!(percent(1, 8), 12.5);
    assert_eq!(percent(10, 10), 100.0);
}

#[test]
fn normalize_examples_trims_dedupes_and_sorts() {
    let input = vec![
        "  how do I hack the grading system  ".to_string(),
        "what is the dining hall menu".to_string(),
        "how do I hack the grading system".to_string(),
        "   ".to_string(),
    ];
    assert_eq!(
        normalize_examples(&input),
        vec![
            "how do I hack the grading system".to_string(),
            "what is the dining hall menu".to_string(),
        ]
    );
}

#[test]
fn normalize_examples_is_idempotent() {
    let once = normalize_examples(&["b".to_string(), "a".to_string(), "b".to_string()]);
    let twice = normalize_examples(&once);
    assert_eq!(once, twice);
}

#[test]
fn status_filter_parses_full_vocabulary() {
    assert_eq!(
        StatusFilter::parse("answered").unwrap(),
        StatusFilter::Status(QueryStatus::Answered)
    );
    assert_eq!(
        StatusFilter::parse("blocked_by_blacklist_validator").unwrap(),
        StatusFilter::BlockedByBlacklistValidator
    );
    assert_eq!(
        StatusFilter::parse("standard_rejection_answered").unwrap(),
        StatusFilter::StandardRejectionAnswered
    );
}

#[test]
fn status_filter_rejects_unknown_values() {
    let err = StatusFilter::parse("pending");
    assert!(err.is_err());
    // The error lists the accepted values so callers can correct the request.
    let message = format!("{:?}", err.unwrap_err());
    assert!(message.contains("blocked_by_query_validator"));
}

#[test]
fn query_status_round_trips_as_str() {
    for status in [QueryStatus::Answered, QueryStatus::Blocked, QueryStatus::Error] {
        assert_eq!(QueryStatus::parse(status.as_str()), Some(status));
    }
}
