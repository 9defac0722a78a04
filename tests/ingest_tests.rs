//! Integration coverage for the streaming trace ingester against full,
//! realistic traces rather than unit-level fragments.

use trace_hotspots::ingest::parse;

#[test]
fn test_mixed_phase_trace_reconstructs_expected_spans() {
    let trace = br#"[
        {"ph":"M","ts":0,"name":"process_name","cat":"__metadata","args":{"name":"tsc"}},
        {"ph":"B","ts":0,"name":"checkSourceFile","cat":"check","args":{"path":"a.ts"}},
        {"ph":"X","ts":100,"dur":900,"name":"isTypeAssignableTo","cat":"check","args":{"pos":10,"end":50}},
        {"ph":"i","ts":500,"name":"gc","cat":"v8"},
        {"ph":"E","ts":1000,"name":"checkSourceFile","cat":"check"}
    ]"#;
    let result = parse(trace.as_slice(), 0).unwrap();
    assert_eq!(result.min_time, 0);
    assert_eq!(result.max_time, 1000);
    // Metadata and instant events never become spans.
    assert_eq!(result.spans.len(), 2);
    assert!(result.unclosed.is_empty());
}

#[test]
fn test_unknown_phase_is_skipped_without_aborting_the_parse() {
    let trace = br#"[
        {"ph":"Q","ts":0,"name":"weird","cat":"c"},
        {"ph":"X","ts":0,"dur":10,"name":"known","cat":"c"}
    ]"#;
    let result = parse(trace.as_slice(), 0).unwrap();
    assert_eq!(result.spans.len(), 1);
    assert_eq!(result.spans[0].event.name, "known");
}

#[test]
fn test_min_duration_floor_drops_short_spans_but_not_their_time_bounds() {
    let trace = br#"[
        {"ph":"X","ts":0,"dur":5,"name":"short","cat":"c"},
        {"ph":"X","ts":1000,"dur":2000,"name":"long","cat":"c"}
    ]"#;
    let result = parse(trace.as_slice(), 1000).unwrap();
    assert_eq!(result.spans.len(), 1);
    assert_eq!(result.spans[0].event.name, "long");
    assert_eq!(result.min_time, 0);
    assert_eq!(result.max_time, 3000);
}
