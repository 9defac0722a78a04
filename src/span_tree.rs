//! Span-Tree Builder.
//!
//! Spans are stored in a flat arena (`Vec<Span>`) addressed by [`SpanId`]
//! rather than as a pointer-linked tree, the same index-based adjacency
//! approach as a graph keyed by integer node ids — it sidesteps
//! `Rc<RefCell<_>>` entirely and keeps parent/child wiring as plain
//! integers.

use crate::config::AnalysisConfig;
use crate::ingest::{ClosedSpan, ParseResult};
use crate::trace_event::Event;

/// Index into [`SpanTree::nodes`]. Index `0` is always the synthetic root.
pub type SpanId = usize;

/// One node in the built tree: a closed interval, the event that produced
/// it (`None` for the synthetic root), and its promoted children in
/// start-time order.
#[derive(Debug, Clone)]
pub struct Span {
    pub start: i64,
    pub end: i64,
    pub event: Option<Event>,
    pub children: Vec<SpanId>,
    pub type_tree: Option<crate::type_tree::TypeTree>,
}

impl Span {
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted, pruned span tree.
#[derive(Debug, Clone)]
pub struct SpanTree {
    pub nodes: Vec<Span>,
}

pub const ROOT: SpanId = 0;

impl SpanTree {
    pub fn root(&self) -> &Span {
        &self.nodes[ROOT]
    }

    pub fn get(&self, id: SpanId) -> &Span {
        &self.nodes[id]
    }
}

/// Builds the pruned span tree from an ingester result.
pub fn build(parse_result: &ParseResult, config: &AnalysisConfig) -> SpanTree {
    let ParseResult {
        min_time,
        max_time,
        spans,
        unclosed,
    } = parse_result;

    let mut all_spans: Vec<ClosedSpan> = spans.clone();
    for begin in unclosed {
        all_spans.push(ClosedSpan {
            start: begin.ts,
            end: *max_time,
            event: begin.clone(),
        });
    }
    // Stable sort preserves arrival order for spans sharing a start time.
    all_spans.sort_by_key(|span| span.start);

    let mut nodes = vec![Span {
        start: *min_time,
        end: *max_time,
        event: None,
        children: Vec::new(),
        type_tree: None,
    }];

    // The ancestor stack holds (span_id, end) for every currently-open
    // ancestor, spine-first; it is popped whenever the next span starts at
    // or after an ancestor's end.
    let mut ancestor_stack: Vec<SpanId> = vec![ROOT];

    for closed in all_spans {
        while ancestor_stack.len() > 1 {
            let top = *ancestor_stack.last().unwrap();
            if nodes[top].end <= closed.start {
                ancestor_stack.pop();
            } else {
                break;
            }
        }
        let parent = *ancestor_stack.last().unwrap();
        let duration = closed.end - closed.start;
        let parent_duration = nodes[parent].duration();

        let promoted = duration >= config.threshold_duration
            || (parent_duration > 0
                && (duration as f64) >= config.min_percentage * (parent_duration as f64));
        if !promoted {
            continue;
        }

        let id = nodes.len();
        nodes.push(Span {
            start: closed.start,
            end: closed.end,
            event: Some(closed.event),
            children: Vec::new(),
            type_tree: None,
        });
        nodes[parent].children.push(id);
        ancestor_stack.push(id);
    }

    SpanTree { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse;

    fn build_from_trace(trace: &[u8], config: &AnalysisConfig) -> SpanTree {
        let parsed = parse(trace, config.min_duration).unwrap();
        build(&parsed, config)
    }

    #[test]
    fn test_single_long_span_is_promoted() {
        let config = AnalysisConfig::default();
        let trace = br#"[{"ph":"X","ts":0,"dur":1000000,"name":"root","cat":"x"}]"#;
        let tree = build_from_trace(trace, &config);
        assert_eq!(tree.root().children.len(), 1);
        let child = tree.get(tree.root().children[0]);
        assert_eq!(child.duration(), 1_000_000);
    }

    #[test]
    fn test_dominant_child_promoted_weak_child_pruned() {
        let config = AnalysisConfig {
            threshold_duration: 500_000,
            min_duration: 10_000,
            min_percentage: 0.6,
        };
        let trace = br#"[
            {"ph":"X","ts":0,"dur":1000000,"name":"parent","cat":"x"},
            {"ph":"X","ts":0,"dur":700000,"name":"dominant_child","cat":"x"},
            {"ph":"X","ts":700000,"dur":50000,"name":"weak_child","cat":"x"}
        ]"#;
        let tree = build_from_trace(trace, &config);
        assert_eq!(tree.root().children.len(), 1);
        let parent_id = tree.root().children[0];
        let parent = tree.get(parent_id);
        assert_eq!(parent.children.len(), 1);
        let child = tree.get(parent.children[0]);
        assert_eq!(child.event.as_ref().unwrap().name, "dominant_child");
    }

    #[test]
    fn test_siblings_do_not_overlap_and_are_contained_in_parent() {
        let config = AnalysisConfig {
            threshold_duration: 1,
            min_duration: 0,
            min_percentage: 1.0,
        };
        let trace = br#"[
            {"ph":"X","ts":0,"dur":1000,"name":"parent","cat":"x"},
            {"ph":"X","ts":0,"dur":500,"name":"a","cat":"x"},
            {"ph":"X","ts":500,"dur":500,"name":"b","cat":"x"}
        ]"#;
        let tree = build_from_trace(trace, &config);
        let parent_id = tree.root().children[0];
        let parent = tree.get(parent_id).clone();
        assert_eq!(parent.children.len(), 2);
        let a = tree.get(parent.children[0]);
        let b = tree.get(parent.children[1]);
        assert!(a.end <= b.start);
        assert!(a.start >= parent.start && b.end <= parent.end);
    }

    #[test]
    fn test_unclosed_begin_synthesizes_span_to_max_time() {
        let config = AnalysisConfig {
            threshold_duration: 0,
            min_duration: 0,
            min_percentage: 1.0,
        };
        let trace = br#"[{"ph":"B","ts":100,"name":"x","cat":"c"}]"#;
        let tree = build_from_trace(trace, &config);
        assert_eq!(tree.root().children.len(), 1);
        let child = tree.get(tree.root().children[0]);
        assert_eq!(child.start, 100);
        assert_eq!(child.end, 100);
    }
}
