//! Position Collector and the raw/normalized position data model.

use crate::span_tree::{SpanTree, ROOT};
use crate::trace_event::EventArgs;
use crate::type_tree::TypeTree;
use std::collections::HashMap;

/// Either a byte offset (negative = "end of token") or a 1-based
/// `(line, column)` pair, as collected from the span tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawPosition {
    Offset(i64),
    LineCol(u32, u32),
}

/// A normalized `(line, column)` pair naming the first non-trivia character
/// at or after a raw position, together with that character's absolute
/// byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPosition {
    pub line: u32,
    pub column: u32,
    pub offset: u64,
}

/// A per-file mapping from raw position to its normalized position.
pub type PositionMap = HashMap<RawPosition, NormalizedPosition>;

/// All raw positions that need normalization, grouped by the source file
/// they belong to.
pub type PositionRequests = HashMap<String, Vec<RawPosition>>;

/// Walks the annotated tree collecting, per source file, the raw positions
/// that need normalization.
pub fn collect(tree: &SpanTree) -> PositionRequests {
    let mut requests: PositionRequests = HashMap::new();
    collect_node(tree, ROOT, None, &mut requests);
    requests
}

fn collect_node(
    tree: &SpanTree,
    id: usize,
    current_file: Option<&str>,
    requests: &mut PositionRequests,
) {
    let span = tree.get(id);
    let mut file_for_subtree = current_file.map(str::to_string);

    if let Some(event) = &span.event {
        if let EventArgs::CheckSourceFile { path } = event.typed_args() {
            file_for_subtree = Some(path);
        }
        if event.category == "check" {
            if let Some(file) = &file_for_subtree {
                if let EventArgs::Check { pos, end } = event.typed_args() {
                    let bucket = requests.entry(file.clone()).or_default();
                    if let Some(pos) = pos {
                        bucket.push(RawPosition::Offset(pos));
                    }
                    if let Some(end) = end {
                        bucket.push(RawPosition::Offset(-end));
                    }
                }
            }
        }
    }

    if let Some(type_tree) = &span.type_tree {
        collect_type_tree(type_tree, requests);
    }

    for &child in &span.children {
        collect_node(tree, child, file_for_subtree.as_deref(), requests);
    }
}

fn collect_type_tree(tree: &TypeTree, requests: &mut PositionRequests) {
    for node in tree.values() {
        if let Some(location) = &node.location {
            requests
                .entry(location.path.clone())
                .or_default()
                .push(RawPosition::LineCol(location.line, location.column));
        }
        collect_type_tree(&node.children, requests);
    }
}
