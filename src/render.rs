//! Printable-Tree Renderer: owns the data shape and the walk that fills it
//! in. Terminal colorization or ASCII-tree drawing are left to callers of
//! this data.

use crate::position::{PositionMap, RawPosition};
use crate::span_tree::{Span, SpanId, SpanTree};
use crate::trace_event::{Event, EventArgs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One node of the rendered tree, matching the printable-tree JSON shape
/// field for field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintableNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(rename = "terseMessage")]
    pub terse_message: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<PrintablePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<PrintablePosition>,
    pub children: Vec<PrintableNode>,
}

/// A raw `{file, offset}` pair — the byte offset as collected, not the
/// normalized `(line, column)`; the resolved position shows up in
/// `message` instead for generic check-category spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintablePosition {
    pub file: String,
    pub offset: i64,
}

struct RenderedKind {
    kind: String,
    message: String,
    terse_message: String,
    start: Option<PrintablePosition>,
    end: Option<PrintablePosition>,
}

/// Renders the top-level hot spots (the synthetic root's children — the
/// root itself is never a node in the output) sorted by descending
/// duration.
pub fn render(tree: &SpanTree, positions: &HashMap<String, PositionMap>) -> Vec<PrintableNode> {
    render_children(tree, tree.root(), None, positions)
}

fn render_children(
    tree: &SpanTree,
    span: &Span,
    current_file: Option<&str>,
    positions: &HashMap<String, PositionMap>,
) -> Vec<PrintableNode> {
    let mut scored: Vec<(i64, PrintableNode)> = span
        .children
        .iter()
        .filter_map(|&id| {
            let duration = tree.get(id).duration();
            render_node(tree, id, current_file, positions).map(|node| (duration, node))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, node)| node).collect()
}

/// Renders one span, or `None` if its event doesn't map to any recognized
/// kind — elided without recursing into children, so its subtree is
/// dropped with it rather than hoisted.
fn render_node(
    tree: &SpanTree,
    id: SpanId,
    current_file: Option<&str>,
    positions: &HashMap<String, PositionMap>,
) -> Option<PrintableNode> {
    let span = tree.get(id);
    let event = span.event.as_ref()?;

    let mut file_for_subtree = current_file.map(str::to_string);
    if event.name == "checkSourceFile" {
        if let EventArgs::CheckSourceFile { path } = event.typed_args() {
            file_for_subtree = Some(path);
        }
    }

    let info = classify(event, file_for_subtree.as_deref(), positions)?;
    let children = render_children(tree, span, file_for_subtree.as_deref(), positions);

    Some(PrintableNode {
        kind: info.kind,
        message: info.message,
        terse_message: info.terse_message,
        time: format!("{}ms", round_ms(span.duration())),
        start: info.start,
        end: info.end,
        children,
    })
}

fn classify(
    event: &Event,
    current_file: Option<&str>,
    positions: &HashMap<String, PositionMap>,
) -> Option<RenderedKind> {
    if event.name == "checkSourceFile" {
        let EventArgs::CheckSourceFile { path } = event.typed_args() else {
            return None;
        };
        return Some(RenderedKind {
            kind: "checkSourceFile".to_string(),
            message: format!("Check source file {path}"),
            terse_message: path,
            start: None,
            end: None,
        });
    }

    if event.name == "structuredTypeRelatedTo" {
        let EventArgs::StructuredTypeRelatedTo {
            source_id,
            target_id,
        } = event.typed_args()
        else {
            return None;
        };
        return Some(RenderedKind {
            kind: "structuredTypeRelatedTo".to_string(),
            message: format!("Relate type {source_id} to {target_id}"),
            terse_message: "structuredTypeRelatedTo".to_string(),
            start: None,
            end: None,
        });
    }

    if event.name == "getVariancesWorker" {
        return Some(RenderedKind {
            kind: "getVariancesWorker".to_string(),
            message: "Compute type parameter variances".to_string(),
            terse_message: "getVariancesWorker".to_string(),
            start: None,
            end: None,
        });
    }

    if event.category == "check" {
        let file = current_file?;
        let (pos, end) = match event.typed_args() {
            EventArgs::Check { pos, end } => (pos, end),
            _ => (None, None),
        };
        let start = pos.map(|p| describe_position(file, RawPosition::Offset(p), p, positions));
        let end_desc =
            end.map(|e| describe_position(file, RawPosition::Offset(-e), e, positions));
        let range = match (&start, &end_desc) {
            (Some((_, s)), Some((_, e))) => format!("{s}-{e}"),
            (Some((_, s)), None) => s.clone(),
            (None, Some((_, e))) => e.clone(),
            (None, None) => "?".to_string(),
        };
        return Some(RenderedKind {
            kind: "check".to_string(),
            message: format!("{} {range}", event.name),
            terse_message: event.name.clone(),
            start: start.map(|(position, _)| position),
            end: end_desc.map(|(position, _)| position),
        });
    }

    None
}

/// Looks up `raw` in the resolved position map for `file`, yielding the
/// `{file, offset}` pair for the JSON output and a `"line:column"` label for
/// the human-readable message. A position with no map entry (source file
/// unreadable, or simply unresolved) falls back to the raw offset itself.
fn describe_position(
    file: &str,
    raw: RawPosition,
    raw_offset: i64,
    positions: &HashMap<String, PositionMap>,
) -> (PrintablePosition, String) {
    let normalized = positions.get(file).and_then(|map| map.get(&raw));
    let label = match normalized {
        Some(position) => format!("{}:{}", position.line, position.column),
        None => format!("offset {raw_offset}"),
    };
    (
        PrintablePosition {
            file: file.to_string(),
            offset: raw_offset,
        },
        label,
    )
}

fn round_ms(duration_us: i64) -> i64 {
    (duration_us + 500) / 1000
}
