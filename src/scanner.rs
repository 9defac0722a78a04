//! Source Scanner / Position Normalizer.
//!
//! A single pass over a source file's characters that tracks a lexical
//! state and, for every requested raw position, resolves the nearest
//! following non-trivia `(line, column)`.
//!
//! Because the whole file is read into memory up front (it has to be, to
//! answer positions in any order), most two-character openers (`//`, `/*`,
//! `#!`, `${`) collapse into a single `chars[i+1]` peek inside the
//! `Default` transition instead of needing a dedicated "saw the first
//! character, waiting for the second" state. The one place a persisted
//! sub-state remains necessary is the block comment closer `*/`: whether
//! its second character (`/`) counts as trivia depends on the state
//! *before* that character is processed (still inside the comment), which
//! a same-iteration peek can't express. See DESIGN.md for the full state
//! inventory.

use crate::position::{NormalizedPosition, PositionMap, PositionRequests, RawPosition};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Default,
    LineComment,
    BlockComment,
    BlockCommentStarSeen,
    Shebang,
    SingleQuote,
    SingleQuoteEscape,
    DoubleQuote,
    DoubleQuoteEscape,
    TemplateString,
    TemplateEscape,
    Regex,
    RegexEscape,
    RegexCharClass,
    RegexCharClassEscape,
}

impl State {
    fn is_trivia_state(self) -> bool {
        matches!(
            self,
            State::LineComment | State::BlockComment | State::BlockCommentStarSeen | State::Shebang
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Landing {
    offset: u64,
    line: u32,
    column: u32,
}

/// Reads `path`, returning `None` (logged at debug) if it can't be opened
/// or read. An unreadable source file silently skips all of its positions.
pub fn normalize_file(path: &Path, positions: &[RawPosition]) -> Option<Vec<NormalizedPosition>> {
    match std::fs::read_to_string(path) {
        Ok(source) => Some(normalize(&source, positions)),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "skipping unreadable source file");
            None
        }
    }
}

/// Normalizes every requested position against `source`, preserving input
/// order.
pub fn normalize(source: &str, positions: &[RawPosition]) -> Vec<NormalizedPosition> {
    let (landings, eof) = scan_landings(source);
    let mut result = vec![eof; positions.len()];

    let mut offset_items: Vec<(usize, u64)> = positions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| match p {
            RawPosition::Offset(o) => Some((i, o.unsigned_abs())),
            RawPosition::LineCol(..) => None,
        })
        .collect();
    offset_items.sort_by_key(|&(_, o)| o);

    let mut linecol_items: Vec<(usize, (u32, u32))> = positions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| match p {
            RawPosition::LineCol(l, c) => Some((i, (*l, *c))),
            RawPosition::Offset(_) => None,
        })
        .collect();
    linecol_items.sort_by_key(|&(_, lc)| lc);

    let mut oi = 0usize;
    let mut li = 0usize;
    for landing in &landings {
        while oi < offset_items.len() && offset_items[oi].1 <= landing.offset {
            bind(&mut result, offset_items[oi].0, landing);
            oi += 1;
        }
        while li < linecol_items.len() && linecol_items[li].1 <= (landing.line, landing.column) {
            bind(&mut result, linecol_items[li].0, landing);
            li += 1;
        }
    }

    result
}

fn bind(result: &mut [NormalizedPosition], index: usize, landing: &Landing) {
    result[index] = NormalizedPosition {
        line: landing.line,
        column: landing.column,
        offset: landing.offset,
    };
}

/// One pass over `source`, returning every non-trivia character's landing
/// point (in ascending offset order, since the scan itself is in order)
/// plus the end-of-file fallback position.
fn scan_landings(source: &str) -> (Vec<Landing>, NormalizedPosition) {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let n = chars.len();

    let mut landings = Vec::new();
    // Shebang is only ever valid starting at offset 0; checked once up
    // front rather than threading the byte offset through every
    // `Default`-state transition.
    let starts_with_shebang =
        chars.first() == Some(&(0, '#')) && chars.get(1).map(|&(_, c)| c) == Some('!');
    let mut state = if starts_with_shebang {
        State::Shebang
    } else {
        State::Default
    };
    let mut brace_depth: i32 = 0;
    let mut hole_stack: Vec<i32> = Vec::new();
    let mut line: u32 = 1;
    let mut column: u32 = 1;
    let mut i = 0usize;

    while i < n {
        let (offset, ch) = chars[i];
        let next_ch = chars.get(i + 1).map(|&(_, c)| c);

        if let Some(len) = line_terminator_len(ch, next_ch) {
            // Whitespace is always trivia; CRLF counts as one terminator.
            if resets_on_newline(state) {
                state = State::Default;
            }
            line += 1;
            column = 1;
            i += len;
            continue;
        }

        let old_state = state;
        let new_state = transition(state, ch, next_ch, &mut brace_depth, &mut hole_stack);
        let trivia =
            old_state.is_trivia_state() || new_state.is_trivia_state() || ch.is_whitespace();
        if !trivia {
            landings.push(Landing {
                offset: offset as u64,
                line,
                column,
            });
        }
        state = new_state;
        column += 1;
        i += 1;
    }

    let eof = NormalizedPosition {
        line,
        column,
        offset: source.len() as u64,
    };
    (landings, eof)
}

/// Whether an unterminated single-line form resets to `Default` on a raw
/// newline. Template strings and escape sub-states are excluded: templates
/// may legitimately span lines, and an escape consumes exactly one
/// character regardless of what it is.
fn resets_on_newline(state: State) -> bool {
    matches!(
        state,
        State::LineComment
            | State::Shebang
            | State::SingleQuote
            | State::DoubleQuote
            | State::Regex
            | State::RegexCharClass
    )
}

fn line_terminator_len(ch: char, next: Option<char>) -> Option<usize> {
    match ch {
        '\r' if next == Some('\n') => Some(2),
        '\r' | '\n' => Some(1),
        _ => None,
    }
}

fn transition(
    state: State,
    ch: char,
    next_ch: Option<char>,
    brace_depth: &mut i32,
    hole_stack: &mut Vec<i32>,
) -> State {
    match state {
        State::Default => match ch {
            '/' => match next_ch {
                Some('/') => State::LineComment,
                Some('*') => State::BlockComment,
                _ => State::Regex,
            },
            '\'' => State::SingleQuote,
            '"' => State::DoubleQuote,
            '`' => State::TemplateString,
            '{' => {
                *brace_depth += 1;
                State::Default
            }
            '}' => {
                close_brace(brace_depth, hole_stack)
            }
            _ => State::Default,
        },
        State::LineComment => State::LineComment,
        State::BlockComment => {
            if ch == '*' {
                State::BlockCommentStarSeen
            } else {
                State::BlockComment
            }
        }
        State::BlockCommentStarSeen => match ch {
            '/' => State::Default,
            '*' => State::BlockCommentStarSeen,
            _ => State::BlockComment,
        },
        State::Shebang => State::Shebang,
        State::SingleQuote => match ch {
            '\\' => State::SingleQuoteEscape,
            '\'' => State::Default,
            _ => State::SingleQuote,
        },
        State::SingleQuoteEscape => State::SingleQuote,
        State::DoubleQuote => match ch {
            '\\' => State::DoubleQuoteEscape,
            '"' => State::Default,
            _ => State::DoubleQuote,
        },
        State::DoubleQuoteEscape => State::DoubleQuote,
        State::TemplateString => match ch {
            '\\' => State::TemplateEscape,
            '`' => State::Default,
            '$' if next_ch == Some('{') => {
                hole_stack.push(*brace_depth);
                State::Default
            }
            _ => State::TemplateString,
        },
        State::TemplateEscape => State::TemplateString,
        State::Regex => match ch {
            '\\' => State::RegexEscape,
            '[' => State::RegexCharClass,
            '/' => State::Default,
            _ => State::Regex,
        },
        State::RegexEscape => State::Regex,
        State::RegexCharClass => match ch {
            '\\' => State::RegexCharClassEscape,
            ']' => State::Regex,
            _ => State::RegexCharClass,
        },
        State::RegexCharClassEscape => State::RegexCharClass,
    }
}

/// Resolves a `}` seen in `Default` state against the template-hole stack,
/// disambiguating a template interpolation close from a nested object
/// literal's own closing brace.
fn close_brace(brace_depth: &mut i32, hole_stack: &mut Vec<i32>) -> State {
    if let Some(&top) = hole_stack.last() {
        if *brace_depth > 0 && top == *brace_depth - 1 {
            hole_stack.pop();
            *brace_depth -= 1;
            return State::TemplateString;
        }
    }
    if *brace_depth > 0 {
        *brace_depth -= 1;
    }
    // Stray `}` at depth 0 with no open hole: absorbed as error recovery.
    State::Default
}

/// Normalizes every file's requests, skipping files that can't be read.
pub fn normalize_requests(requests: &PositionRequests) -> HashMap<String, PositionMap> {
    let mut out = HashMap::new();
    for (path, positions) in requests {
        let Some(normalized) = normalize_file(Path::new(path), positions) else {
            continue;
        };
        let mut map = PositionMap::new();
        for (pos, norm) in positions.iter().zip(normalized) {
            map.insert(*pos, norm);
        }
        out.insert(path.clone(), map);
    }
    out
}
