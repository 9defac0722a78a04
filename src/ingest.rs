//! Streaming Trace Ingester.
//!
//! Reconstructs closed spans from paired Begin/End events and complete (`X`)
//! events without holding the whole trace array in memory as one
//! `serde_json::Value` tree. `serde_json`'s own streaming deserializer
//! doesn't expose "yield me complete objects at array depth 1" directly, so
//! this is a small hand-rolled pull-parser over the byte stream: it tracks
//! string/escape state just enough to find the matching close-brace of each
//! top-level object, then hands that slice to `serde_json` for the real
//! parsing.

use crate::trace_event::{Event, Phase};
use anyhow::{bail, Context, Result};
use std::io::{BufReader, Read};

/// A closed `[start, end)` interval with the event that produced it.
///
/// For `B`/`E` pairs this is the begin-event; for `X` events it's the event
/// itself.
#[derive(Debug, Clone)]
pub struct ClosedSpan {
    pub start: i64,
    pub end: i64,
    pub event: Event,
}

/// Result of ingesting one trace: closed spans plus the residue of any
/// begin-events still open at end of stream.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub min_time: i64,
    pub max_time: i64,
    pub spans: Vec<ClosedSpan>,
    pub unclosed: Vec<Event>,
}

/// Parse a trace byte stream into a [`ParseResult`].
///
/// `min_duration` is the floor below which a closed span is dropped
/// entirely: a span is appended to the output list only if its duration
/// meets it.
pub fn parse<R: Read>(reader: R, min_duration: i64) -> Result<ParseResult> {
    let mut objects = JsonArrayObjects::new(BufReader::new(reader));
    let mut result = ParseResult {
        min_time: i64::MAX,
        max_time: i64::MIN,
        spans: Vec::new(),
        unclosed: Vec::new(),
    };
    let mut open_stack: Vec<Event> = Vec::new();
    let mut saw_any = false;

    while let Some(object_text) = objects.next_object()? {
        let event: Event = match serde_json::from_str(&object_text) {
            Ok(event) => event,
            Err(err) => {
                return Err(err).context("malformed trace event object");
            }
        };
        saw_any = true;

        match event.ph {
            Phase::Metadata | Phase::InstantLower | Phase::InstantUpper => continue,
            Phase::Begin => {
                result.min_time = result.min_time.min(event.ts);
                result.max_time = result.max_time.max(event.ts);
                open_stack.push(event);
            }
            Phase::End => {
                let begin = match open_stack.pop() {
                    Some(begin) => begin,
                    None => {
                        tracing::warn!(
                            name = %event.name,
                            ts = event.ts,
                            "end event with no matching begin event; skipping"
                        );
                        continue;
                    }
                };
                record_span(&mut result, begin.ts, event.ts, begin, min_duration);
            }
            Phase::Complete => {
                let start = event.ts;
                let end = event.ts + event.dur.unwrap_or(0);
                record_span(&mut result, start, end, event, min_duration);
            }
            Phase::Other => {
                tracing::warn!(
                    name = %event.name,
                    ts = event.ts,
                    "unrecognized trace event phase; skipping"
                );
            }
        }
    }

    for begin in &open_stack {
        tracing::warn!(
            name = %begin.name,
            ts = begin.ts,
            "begin event still open at end of stream"
        );
    }
    result.unclosed = open_stack;

    if !saw_any {
        result.min_time = 0;
        result.max_time = 0;
    }
    Ok(result)
}

fn record_span(result: &mut ParseResult, start: i64, end: i64, event: Event, min_duration: i64) {
    result.min_time = result.min_time.min(start);
    result.max_time = result.max_time.max(end);
    if end - start >= min_duration {
        result.spans.push(ClosedSpan { start, end, event });
    }
}

/// Pulls complete top-level JSON object text out of a `[ {...}, {...} ]`
/// array, one at a time, tracking only what's needed to find matching
/// braces: string boundaries and escape sequences.
struct JsonArrayObjects<R: Read> {
    reader: BufReader<R>,
    started: bool,
    finished: bool,
}

impl<R: Read> JsonArrayObjects<R> {
    fn new(reader: BufReader<R>) -> Self {
        Self {
            reader,
            started: false,
            finished: false,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            return match self.reader.read(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(buf[0])),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => Err(err).context("reading trace stream"),
            };
        }
    }

    fn skip_whitespace_and(&mut self, skip_commas: bool) -> Result<Option<u8>> {
        loop {
            match self.next_byte()? {
                Some(b) if b.is_ascii_whitespace() => continue,
                Some(b',') if skip_commas => continue,
                other => return Ok(other),
            }
        }
    }

    fn ensure_started(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        match self.skip_whitespace_and(false)? {
            Some(b'[') => {
                self.started = true;
                Ok(())
            }
            Some(other) => bail!(
                "expected top-level JSON array, found byte {:?}",
                other as char
            ),
            None => bail!("empty trace input; expected a JSON array"),
        }
    }

    /// Returns the text of the next top-level object, or `None` once the
    /// array has closed.
    fn next_object(&mut self) -> Result<Option<String>> {
        self.ensure_started()?;
        if self.finished {
            return Ok(None);
        }
        match self.skip_whitespace_and(true)? {
            Some(b']') | None => {
                self.finished = true;
                Ok(None)
            }
            Some(b'{') => {
                let mut bytes = vec![b'{'];
                let mut depth = 1i32;
                let mut in_string = false;
                let mut escaped = false;
                while depth > 0 {
                    let b = self
                        .next_byte()?
                        .ok_or_else(|| anyhow::anyhow!("unexpected end of trace inside object"))?;
                    bytes.push(b);
                    if in_string {
                        if escaped {
                            escaped = false;
                        } else if b == b'\\' {
                            escaped = true;
                        } else if b == b'"' {
                            in_string = false;
                        }
                        continue;
                    }
                    match b {
                        b'"' => in_string = true,
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                }
                let text = String::from_utf8(bytes).context("trace object is not valid UTF-8")?;
                Ok(Some(text))
            }
            Some(other) => bail!(
                "expected object or ']' inside trace array, found byte {:?}",
                other as char
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_array_yields_empty_result() {
        let result = parse(b"[]".as_slice(), 0).unwrap();
        assert!(result.spans.is_empty());
        assert!(result.unclosed.is_empty());
    }

    #[test]
    fn test_single_x_span_above_min_duration() {
        let trace = br#"[{"ph":"X","ts":0,"dur":1000000,"name":"root","cat":"x"}]"#;
        let result = parse(trace.as_slice(), 500_000).unwrap();
        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].start, 0);
        assert_eq!(result.spans[0].end, 1_000_000);
    }

    #[test]
    fn test_x_span_below_min_duration_is_dropped_but_still_bounds_time() {
        let trace = br#"[{"ph":"X","ts":0,"dur":10,"name":"tiny","cat":"x"}]"#;
        let result = parse(trace.as_slice(), 100).unwrap();
        assert!(result.spans.is_empty());
        assert_eq!(result.min_time, 0);
        assert_eq!(result.max_time, 10);
    }

    #[test]
    fn test_begin_end_pair_forms_a_span() {
        let trace = br#"[
            {"ph":"B","ts":100,"name":"x","cat":"c"},
            {"ph":"E","ts":900,"name":"x","cat":"c"}
        ]"#;
        let result = parse(trace.as_slice(), 0).unwrap();
        assert_eq!(result.spans.len(), 1);
        assert_eq!((result.spans[0].start, result.spans[0].end), (100, 900));
    }

    #[test]
    fn test_unclosed_begin_is_reported_not_panicked() {
        let trace = br#"[{"ph":"B","ts":100,"name":"x","cat":"c"}]"#;
        let result = parse(trace.as_slice(), 0).unwrap();
        assert!(result.spans.is_empty());
        assert_eq!(result.unclosed.len(), 1);
        assert_eq!(result.unclosed[0].ts, 100);
    }

    #[test]
    fn test_metadata_and_instant_events_are_dropped() {
        let trace = br#"[
            {"ph":"M","ts":0,"name":"process_name","cat":"__metadata"},
            {"ph":"i","ts":5,"name":"mark","cat":"c"},
            {"ph":"X","ts":0,"dur":1,"name":"x","cat":"c"}
        ]"#;
        let result = parse(trace.as_slice(), 0).unwrap();
        assert_eq!(result.spans.len(), 1);
    }

    #[test]
    fn test_braces_inside_string_values_do_not_confuse_depth_tracking() {
        let trace = br#"[{"ph":"X","ts":0,"dur":1,"name":"n","cat":"c","args":{"path":"a{b}c.ts"}}]"#;
        let result = parse(trace.as_slice(), 0).unwrap();
        assert_eq!(result.spans.len(), 1);
    }

    #[test]
    fn test_malformed_top_level_value_is_an_error() {
        let result = parse(b"{not an array}".as_slice(), 0);
        assert!(result.is_err());
    }
}
