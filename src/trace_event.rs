//! Chrome Trace Event Format event model.
//!
//! Only the fields the ingester and downstream components actually read are
//! modeled as typed fields; everything else in an event's `args` map is
//! preserved in [`EventArgs::Other`] so unrecognized events never lose data,
//! they're only treated generically.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single trace event, as read from the top level of the trace array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ph: Phase,
    #[serde(deserialize_with = "deserialize_ts")]
    pub ts: i64,
    #[serde(default, deserialize_with = "deserialize_opt_ts")]
    pub dur: Option<i64>,
    pub name: String,
    #[serde(default, rename = "cat")]
    pub category: String,
    #[serde(default)]
    pub args: Value,
}

impl Event {
    /// Typed view over `args`, keyed by this event's `name`/`category`.
    ///
    /// Returns `EventArgs::Other` for any event this crate doesn't
    /// specifically interpret: a sum over span kinds with a generic
    /// fallback rather than exposing the raw JSON everywhere.
    pub fn typed_args(&self) -> EventArgs {
        let obj = match self.args.as_object() {
            Some(obj) => obj,
            None => return EventArgs::Other(Default::default()),
        };
        match self.name.as_str() {
            "checkSourceFile" => {
                if let Some(path) = obj.get("path").and_then(Value::as_str) {
                    return EventArgs::CheckSourceFile {
                        path: path.to_string(),
                    };
                }
            }
            "structuredTypeRelatedTo" => {
                let source_id = obj.get("sourceId").and_then(Value::as_str);
                let target_id = obj.get("targetId").and_then(Value::as_str);
                if let (Some(source_id), Some(target_id)) = (source_id, target_id) {
                    return EventArgs::StructuredTypeRelatedTo {
                        source_id: source_id.to_string(),
                        target_id: target_id.to_string(),
                    };
                }
            }
            _ => {}
        }
        if self.category == "check" && (obj.contains_key("pos") || obj.contains_key("end")) {
            return EventArgs::Check {
                pos: obj.get("pos").and_then(Value::as_i64),
                end: obj.get("end").and_then(Value::as_i64),
            };
        }
        EventArgs::Other(obj.clone())
    }
}

/// Typed projection of `Event::args`, per-event-kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventArgs {
    CheckSourceFile { path: String },
    Check { pos: Option<i64>, end: Option<i64> },
    StructuredTypeRelatedTo { source_id: String, target_id: String },
    Other(serde_json::Map<String, Value>),
}

/// Event phases relevant to span reconstruction plus the ones that are
/// explicitly dropped (`M`, `i`/`I`), and a catch-all for anything else so
/// an unrecognized phase is an explicit, loggable value rather than a parse
/// failure: it is logged and the event skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "B")]
    Begin,
    #[serde(rename = "E")]
    End,
    #[serde(rename = "X")]
    Complete,
    #[serde(rename = "M")]
    Metadata,
    #[serde(rename = "i")]
    InstantLower,
    #[serde(rename = "I")]
    InstantUpper,
    #[serde(other)]
    Other,
}

impl Phase {
    pub fn as_char(self) -> char {
        match self {
            Phase::Begin => 'B',
            Phase::End => 'E',
            Phase::Complete => 'X',
            Phase::Metadata => 'M',
            Phase::InstantLower => 'i',
            Phase::InstantUpper => 'I',
            Phase::Other => '?',
        }
    }
}

/// `ts`/`dur` may arrive as a JSON number or as a numeric string; both
/// encode integer microseconds.
fn deserialize_ts<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value).ok_or_else(|| D::Error::custom("expected integer or numeric string"))
}

fn deserialize_opt_ts<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_i64))
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_numeric_string_timestamps() {
        let event: Event =
            serde_json::from_str(r#"{"ph":"X","ts":"100","dur":"50","name":"n","cat":"c"}"#)
                .unwrap();
        assert_eq!(event.ts, 100);
        assert_eq!(event.dur, Some(50));
    }

    #[test]
    fn test_unknown_phase_is_other_not_an_error() {
        let event: Event =
            serde_json::from_str(r#"{"ph":"Q","ts":0,"name":"n","cat":"c"}"#).unwrap();
        assert_eq!(event.ph, Phase::Other);
    }

    #[test]
    fn test_check_source_file_args_are_typed() {
        let event: Event = serde_json::from_str(
            r#"{"ph":"X","ts":0,"dur":1,"name":"checkSourceFile","cat":"check","args":{"path":"a.ts"}}"#,
        )
        .unwrap();
        assert_eq!(
            event.typed_args(),
            EventArgs::CheckSourceFile {
                path: "a.ts".to_string()
            }
        );
    }

    #[test]
    fn test_check_category_args_carry_pos_and_end() {
        let event: Event = serde_json::from_str(
            r#"{"ph":"X","ts":0,"dur":1,"name":"isTypeAssignableTo","cat":"check","args":{"pos":10,"end":20}}"#,
        )
        .unwrap();
        assert_eq!(
            event.typed_args(),
            EventArgs::Check {
                pos: Some(10),
                end: Some(20)
            }
        );
    }
}
