use crate::events::{Action, Event, Row};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_MARKER: &str = "osqueryd";

/// Fields before the payload: syslog date (3), host, program tag.
const PAYLOAD_FIELD: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Decoded(Event),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoMarker,
    TooFewFields,
    NotJson(String),
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NoMarker => "no_marker",
            SkipReason::TooFewFields => "too_few_fields",
            SkipReason::NotJson(_) => "not_json",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawPayload {
    decorations: Option<RawDecorations>,
    #[serde(rename = "hostIdentifier")]
    host_identifier: Option<String>,
    name: Option<String>,
    action: Option<String>,
    columns: Option<Row>,
    #[serde(rename = "unixTime")]
    unix_time: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDecorations {
    host_uuid: Option<String>,
}

/// Decode one raw log line.
///
/// Lines without the marker, with too few fields, or whose payload is not
/// JSON are skipped. A JSON payload that lacks a required field is an error.
pub fn decode(line: &str, marker: &str) -> Result<DecodeOutcome> {
    if !line.contains(marker) {
        return Ok(DecodeOutcome::Skipped(SkipReason::NoMarker));
    }
    let Some(payload) = payload_field(line) else {
        return Ok(DecodeOutcome::Skipped(SkipReason::TooFewFields));
    };
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => return Ok(DecodeOutcome::Skipped(SkipReason::NotJson(err.to_string()))),
    };
    let raw: RawPayload =
        serde_json::from_value(value).context("event payload does not match the event shape")?;
    Ok(DecodeOutcome::Decoded(validate_payload(raw)?))
}

// Syslog pads single-digit days with an extra space, so fields are separated
// by runs of whitespace rather than single spaces.
fn payload_field(line: &str) -> Option<&str> {
    let mut rest = line;
    for _ in 0..PAYLOAD_FIELD {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    let payload = rest.trim_start();
    (!payload.is_empty()).then_some(payload)
}

fn validate_payload(raw: RawPayload) -> Result<Event> {
    let entity_id = raw
        .decorations
        .and_then(|d| d.host_uuid)
        .ok_or_else(|| anyhow!("event payload missing required `decorations.host_uuid`"))?;
    let entity_label = raw
        .host_identifier
        .ok_or_else(|| anyhow!("event payload missing required `hostIdentifier`"))?;
    let query_name = raw
        .name
        .ok_or_else(|| anyhow!("event payload missing required `name`"))?;
    let action = raw
        .action
        .ok_or_else(|| anyhow!("event payload missing required `action`"))?;
    let row = raw
        .columns
        .ok_or_else(|| anyhow!("event payload missing required `columns`"))?;
    let unix_time = raw
        .unix_time
        .ok_or_else(|| anyhow!("event payload missing required `unixTime`"))?;

    Ok(Event {
        entity_id,
        entity_label,
        query_name,
        action: Action::parse(&action),
        row,
        timestamp: parse_unix_time(&unix_time)?,
    })
}

// The agent emits `unixTime` both as a number and as a decimal string.
fn parse_unix_time(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| anyhow!("`unixTime` is not an integer: {n}")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .with_context(|| format!("`unixTime` is not an integer: {s:?}")),
        other => bail!("`unixTime` has unsupported type: {other}"),
    }
}
