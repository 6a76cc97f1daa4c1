use crate::types::{value_to_tempo, Brief, SongPackage, DEFAULT_LANGUAGE};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_META_STRUCTURE: &str = "V-C-V-C-B-C";
const UNSPECIFIED: &str = "unspecified";
const UNKNOWN_KEY: &str = "TBD";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("model response is not valid JSON: {source}")]
    Unparsable {
        #[source]
        source: serde_json::Error,
    },

    #[error("model response is JSON but not an object (found {found})")]
    NotAnObject { found: &'static str },

    #[error("model response does not match the song package shape: {0}")]
    Shape(#[source] serde_json::Error),
}

pub fn normalize(raw: &str, brief: &Brief) -> Result<SongPackage, NormalizeError> {
    let mut payload = parse_response(raw)?;

    let meta = payload.entry("meta").or_insert_with(|| Value::Object(Map::new()));
    if !meta.is_object() {
        warn!(found = kind_of(meta), "replacing non-object meta with an empty one");
        *meta = Value::Object(Map::new());
    }
    if let Value::Object(meta) = meta {
        fill_missing_meta(meta, brief);
    }

    if payload.get("musical_ideas").is_some_and(|value| !value.is_object()) {
        warn!("dropping non-object musical_ideas from model response");
        payload.shift_remove("musical_ideas");
    }

    serde_json::from_value(Value::Object(payload)).map_err(NormalizeError::Shape)
}

/// Strict parse, then a single recovery attempt on the outermost brace span.
pub fn parse_response(raw: &str) -> Result<Map<String, Value>, NormalizeError> {
    let original = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return into_object(value),
        Err(err) => err,
    };

    if let Some(span) = brace_span(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            warn!(
                discarded_bytes = raw.len() - span.len(),
                "recovered JSON payload from noisy model output"
            );
            return into_object(value);
        }
        debug!("brace span recovery failed, reporting the original parse error");
    }

    Err(NormalizeError::Unparsable { source: original })
}

fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn into_object(value: Value) -> Result<Map<String, Value>, NormalizeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(NormalizeError::NotAnObject { found: kind_of(&other) }),
    }
}

fn fill_missing_meta(meta: &mut Map<String, Value>, brief: &Brief) {
    let text_defaults = [
        ("genre", brief.genre().unwrap_or(UNSPECIFIED)),
        ("mood", brief.mood().unwrap_or(UNSPECIFIED)),
        ("topic", brief.topic().unwrap_or(UNSPECIFIED)),
        ("language", brief.language().unwrap_or(DEFAULT_LANGUAGE)),
        ("key", brief.key().unwrap_or(UNKNOWN_KEY)),
        ("structure", brief.structure().unwrap_or(DEFAULT_META_STRUCTURE)),
    ];
    for (field, default) in text_defaults {
        if is_missing_text(meta.get(field)) {
            debug!(field, default, "filling missing meta field");
            meta.insert(field.to_string(), Value::String(default.to_string()));
        }
    }

    if meta.get("tempo_bpm").map(value_to_tempo).unwrap_or(0) == 0 {
        let tempo = brief.tempo().unwrap_or(0);
        debug!(tempo, "filling missing meta tempo");
        meta.insert("tempo_bpm".to_string(), Value::from(tempo));
    }
}

fn is_missing_text(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
