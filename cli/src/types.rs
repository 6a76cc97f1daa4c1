use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Brief {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhyme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllables: Option<String>,
}

impl Brief {
    pub fn genre(&self) -> Option<&str> {
        non_blank(&self.genre)
    }

    pub fn mood(&self) -> Option<&str> {
        non_blank(&self.mood)
    }

    pub fn topic(&self) -> Option<&str> {
        non_blank(&self.topic)
    }

    pub fn key(&self) -> Option<&str> {
        non_blank(&self.key)
    }

    /// A tempo of zero is treated the same as no tempo.
    pub fn tempo(&self) -> Option<u32> {
        self.tempo.filter(|bpm| *bpm > 0)
    }

    pub fn language(&self) -> Option<&str> {
        non_blank(&self.language)
    }

    pub fn structure(&self) -> Option<&str> {
        non_blank(&self.structure)
    }

    pub fn rhyme(&self) -> Option<&str> {
        non_blank(&self.rhyme)
    }

    pub fn syllables(&self) -> Option<&str> {
        non_blank(&self.syllables)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SongPackage {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub logline: String,
    #[serde(default)]
    pub meta: SongMeta,
    #[serde(default, deserialize_with = "lenient_sections")]
    pub lyrics: IndexMap<String, String>,
    #[serde(default)]
    pub musical_ideas: MusicalIdeas,
    #[serde(default, deserialize_with = "lenient_text")]
    pub production_notes: String,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SongMeta {
    #[serde(default, deserialize_with = "lenient_text")]
    pub genre: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mood: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub language: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub key: String,
    #[serde(default, deserialize_with = "lenient_tempo")]
    pub tempo_bpm: u32,
    #[serde(default, deserialize_with = "lenient_text")]
    pub structure: String,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MusicalIdeas {
    #[serde(default, deserialize_with = "lenient_text")]
    pub chord_progression: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub strumming_pattern: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub melodic_hint: String,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl MusicalIdeas {
    pub fn is_empty(&self) -> bool {
        self.chord_progression.is_empty()
            && self.strumming_pattern.is_empty()
            && self.melodic_hint.is_empty()
    }
}

pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => {
            items.iter().map(value_to_text).filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n")
        }
        Value::Object(_) => value.to_string(),
    }
}

pub fn value_to_tempo(value: &Value) -> u32 {
    match value {
        Value::Number(number) => {
            if let Some(bpm) = number.as_u64() {
                u32::try_from(bpm).unwrap_or(u32::MAX)
            } else {
                number
                    .as_f64()
                    .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
                    .map(|bpm| bpm.round().min(u32::MAX as f64) as u32)
                    .unwrap_or(0)
            }
        }
        Value::String(text) => {
            let digits: String =
                text.trim().chars().take_while(|ch| ch.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

fn lenient_tempo<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_tempo(&value))
}

fn lenient_sections<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let sections = match value {
        Value::Object(map) => {
            map.into_iter().map(|(name, text)| (name, value_to_text(&text))).collect()
        }
        Value::Null => IndexMap::new(),
        other => {
            let mut single = IndexMap::new();
            let text = value_to_text(&other);
            if !text.is_empty() {
                single.insert("lyrics".to_string(), text);
            }
            single
        }
    };
    Ok(sections)
}
