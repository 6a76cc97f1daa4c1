use crate::types::{Brief, DEFAULT_LANGUAGE};

pub const DEFAULT_PROMPT_STRUCTURE: &str = "verse, chorus, verse, chorus, bridge, chorus";

const PREAMBLE: &str = "You are an award-winning songwriter and music theorist.
Write a cohesive *song package* based on the brief. The output **must be valid JSON** matching the schema below.";

const RULES: &str = "Rules:
- Keep it singable. Natural phrasing. Avoid forced rhymes.
- Ensure the chord progression matches the specified (or chosen) key.
- If chords imply modal interchange or borrowed chords, keep it tasteful.
- Write lyrics section-by-section following the structure. Avoid placeholders.
- Provide melodic guidance as a simple contour or solfege phrase (e.g., \"mi fa so la so\").
- JSON only. No backticks, no commentary.";

const CHORD_RULES: &str = "Chord notation (strict):
- Root is a single letter A-G, optionally followed by # or b.
- Minor: use 'm' (e.g., Dm, Em7).
- Major triads: just the root (e.g., C, G).
- Seventh chords: use 7 (e.g., C7, G7, Em7).
- Suspended, diminished and augmented chords are allowed only as: sus2, sus4, dim, aug.
- Do not write 'min', 'maj' or any other quality words.
- Do NOT include section labels or commentary in chord names.
- Use | to separate chords in the progression.";

const SCHEMA: &str = r#"JSON schema (keys and types must match exactly):
{
  "title": "string",
  "logline": "string",
  "meta": {
    "genre": "string",
    "mood": "string",
    "topic": "string",
    "language": "string",
    "key": "string",
    "tempo_bpm": "integer",
    "structure": "string"
  },
  "lyrics": {
    "intro": "string (optional, can be empty)",
    "verse_1": "string",
    "pre_chorus_1": "string (optional, can be empty)",
    "chorus": "string",
    "verse_2": "string (optional, can be empty)",
    "pre_chorus_2": "string (optional, can be empty)",
    "bridge": "string (optional, can be empty)",
    "outro": "string (optional, can be empty)"
  },
  "musical_ideas": {
    "chord_progression": "string (e.g., C | Am | F | G)",
    "strumming_pattern": "string (e.g., D D U U D U, or \"4 on the floor\")",
    "melodic_hint": "string (solfege or contour like ^1-^3-^4-^5)"
  },
  "production_notes": "string"
}
"#;

pub fn build_prompt(brief: &Brief) -> String {
    let tempo = brief.tempo().map(|bpm| bpm.to_string());
    let lines = [
        ("Genre", brief.genre().unwrap_or("any")),
        ("Mood", brief.mood().unwrap_or("any")),
        ("Topic", brief.topic().unwrap_or("surprise me")),
        ("Language", brief.language().unwrap_or(DEFAULT_LANGUAGE)),
        ("Key", brief.key().unwrap_or("best fit")),
        ("Tempo (BPM)", tempo.as_deref().unwrap_or("best fit")),
        ("Structure", brief.structure().unwrap_or(DEFAULT_PROMPT_STRUCTURE)),
        ("Rhyme scheme", brief.rhyme().unwrap_or("flexible")),
        ("Syllable count (target)", brief.syllables().unwrap_or("flexible")),
    ];

    let mut prompt = String::with_capacity(PREAMBLE.len() + RULES.len() + SCHEMA.len() + 512);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\nBrief:\n");
    for (label, value) in lines {
        prompt.push_str(&format!("- {label}: {value}\n"));
    }
    prompt.push('\n');
    prompt.push_str(RULES);
    prompt.push('\n');
    prompt.push_str(CHORD_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(SCHEMA);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_brief_uses_placeholders() {
        let prompt = build_prompt(&Brief::default());
        assert!(prompt.contains("- Genre: any\n"));
        assert!(prompt.contains("- Mood: any\n"));
        assert!(prompt.contains("- Topic: surprise me\n"));
        assert!(prompt.contains("- Language: English\n"));
        assert!(prompt.contains("- Key: best fit\n"));
        assert!(prompt.contains("- Tempo (BPM): best fit\n"));
        assert!(prompt.contains(&format!("- Structure: {DEFAULT_PROMPT_STRUCTURE}\n")));
        assert!(prompt.contains("- Rhyme scheme: flexible\n"));
        assert!(prompt.contains("- Syllable count (target): flexible\n"));
    }

    #[test]
    fn supplied_fields_replace_placeholders() {
        let brief = Brief {
            genre: Some("folk".into()),
            topic: Some("a lighthouse keeper".into()),
            key: Some("Dm".into()),
            tempo: Some(90),
            rhyme: Some("ABAB".into()),
            ..Brief::default()
        };
        let prompt = build_prompt(&brief);
        assert!(prompt.contains("- Genre: folk\n"));
        assert!(prompt.contains("- Mood: any\n"));
        assert!(prompt.contains("- Topic: a lighthouse keeper\n"));
        assert!(prompt.contains("- Key: Dm\n"));
        assert!(prompt.contains("- Tempo (BPM): 90\n"));
        assert!(prompt.contains("- Rhyme scheme: ABAB\n"));
        assert!(prompt.contains("- Syllable count (target): flexible\n"));
        assert!(!prompt.contains("surprise me"));
    }

    #[test]
    fn prompt_embeds_schema_and_chord_contract() {
        let prompt = build_prompt(&Brief::default());
        assert!(prompt.contains("\"tempo_bpm\": \"integer\""));
        assert!(prompt.contains("\"chord_progression\""));
        assert!(prompt.contains("sus2, sus4, dim, aug"));
        assert!(prompt.contains("Use | to separate chords"));
        assert_eq!(prompt, build_prompt(&Brief::default()));
    }
}
