use crate::types::{SongMeta, SongPackage};

const UNTITLED: &str = "Untitled";
const DETAIL_FIELDS: [&str; 7] =
    ["genre", "mood", "topic", "key", "tempo_bpm", "language", "structure"];

pub fn to_markdown(package: &SongPackage) -> String {
    render(package, true)
}

pub fn to_markdown_without_lyrics(package: &SongPackage) -> String {
    render(package, false)
}

fn render(package: &SongPackage, include_lyrics: bool) -> String {
    let mut parts: Vec<String> = Vec::new();

    let title = if package.title.is_empty() { UNTITLED } else { package.title.as_str() };
    parts.push(format!("# {title}\n"));

    let details: Vec<String> = DETAIL_FIELDS
        .iter()
        .filter_map(|field| {
            detail_value(&package.meta, field).map(|value| {
                let label = title_case(&field.replace('_', " "));
                format!("- **{label}:** {value}")
            })
        })
        .collect();
    if !details.is_empty() {
        parts.push(format!("## Details\n{}\n", details.join("\n")));
    }

    if !package.logline.is_empty() {
        parts.push(format!("## Logline\n{}\n", package.logline));
    }

    let ideas = &package.musical_ideas;
    if !ideas.is_empty() {
        parts.push("## Musical Ideas\n".to_string());
        if !ideas.chord_progression.is_empty() {
            let key = if package.meta.key.is_empty() { "?" } else { package.meta.key.as_str() };
            parts.push(format!(
                "**Chord Progression (Key {key}):** {}\n",
                ideas.chord_progression
            ));
        }
        if !ideas.strumming_pattern.is_empty() {
            parts.push(format!("**Strumming/Feel:** {}\n", ideas.strumming_pattern));
        }
        if !ideas.melodic_hint.is_empty() {
            parts.push(format!("**Melodic Hint:** {}\n", ideas.melodic_hint));
        }
    }

    if include_lyrics && !package.lyrics.is_empty() {
        parts.push("## Lyrics\n".to_string());
        for (section, text) in &package.lyrics {
            parts.push(format!("### {}\n{text}\n", title_case(section)));
        }
    }

    if !package.production_notes.is_empty() {
        parts.push(format!("## Production Notes\n{}\n", package.production_notes));
    }

    parts.join("\n")
}

fn detail_value(meta: &SongMeta, field: &str) -> Option<String> {
    let text = match field {
        "genre" => &meta.genre,
        "mood" => &meta.mood,
        "topic" => &meta.topic,
        "key" => &meta.key,
        "language" => &meta.language,
        "structure" => &meta.structure,
        "tempo_bpm" => return (meta.tempo_bpm > 0).then(|| meta.tempo_bpm.to_string()),
        _ => return None,
    };
    (!text.is_empty()).then(|| text.clone())
}

pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_was_letter = false;
    for ch in text.chars() {
        let is_letter = ch.is_alphabetic();
        if is_letter && previous_was_letter {
            out.extend(ch.to_lowercase());
        } else if is_letter {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        previous_was_letter = is_letter;
    }
    out
}
