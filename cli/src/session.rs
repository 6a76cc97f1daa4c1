use crate::markdown::to_markdown_without_lyrics;
use crate::output::WrittenFiles;
use crate::types::{Brief, SongPackage};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub package: SongPackage,
    pub tempo_bpm: u32,
    pub files: WrittenFiles,
    pub generated_at: DateTime<Local>,
}

impl GenerationSession {
    pub fn new(package: SongPackage, tempo_bpm: u32, files: WrittenFiles) -> Self {
        Self { package, tempo_bpm, files, generated_at: Local::now() }
    }

    pub fn has_chords(&self) -> bool {
        !self.package.musical_ideas.chord_progression.trim().is_empty()
    }

    pub fn midi_path(&self) -> PathBuf {
        self.files.sibling("mid")
    }

    pub fn display_text(&self) -> String {
        let package = &self.package;
        let title = if package.title.trim().is_empty() { "Untitled" } else { &package.title };

        let mut text = format!("Song Generated!\n\nTitle: {title}\n\n");
        text.push_str("Chord Progression:\n");
        text.push_str(&package.musical_ideas.chord_progression);
        text.push_str("\n\nLyrics:\n");
        for (section, body) in &package.lyrics {
            let body = body.trim();
            if body.is_empty() {
                continue;
            }
            text.push_str(&format!("{}:\n{body}\n\n", capitalize(section)));
        }
        text.push_str(&to_markdown_without_lyrics(package));
        text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSnapshot {
    #[serde(default)]
    pub brief: Brief,
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MusicalIdeas;
    use indexmap::IndexMap;

    fn session() -> GenerationSession {
        let mut lyrics = IndexMap::new();
        lyrics.insert("verse_1".to_string(), "  fold the map  ".to_string());
        lyrics.insert("CHORUS".to_string(), "float away".to_string());
        lyrics.insert("bridge".to_string(), "   ".to_string());
        let package = SongPackage {
            title: "Paper Boats".into(),
            lyrics,
            musical_ideas: MusicalIdeas {
                chord_progression: "G | Em | C | D".into(),
                ..MusicalIdeas::default()
            },
            production_notes: "close mics".into(),
            ..SongPackage::default()
        };
        let files = WrittenFiles {
            base: "Paper_Boats_2024-01-01_120000".into(),
            json: PathBuf::from("songs/Paper_Boats_2024-01-01_120000.json"),
            markdown: PathBuf::from("songs/Paper_Boats_2024-01-01_120000.md"),
        };
        GenerationSession::new(package, 96, files)
    }

    #[test]
    fn display_lists_non_empty_sections_then_summary() {
        let text = session().display_text();
        assert!(text.starts_with("Song Generated!\n\nTitle: Paper Boats\n\n"));
        assert!(text.contains("Chord Progression:\nG | Em | C | D\n\nLyrics:\n"));
        assert!(text.contains("Verse_1:\nfold the map\n\nChorus:\nfloat away\n\n"));
        assert!(!text.contains("Bridge:"));
        assert!(!text.contains("## Lyrics"));
        assert!(text.contains("## Production Notes\nclose mics\n"));
    }

    #[test]
    fn midi_goes_next_to_the_package() {
        let session = session();
        assert!(session.has_chords());
        assert_eq!(session.midi_path(), PathBuf::from("songs/Paper_Boats_2024-01-01_120000.mid"));
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snapshot: FormSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, FormSnapshot::default());
        let snapshot: FormSnapshot =
            serde_json::from_str(r#"{"brief": {"genre": "soul", "tempo": 72}}"#).unwrap();
        assert_eq!(snapshot.brief.genre.as_deref(), Some("soul"));
        assert_eq!(snapshot.brief.tempo, Some(72));
    }
}
