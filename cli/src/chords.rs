use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static CHORD_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-G][#b]?(?:maj|min|dim|aug|m|sus|7|9|11|13|6)?[0-9]*$")
        .expect("chord grammar regex is valid")
});

static NON_CHORD_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w#b]+").expect("chord cleanup regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChordToken(String);

impl ChordToken {
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = clean_piece(raw);
        CHORD_GRAMMAR.is_match(&cleaned).then_some(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChordToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordRejection {
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredProgression {
    pub tokens: Vec<ChordToken>,
    pub rejected: Vec<ChordRejection>,
}

pub fn filter_progression(progression: &str) -> FilteredProgression {
    let unified = progression.replace(|ch: char| matches!(ch, '|' | ';' | '&'), ",");
    let mut filtered = FilteredProgression::default();
    for piece in unified.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        match ChordToken::parse(piece) {
            Some(token) => filtered.tokens.push(token),
            None => filtered.rejected.push(ChordRejection {
                raw: piece.to_string(),
                reason: "not a recognised chord symbol".to_string(),
            }),
        }
    }
    filtered
}

fn clean_piece(raw: &str) -> String {
    let unified = raw.trim().replace('♯', "#").replace('♭', "b");
    NON_CHORD_CHARS.replace_all(&unified, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord_tokens(progression: &str) -> Vec<ChordToken> {
        filter_progression(progression).tokens
    }

    fn names(tokens: &[ChordToken]) -> Vec<&str> {
        tokens.iter().map(ChordToken::as_str).collect()
    }

    #[test]
    fn drops_tokens_outside_the_grammar() {
        let filtered = filter_progression("C | Am | Xz9 | G7");
        assert_eq!(names(&filtered.tokens), ["C", "Am", "G7"]);
        assert_eq!(filtered.rejected.len(), 1);
        assert_eq!(filtered.rejected[0].raw, "Xz9");
    }

    #[test]
    fn accepts_every_separator() {
        let tokens = chord_tokens("C; F & G, Am|Em");
        assert_eq!(names(&tokens), ["C", "F", "G", "Am", "Em"]);
    }

    #[test]
    fn strips_punctuation_around_symbols() {
        let tokens = chord_tokens("(Dm7) | Bb. | F#m! | Csus4*");
        assert_eq!(names(&tokens), ["Dm7", "Bb", "F#m", "Csus4"]);
    }

    #[test]
    fn grammar_ignores_case() {
        assert_eq!(
            names(&chord_tokens("CMaj7 | DMIN | g | Esus2 | am")),
            ["CMaj7", "DMIN", "g", "Esus2", "am"]
        );
    }

    #[test]
    fn lowercase_progression_passes_the_filter() {
        let filtered = filter_progression("c | g | am | G/B");
        assert_eq!(names(&filtered.tokens), ["c", "g", "am", "GB"]);
        assert!(filtered.rejected.is_empty());
    }

    #[test]
    fn unicode_accidentals_are_normalised() {
        assert_eq!(names(&chord_tokens("F♯m | B♭")), ["F#m", "Bb"]);
    }

    #[test]
    fn section_labels_and_words_are_rejected() {
        let filtered = filter_progression("Verse: C | G/B | repeat");
        assert_eq!(names(&filtered.tokens), ["GB"]);
        assert_eq!(filtered.rejected.len(), 2);
    }

    #[test]
    fn blank_progression_is_empty_not_an_error() {
        let filtered = filter_progression("  | ,, ; ");
        assert!(filtered.tokens.is_empty());
        assert!(filtered.rejected.is_empty());
    }
}
