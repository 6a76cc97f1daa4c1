use crate::{
    chords::ChordRejection,
    config::AppConfig,
    generate::GenerationConfig,
    midi::{render_sketch, ChordSketch},
    session::{FormSnapshot, GenerationSession},
    types::Brief,
};
use indexmap::IndexMap;
use std::path::PathBuf;

const MAX_STATUS_LINES: usize = 8;
const SPINNER_FRAMES: &[&str] = &["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Genre,
    Mood,
    Topic,
    Key,
    Tempo,
    Language,
    Structure,
    Rhyme,
    Syllables,
}

pub const FORM_FIELDS: [FormField; 9] = [
    FormField::Genre,
    FormField::Mood,
    FormField::Topic,
    FormField::Key,
    FormField::Tempo,
    FormField::Language,
    FormField::Structure,
    FormField::Rhyme,
    FormField::Syllables,
];

impl FormField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Genre => "Genre",
            Self::Mood => "Mood",
            Self::Topic => "Topic",
            Self::Key => "Key",
            Self::Tempo => "Tempo (BPM)",
            Self::Language => "Language",
            Self::Structure => "Structure",
            Self::Rhyme => "Rhyme scheme",
            Self::Syllables => "Syllables",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::Genre => "folk, synth-pop, ...",
            Self::Mood => "wistful, defiant, ...",
            Self::Topic => "what the song is about",
            Self::Key => "e.g. G major",
            Self::Tempo => "number, blank for default",
            Self::Language => "English",
            Self::Structure => "verse, chorus, ...",
            Self::Rhyme => "AABB, ABAB, ...",
            Self::Syllables => "e.g. 8-10 per line",
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    config: AppConfig,
    fields: IndexMap<FormField, String>,
    focus: usize,
    in_flight: bool,
    session: Option<GenerationSession>,
    output: String,
    output_scroll: u16,
    spinner_tick: usize,
    pub status_lines: Vec<String>,
}

impl AppState {
    pub fn new(config: AppConfig, snapshot: Option<FormSnapshot>) -> Self {
        let mut state = Self {
            config,
            fields: FORM_FIELDS.iter().map(|field| (*field, String::new())).collect(),
            focus: 0,
            in_flight: false,
            session: None,
            output: String::new(),
            output_scroll: 0,
            spinner_tick: 0,
            status_lines: Vec::new(),
        };
        match snapshot {
            Some(snapshot) => state.restore(&snapshot.brief),
            None => state.set(FormField::Language, state.config.language().to_string()),
        }
        state
    }

    pub fn fields(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.fields.iter().map(|(field, value)| (*field, value.as_str()))
    }

    pub fn value(&self, field: FormField) -> &str {
        self.fields.get(&field).map(String::as_str).unwrap_or("")
    }

    fn set(&mut self, field: FormField, value: String) {
        self.fields.insert(field, value);
    }

    pub fn focused(&self) -> FormField {
        FORM_FIELDS[self.focus]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % FORM_FIELDS.len();
    }

    pub fn focus_previous(&mut self) {
        self.focus = if self.focus == 0 { FORM_FIELDS.len() - 1 } else { self.focus - 1 };
    }

    pub fn insert_char(&mut self, ch: char) {
        if let Some(value) = self.fields.get_mut(&self.focused()) {
            value.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(value) = self.fields.get_mut(&self.focused()) {
            value.pop();
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn session(&self) -> Option<&GenerationSession> {
        self.session.as_ref()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn output_scroll(&self) -> u16 {
        self.output_scroll
    }

    pub fn scroll_output(&mut self, delta: i32) {
        let next = i32::from(self.output_scroll).saturating_add(delta).max(0);
        self.output_scroll = u16::try_from(next).unwrap_or(u16::MAX);
    }

    pub fn tick(&mut self) {
        self.spinner_tick = self.spinner_tick.wrapping_add(1);
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_tick % SPINNER_FRAMES.len()]
    }

    pub fn brief(&self) -> Brief {
        let text = |field| {
            let value = self.value(field).trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        Brief {
            genre: text(FormField::Genre),
            mood: text(FormField::Mood),
            topic: text(FormField::Topic),
            key: text(FormField::Key),
            tempo: self.value(FormField::Tempo).trim().parse::<u32>().ok().filter(|bpm| *bpm > 0),
            language: text(FormField::Language),
            structure: text(FormField::Structure),
            rhyme: text(FormField::Rhyme),
            syllables: text(FormField::Syllables),
        }
    }

    /// Builds the generate command, or `None` while a request is running.
    pub fn submit(&mut self) -> Option<AppCommand> {
        if self.in_flight {
            self.push_status_line("Still generating, please wait".to_string());
            return None;
        }

        let brief = self.brief();
        let tempo_bpm = match brief.tempo() {
            Some(bpm) => bpm,
            None => {
                let typed = self.value(FormField::Tempo).trim().to_string();
                let fallback = self.config.default_tempo_bpm();
                if !typed.is_empty() {
                    self.push_status_line(format!(
                        "Tempo \"{typed}\" is not a number; using {fallback} BPM"
                    ));
                }
                fallback
            }
        };

        self.in_flight = true;
        self.output = "Generating your song...".to_string();
        self.output_scroll = 0;
        self.push_status_line("Request sent to the model".to_string());

        Some(AppCommand::Generate {
            brief,
            config: GenerationConfig::for_form(&self.config),
            tempo_bpm,
        })
    }

    pub fn prepare_midi_export(&mut self) -> Option<AppCommand> {
        let (sketch, tempo_bpm, path) = match self.session.as_ref() {
            None => {
                self.append_output("Generate a song first to create MIDI.");
                return None;
            }
            Some(session) if !session.has_chords() => {
                self.append_output("No chord progression found in this song.");
                return None;
            }
            Some(session) => (
                render_sketch(
                    &session.package.musical_ideas.chord_progression,
                    self.config.beats_per_chord(),
                ),
                session.tempo_bpm,
                session.midi_path(),
            ),
        };
        if sketch.is_empty() {
            self.append_output("No valid chords found in the progression.");
            return None;
        }

        Some(AppCommand::ExportMidi { sketch, tempo_bpm, path })
    }

    pub fn reset(&mut self) {
        for (field, value) in self.fields.iter_mut() {
            value.clear();
            if *field == FormField::Language {
                value.push_str(self.config.language());
            }
        }
        self.focus = 0;
        self.session = None;
        self.output.clear();
        self.output_scroll = 0;
        self.push_status_line("Form cleared".to_string());
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Info(message) => self.push_status_line(message),
            AppEvent::Error(message) => {
                let generation_failed = std::mem::replace(&mut self.in_flight, false);
                self.push_status_line(format!("Error: {message}"));
                if generation_failed || self.session.is_none() {
                    self.output = format!("Error: {message}\n");
                    self.output_scroll = 0;
                } else {
                    self.append_output(&format!("Error: {message}"));
                }
            }
            AppEvent::Generated(session) => {
                self.in_flight = false;
                self.push_status_line(format!("Saved {}", session.files.json.display()));
                self.push_status_line(format!("Saved {}", session.files.markdown.display()));
                self.output = session.display_text();
                self.output_scroll = 0;
                self.session = Some(session);
            }
            AppEvent::MidiWritten { path, rejected } => {
                for rejection in &rejected {
                    self.append_output(&format!(
                        "Skipped chord {}: {}",
                        rejection.raw, rejection.reason
                    ));
                }
                self.append_output(&format!("MIDI saved to {}", path.display()));
                self.push_status_line(format!("Saved {}", path.display()));
            }
        }
    }

    pub fn push_status_line(&mut self, line: String) {
        self.status_lines.push(line);
        if self.status_lines.len() > MAX_STATUS_LINES {
            let overflow = self.status_lines.len() - MAX_STATUS_LINES;
            self.status_lines.drain(0..overflow);
        }
    }

    fn append_output(&mut self, line: &str) {
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn restore(&mut self, brief: &Brief) {
        let tempo = brief.tempo().map(|bpm| bpm.to_string());
        let language = brief.language().unwrap_or(self.config.language()).to_string();
        let values = [
            (FormField::Genre, brief.genre()),
            (FormField::Mood, brief.mood()),
            (FormField::Topic, brief.topic()),
            (FormField::Key, brief.key()),
            (FormField::Tempo, tempo.as_deref()),
            (FormField::Language, Some(language.as_str())),
            (FormField::Structure, brief.structure()),
            (FormField::Rhyme, brief.rhyme()),
            (FormField::Syllables, brief.syllables()),
        ];
        for (field, value) in values {
            self.set(field, value.unwrap_or_default().to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Info(String),
    Error(String),
    Generated(GenerationSession),
    MidiWritten { path: PathBuf, rejected: Vec<ChordRejection> },
}

#[derive(Debug, Clone)]
pub enum AppCommand {
    Generate { brief: Brief, config: GenerationConfig, tempo_bpm: u32 },
    ExportMidi { sketch: ChordSketch, tempo_bpm: u32, path: PathBuf },
}
