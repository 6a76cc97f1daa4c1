use crate::chords::{filter_progression, ChordRejection, ChordToken};
use crate::output::write_new_file;
use anyhow::{anyhow, bail, Result};
use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

const TICKS_PER_BEAT: u32 = 480;
const PIANO_CHANNEL: u8 = 0;
const ACOUSTIC_GRAND_PIANO: u8 = 0;
const VELOCITY: u8 = 100;
const MAX_TEMPO_MICROSECONDS: u32 = 0xFF_FFFF;
// 60_000_000 / 4 is the slowest quarter note the 24-bit tempo field can hold.
const MIN_TEMPO_BPM: u32 = 4;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VoicingError {
    #[error("unknown root in {0:?}")]
    UnknownRoot(String),

    #[error("unsupported chord quality {quality:?} in {token:?}")]
    UnsupportedQuality { token: String, quality: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordPlacement {
    pub token: ChordToken,
    pub start_beat: u32,
    pub end_beat: u32,
    pub pitches: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChordSketch {
    pub placements: Vec<ChordPlacement>,
    pub rejected: Vec<ChordRejection>,
    pub total_beats: u32,
}

impl ChordSketch {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

pub fn voice_chord(token: &ChordToken) -> Result<Vec<u8>, VoicingError> {
    let symbol = token.as_str();
    let mut chars = symbol.char_indices();

    let base: i16 = match chars.next().map(|(_, ch)| ch) {
        Some('C') => 60,
        Some('D') => 62,
        Some('E') => 64,
        Some('F') => 65,
        Some('G') => 67,
        Some('A') => 69,
        Some('B') => 71,
        _ => return Err(VoicingError::UnknownRoot(symbol.to_string())),
    };

    let (accidental, quality_start) = match chars.next() {
        Some((_, '#')) => (1, 2),
        Some((_, 'b')) => (-1, 2),
        _ => (0, 1),
    };
    let quality = &symbol[quality_start..];
    let root = base + accidental;

    let intervals: &[i16] = match quality_key(quality).as_str() {
        "" | "maj" => &[0, 4, 7],
        "m" | "min" => &[0, 3, 7],
        "7" => &[0, 4, 7, 10],
        "maj7" => &[0, 4, 7, 11],
        "m7" | "min7" => &[0, 3, 7, 10],
        "dim" => &[0, 3, 6],
        "dim7" => &[0, 3, 6, 9],
        "aug" => &[0, 4, 8],
        "aug7" => &[0, 4, 8, 10],
        "sus" | "sus4" => &[0, 5, 7],
        "sus2" => &[0, 2, 7],
        "6" => &[0, 4, 7, 9],
        "m6" | "min6" => &[0, 3, 7, 9],
        "9" => &[0, 4, 7, 10, 14],
        "maj9" => &[0, 4, 7, 11, 14],
        "m9" | "min9" => &[0, 3, 7, 10, 14],
        "11" => &[0, 4, 7, 10, 14, 17],
        "m11" | "min11" => &[0, 3, 7, 10, 14, 17],
        "13" => &[0, 4, 7, 10, 14, 21],
        "maj13" => &[0, 4, 7, 11, 14, 21],
        _ => {
            return Err(VoicingError::UnsupportedQuality {
                token: symbol.to_string(),
                quality: quality.to_string(),
            })
        }
    };

    Ok(intervals.iter().map(|interval| (root + interval) as u8).collect())
}

/// Uppercase `M` means major; every other quality is matched case-insensitively.
fn quality_key(quality: &str) -> String {
    match quality.strip_prefix('M') {
        Some(rest) if rest.chars().all(|ch| ch.is_ascii_digit()) => format!("maj{rest}"),
        _ => quality.to_ascii_lowercase(),
    }
}

pub fn render_sketch(progression: &str, beats_per_chord: u32) -> ChordSketch {
    let beats_per_chord = beats_per_chord.max(1);
    let filtered = filter_progression(progression);
    let mut sketch = ChordSketch {
        rejected: filtered.rejected,
        total_beats: filtered.tokens.len() as u32 * beats_per_chord,
        ..ChordSketch::default()
    };

    for (index, token) in filtered.tokens.into_iter().enumerate() {
        let start_beat = index as u32 * beats_per_chord;
        match voice_chord(&token) {
            Ok(pitches) => sketch.placements.push(ChordPlacement {
                token,
                start_beat,
                end_beat: start_beat + beats_per_chord,
                pitches,
            }),
            Err(err) => {
                warn!(chord = %token, error = %err, "skipping chord that cannot be voiced");
                sketch
                    .rejected
                    .push(ChordRejection { raw: token.to_string(), reason: err.to_string() });
            }
        }
    }
    sketch
}

pub fn sketch_to_smf(sketch: &ChordSketch, tempo_bpm: u32) -> Smf<'static> {
    let mut smf =
        Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(TICKS_PER_BEAT as u16))));

    let tempo_microseconds = (60_000_000 / tempo_bpm.max(1)).min(MAX_TEMPO_MICROSECONDS);
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        },
        TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) },
    ]);

    let channel = u4::new(PIANO_CHANNEL);
    let mut track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program: u7::new(ACOUSTIC_GRAND_PIANO) },
            },
        },
    ];

    // (tick, is_note_on, key); offs sort before ons at the same tick.
    let mut events: Vec<(u32, bool, u8)> = Vec::new();
    for placement in &sketch.placements {
        let start = placement.start_beat * TICKS_PER_BEAT;
        let end = placement.end_beat * TICKS_PER_BEAT;
        for &pitch in &placement.pitches {
            events.push((start, true, pitch));
            events.push((end, false, pitch));
        }
    }
    events.sort();

    let mut last_tick = 0;
    for (tick, is_on, key) in events {
        let message = if is_on {
            MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(VELOCITY) }
        } else {
            MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }
    track.push(TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) });
    smf.tracks.push(track);
    smf
}

pub fn encode_midi(sketch: &ChordSketch, tempo_bpm: u32) -> Result<Vec<u8>> {
    if tempo_bpm < MIN_TEMPO_BPM {
        bail!("tempo {tempo_bpm} BPM is too slow for MIDI (minimum {MIN_TEMPO_BPM})");
    }
    let smf = sketch_to_smf(sketch, tempo_bpm);
    let mut buf = Vec::new();
    smf.write(&mut buf).map_err(|err| anyhow!("failed to encode MIDI: {err:?}"))?;
    Ok(buf)
}

pub fn write_midi(sketch: &ChordSketch, tempo_bpm: u32, path: &Path, overwrite: bool) -> Result<()> {
    if sketch.is_empty() {
        bail!("no playable chords to write to {}", path.display());
    }
    let bytes = encode_midi(sketch, tempo_bpm)?;
    write_new_file(path, &bytes, overwrite)?;
    info!(
        path = %path.display(),
        chords = sketch.placements.len(),
        rejected = sketch.rejected.len(),
        tempo_bpm,
        "wrote MIDI sketch"
    );
    Ok(())
}
