use crate::pitch::{pitch_to_number, PitchError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MELODY_TRACK: u8 = 0;
pub const CHORD_TRACK: u8 = 1;

// Largest value the 24-bit MIDI tempo meta event holds.
const MAX_TEMPO_MICROS: u32 = 0x00FF_FFFF;

// Times and durations are in beats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub pitch: String,
    pub duration: f64,
    pub time: f64,
    pub track: u8,
}

impl Note {
    pub fn new(pitch: &str, duration: f64, time: f64, track: u8) -> Self {
        Self { pitch: pitch.to_string(), duration, time, track }
    }

    pub fn end(&self) -> f64 {
        self.time + self.duration
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Composition {
    pub tempo: u32,
    pub time_signature: String,
    pub notes: Vec<Note>,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlayabilityError {
    #[error("composition has no notes")]
    Empty,
    #[error("tempo {0} cannot be written as a MIDI tempo")]
    TempoOutOfRange(u32),
    #[error("note {index} starts at invalid time {time}")]
    InvalidTime { index: usize, time: f64 },
    #[error("note {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },
    #[error("note {index} targets unknown track {track}")]
    UnknownTrack { index: usize, track: u8 },
    #[error("note {index}: {source}")]
    Pitch {
        index: usize,
        #[source]
        source: PitchError,
    },
}

impl Composition {
    // Musically odd but writable values (tempo 300, octave 0) pass.
    pub fn check_playable(&self) -> Result<(), PlayabilityError> {
        if self.notes.is_empty() {
            return Err(PlayabilityError::Empty);
        }
        if self.tempo_micros().is_none() {
            return Err(PlayabilityError::TempoOutOfRange(self.tempo));
        }
        for (index, note) in self.notes.iter().enumerate() {
            if !note.time.is_finite() || note.time < 0.0 {
                return Err(PlayabilityError::InvalidTime { index, time: note.time });
            }
            if !note.duration.is_finite() || note.duration <= 0.0 {
                return Err(PlayabilityError::InvalidDuration { index, duration: note.duration });
            }
            if note.track > CHORD_TRACK {
                return Err(PlayabilityError::UnknownTrack { index, track: note.track });
            }
            pitch_to_number(&note.pitch)
                .map_err(|source| PlayabilityError::Pitch { index, source })?;
        }
        Ok(())
    }

    // Microseconds per beat, when it fits the tempo meta event.
    pub fn tempo_micros(&self) -> Option<u32> {
        60_000_000u32
            .checked_div(self.tempo)
            .filter(|micros| (1..=MAX_TEMPO_MICROS).contains(micros))
    }

    pub fn length_beats(&self) -> f64 {
        self.notes.iter().map(Note::end).fold(0.0, f64::max)
    }

    pub fn track_notes(&self, track: u8) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |note| note.track == track)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionRecord {
    pub id: i64,
    pub prompt: String,
    pub gpt_response: String,
    pub midi_filename: String,
    pub parent_id: Option<i64>,
    pub is_original: bool,
}

#[derive(Debug, Clone)]
pub struct NewComposition {
    pub prompt: String,
    pub gpt_response: String,
    pub midi_filename: String,
    pub parent_id: Option<i64>,
    pub is_original: bool,
}
