use thiserror::Error;

const PITCH_CLASSES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PitchError {
    #[error("empty pitch")]
    Empty,
    #[error("unknown pitch class in {0:?}")]
    UnknownClass(String),
    #[error("invalid octave in {0:?}")]
    InvalidOctave(String),
    #[error("{0:?} is outside the MIDI key range")]
    OutOfRange(String),
}

// C4 is 60; octave -1 starts at zero.
pub fn pitch_to_number(pitch: &str) -> Result<u8, PitchError> {
    let pitch = pitch.trim();
    if pitch.is_empty() {
        return Err(PitchError::Empty);
    }

    let split = pitch
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_digit() || *c == '-')
        .map(|(index, _)| index)
        .ok_or_else(|| PitchError::InvalidOctave(pitch.to_string()))?;
    let (class, octave) = pitch.split_at(split);

    let class_index = PITCH_CLASSES
        .iter()
        .position(|name| *name == class)
        .ok_or_else(|| PitchError::UnknownClass(pitch.to_string()))?;

    let octave: i32 = match octave {
        "-1" => -1,
        digit if digit.len() == 1 => digit
            .parse()
            .map_err(|_| PitchError::InvalidOctave(pitch.to_string()))?,
        _ => return Err(PitchError::InvalidOctave(pitch.to_string())),
    };

    let number = class_index as i32 + (octave + 1) * 12;
    u8::try_from(number)
        .ok()
        .filter(|key| *key <= 127)
        .ok_or_else(|| PitchError::OutOfRange(pitch.to_string()))
}

pub fn number_to_pitch(key: u8) -> String {
    let octave = i32::from(key / 12) - 1;
    format!("{}{}", PITCH_CLASSES[usize::from(key % 12)], octave)
}

pub fn key_frequency(key: u8) -> f32 {
    440.0 * 2.0f32.powf((f32::from(key) - 69.0) / 12.0)
}
