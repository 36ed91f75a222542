use crate::types::{Composition, Note, CHORD_TRACK, MELODY_TRACK};
use once_cell::sync::Lazy;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

const COMPOSITION_KEYS: [&str; 3] = ["tempo", "time_signature", "notes"];
const NOTE_KEYS: [&str; 4] = ["pitch", "duration", "time", "track"];

static FALLBACK_COMPOSITION: Lazy<Composition> = Lazy::new(|| {
    let melody = [
        ("C4", 1.0, 0.0),
        ("E4", 1.0, 1.0),
        ("G4", 1.0, 2.0),
        ("C5", 1.0, 3.0),
        ("G4", 1.0, 4.0),
        ("E4", 1.0, 5.0),
        ("C4", 2.0, 6.0),
        ("D4", 1.0, 8.0),
        ("F4", 1.0, 9.0),
        ("A4", 1.0, 10.0),
        ("D5", 1.0, 11.0),
        ("A4", 1.0, 12.0),
        ("F4", 1.0, 13.0),
        ("D4", 2.0, 14.0),
    ];
    let chords = [("C3", 4.0, 0.0), ("G3", 4.0, 4.0), ("D3", 4.0, 8.0), ("G3", 4.0, 12.0)];

    let notes = melody
        .iter()
        .map(|&(pitch, duration, time)| Note::new(pitch, duration, time, MELODY_TRACK))
        .chain(
            chords
                .iter()
                .map(|&(pitch, duration, time)| Note::new(pitch, duration, time, CHORD_TRACK)),
        )
        .collect();

    Composition { tempo: 120, time_signature: "4/4".to_string(), notes }
});

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("no JSON object found in the response")]
    NoJsonObject,
    #[error("error decoding JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required key: {0}")]
    MissingKey(&'static str),
    #[error("missing required key in note {index}: {key}")]
    MissingNoteKey { index: usize, key: &'static str },
    #[error("`notes` must be a list of objects")]
    NotesShape,
}

pub fn fallback_composition() -> Composition {
    FALLBACK_COMPOSITION.clone()
}

// Never fails; unusable output yields the fallback composition.
pub fn parse(raw: &str) -> Composition {
    match try_parse(raw) {
        Ok(composition) => composition,
        Err(failure) => {
            warn!(reason = %failure, response = %raw, "invalid model composition; using default");
            fallback_composition()
        }
    }
}

pub fn try_parse(raw: &str) -> Result<Composition, ParseFailure> {
    let body = extract_object(raw).ok_or(ParseFailure::NoJsonObject)?;
    let body = strip_code_fences(body);
    let value: Value = serde_json::from_str(&body)?;
    check_keys(&value)?;
    Ok(serde_json::from_value(value)?)
}

fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn strip_code_fences(body: &str) -> String {
    body.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_keys(value: &Value) -> Result<(), ParseFailure> {
    for key in COMPOSITION_KEYS {
        if value.get(key).is_none() {
            return Err(ParseFailure::MissingKey(key));
        }
    }
    let notes = value["notes"].as_array().ok_or(ParseFailure::NotesShape)?;
    for (index, note) in notes.iter().enumerate() {
        if !note.is_object() {
            return Err(ParseFailure::NotesShape);
        }
        if let Some(key) = NOTE_KEYS.into_iter().find(|key| note.get(key).is_none()) {
            return Err(ParseFailure::MissingNoteKey { index, key });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c4_piece() -> Composition {
        Composition {
            tempo: 100,
            time_signature: "3/4".into(),
            notes: vec![Note::new("C4", 1.0, 0.0, 0)],
        }
    }

    #[test]
    fn parses_fenced_response_with_prose() {
        let raw = "Here is your piece:\n```json\n{\"tempo\":100,\"time_signature\":\"3/4\",\"notes\":[{\"pitch\":\"C4\",\"duration\":1.0,\"time\":0.0,\"track\":0}]}\n```";
        assert_eq!(parse(raw), c4_piece());
    }

    #[test]
    fn parses_multiline_object_with_trailing_prose() {
        let raw = r#"Sure!
{
  "tempo": 100,
  "time_signature": "3/4",
  "notes": [
    {"pitch": "C4", "duration": 1, "time": 0, "track": 0}
  ]
}
Enjoy the waltz."#;
        assert_eq!(try_parse(raw).unwrap(), c4_piece());
    }

    #[test]
    fn passes_through_musically_odd_values() {
        let raw = r#"{"tempo": 999, "time_signature": "5/4", "notes": [
            {"pitch": "Q9", "duration": -2.0, "time": -1.0, "track": 7}
        ]}"#;
        let composition = parse(raw);
        assert_eq!(composition.tempo, 999);
        assert_eq!(composition.time_signature, "5/4");
        assert_eq!(composition.notes, vec![Note::new("Q9", -2.0, -1.0, 7)]);
    }

    #[test]
    fn falls_back_without_braces() {
        assert!(matches!(try_parse("no json here"), Err(ParseFailure::NoJsonObject)));
        assert!(matches!(try_parse("} backwards {"), Err(ParseFailure::NoJsonObject)));
        assert_eq!(parse("I cannot compose that."), fallback_composition());
    }

    #[test]
    fn falls_back_on_undecodable_json() {
        let raw = "{\"tempo\": 120, \"notes\": [}";
        assert!(matches!(try_parse(raw), Err(ParseFailure::Json(_))));
        assert_eq!(parse(raw), fallback_composition());
    }

    #[test]
    fn falls_back_on_missing_top_level_key() {
        let raw = r#"{"tempo": 120, "notes": []}"#;
        assert!(matches!(try_parse(raw), Err(ParseFailure::MissingKey("time_signature"))));
        assert_eq!(parse(raw), fallback_composition());
    }

    #[test]
    fn falls_back_on_missing_note_key() {
        let raw = r#"{"tempo": 120, "time_signature": "4/4", "notes": [
            {"pitch": "C4", "duration": 1.0, "time": 0.0, "track": 0},
            {"pitch": "D4", "duration": 1.0, "time": 1.0}
        ]}"#;
        assert!(matches!(
            try_parse(raw),
            Err(ParseFailure::MissingNoteKey { index: 1, key: "track" })
        ));
        assert_eq!(parse(raw), fallback_composition());
    }

    #[test]
    fn falls_back_on_wrong_types() {
        let raw = r#"{"tempo": "fast", "time_signature": "4/4", "notes": []}"#;
        assert!(matches!(try_parse(raw), Err(ParseFailure::Json(_))));
        let raw = r#"{"tempo": 120, "time_signature": "4/4", "notes": "C4 D4"}"#;
        assert!(matches!(try_parse(raw), Err(ParseFailure::NotesShape)));
    }

    #[test]
    fn fallback_is_sixteen_beats_of_melody_and_chords() {
        let fallback = fallback_composition();
        assert_eq!(fallback.tempo, 120);
        assert_eq!(fallback.time_signature, "4/4");
        assert_eq!(fallback.notes.len(), 18);
        assert_eq!(fallback.track_notes(MELODY_TRACK).count(), 14);
        assert_eq!(fallback.track_notes(CHORD_TRACK).count(), 4);
        assert_eq!(fallback.length_beats(), 16.0);
        assert!(fallback.check_playable().is_ok());
    }
}
