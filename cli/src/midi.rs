// Standard MIDI File output and input for compositions.
//
// A composition becomes an SMF format 1 file with one track per composition
// track (melody, chords). Each track carries its own name, tempo, meter and
// program change so either track plays correctly on its own.

use crate::pitch::pitch_to_number;
use crate::types::{Composition, CHORD_TRACK};
use anyhow::{anyhow, Context, Result};
use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
};

pub const TICKS_PER_QUARTER: u16 = 480;
pub const NOTE_VELOCITY: u8 = 100;
const ACOUSTIC_GRAND: u8 = 0;
const TRACK_COUNT: u8 = CHORD_TRACK + 1;
const DEFAULT_TEMPO_BPM: f64 = 120.0;
const MAX_TICK: u32 = 0x0FFF_FFFF;

pub fn midi_filename(prompt: &str, is_original: bool) -> String {
    let prefix = if is_original { "original" } else { "followup" };
    format!("{prefix}_{:x}.mid", md5::compute(prompt.as_bytes()))
}

pub fn write_composition(
    composition: &Composition,
    prompt: &str,
    is_original: bool,
    dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create MIDI directory {}", dir.display()))?;
    let path = dir.join(midi_filename(prompt, is_original));
    let bytes = encode(composition)?;
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn encode(composition: &Composition) -> Result<Vec<u8>> {
    let names: Vec<String> = (1..=TRACK_COUNT).map(|n| format!("Track {n}")).collect();
    let smf = composition_to_smf(composition, &names)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf).context("failed to encode MIDI")?;
    Ok(buf)
}

fn composition_to_smf<'a>(composition: &Composition, names: &'a [String]) -> Result<Smf<'a>> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let tempo_micros = composition
        .tempo_micros()
        .ok_or_else(|| anyhow!("tempo {} cannot be written to MIDI", composition.tempo))?;
    let meter = parse_time_signature(&composition.time_signature);

    for track_index in 0..TRACK_COUNT {
        let channel = u4::new(track_index);
        let mut track: Track<'a> = Vec::new();
        track.push(meta(MetaMessage::TrackName(names[usize::from(track_index)].as_bytes())));
        track.push(meta(MetaMessage::Tempo(u24::new(tempo_micros))));
        if let Some((numerator, denominator_pow)) = meter {
            track.push(meta(MetaMessage::TimeSignature(numerator, denominator_pow, 24, 8)));
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program: u7::new(ACOUSTIC_GRAND) },
            },
        });

        // (tick, is_note_on, key); note-offs sort first on a shared tick, so
        // notes keep a one-tick minimum
        let mut events: Vec<(u32, bool, u8)> = Vec::new();
        for note in composition.track_notes(track_index) {
            let key = pitch_to_number(&note.pitch)
                .with_context(|| format!("cannot encode pitch {:?}", note.pitch))?;
            let start = beats_to_ticks(note.time).min(MAX_TICK - 1);
            let end = beats_to_ticks(note.end()).max(start + 1);
            events.push((start, true, key));
            events.push((end, false, key));
        }
        events.sort_by_key(|&(tick, is_on, key)| (tick, is_on, key));

        let mut last_tick = 0u32;
        for (tick, is_on, key) in events {
            let message = if is_on {
                MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(NOTE_VELOCITY) }
            } else {
                MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) }
            };
            track.push(TrackEvent {
                delta: u28::new(tick - last_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = tick;
        }

        track.push(meta(MetaMessage::EndOfTrack));
        smf.tracks.push(track);
    }

    Ok(smf)
}

fn meta(message: MetaMessage<'_>) -> TrackEvent<'_> {
    TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(message) }
}

fn beats_to_ticks(beats: f64) -> u32 {
    let ticks = (beats.max(0.0) * f64::from(TICKS_PER_QUARTER)).round();
    ticks.min(f64::from(MAX_TICK)) as u32
}

// (numerator, log2(denominator))
fn parse_time_signature(signature: &str) -> Option<(u8, u8)> {
    let (numerator, denominator) = signature.trim().split_once('/')?;
    let numerator: u8 = numerator.trim().parse().ok().filter(|n| *n > 0)?;
    let denominator: u8 = denominator.trim().parse().ok()?;
    if !denominator.is_power_of_two() {
        return None;
    }
    Some((numerator, denominator.trailing_zeros() as u8))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedNote {
    pub key: u8,
    pub velocity: u8,
    pub start_beats: f64,
    pub duration_beats: f64,
    pub track: usize,
}

#[derive(Debug, Clone)]
pub struct DecodedMidi {
    pub tempo_bpm: f64,
    pub notes: Vec<DecodedNote>,
}

impl DecodedMidi {
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo_bpm
    }

    pub fn length_beats(&self) -> f64 {
        self.notes.iter().map(|n| n.start_beats + n.duration_beats).fold(0.0, f64::max)
    }
}

pub fn read_file(path: &Path) -> Result<DecodedMidi> {
    let data =
        fs::read(path).with_context(|| format!("failed to read MIDI file {}", path.display()))?;
    read(&data).with_context(|| format!("failed to decode {}", path.display()))
}

// The first tempo event sets the tempo for the whole file.
pub fn read(data: &[u8]) -> Result<DecodedMidi> {
    let smf = Smf::parse(data).map_err(|err| anyhow!("invalid MIDI data: {err}"))?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => f64::from(tpb.as_int()),
        Timing::Timecode(..) => return Err(anyhow!("SMPTE timing is not supported")),
    };

    let mut tempo_bpm = None;
    let mut notes = Vec::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();

        for event in track {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) if tempo_bpm.is_none() => {
                    tempo_bpm = Some(60_000_000.0 / f64::from(micros.as_int().max(1)));
                }
                TrackEventKind::Midi { channel, message } => {
                    let (key, on_velocity) = match message {
                        MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int()),
                        MidiMessage::NoteOff { key, .. } => (key.as_int(), 0),
                        _ => continue,
                    };
                    let slot = (channel.as_int(), key);
                    if on_velocity > 0 {
                        open.entry(slot).or_default().push_back((tick, on_velocity));
                    } else if let Some((start, velocity)) =
                        open.get_mut(&slot).and_then(VecDeque::pop_front)
                    {
                        notes.push(DecodedNote {
                            key,
                            velocity,
                            start_beats: start as f64 / ticks_per_beat,
                            duration_beats: (tick - start) as f64 / ticks_per_beat,
                            track: track_index,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    notes.sort_by(|a, b| {
        a.track.cmp(&b.track).then(a.start_beats.total_cmp(&b.start_beats)).then(a.key.cmp(&b.key))
    });

    Ok(DecodedMidi { tempo_bpm: tempo_bpm.unwrap_or(DEFAULT_TEMPO_BPM), notes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fallback_composition;
    use crate::types::Note;

    fn tuples(composition: &Composition) -> Vec<(u8, f64, f64, usize)> {
        let mut out: Vec<_> = composition
            .notes
            .iter()
            .map(|n| (pitch_to_number(&n.pitch).unwrap(), n.time, n.duration, usize::from(n.track)))
            .collect();
        out.sort_by(|a, b| a.3.cmp(&b.3).then(a.1.total_cmp(&b.1)).then(a.0.cmp(&b.0)));
        out
    }

    #[test]
    fn round_trips_note_events() {
        let composition = Composition {
            tempo: 96,
            time_signature: "3/4".into(),
            notes: vec![
                Note::new("C4", 1.0, 0.0, 0),
                Note::new("E4", 0.5, 1.0, 0),
                Note::new("G4", 1.5, 1.5, 0),
                Note::new("C#5", 0.25, 3.0, 0),
                Note::new("C3", 3.0, 0.0, 1),
                Note::new("G3", 3.0, 0.0, 1),
                Note::new("A2", 3.0, 3.0, 1),
            ],
        };

        let decoded = read(&encode(&composition).unwrap()).unwrap();
        assert!((decoded.tempo_bpm - 96.0).abs() < 0.01);
        assert!(decoded.notes.iter().all(|n| n.velocity == NOTE_VELOCITY));
        let got: Vec<_> = decoded
            .notes
            .iter()
            .map(|n| (n.key, n.start_beats, n.duration_beats, n.track))
            .collect();
        assert_eq!(got, tuples(&composition));
    }

    #[test]
    fn round_trips_fallback_composition() {
        let fallback = fallback_composition();
        let decoded = read(&encode(&fallback).unwrap()).unwrap();
        assert_eq!(decoded.notes.len(), 18);
        assert_eq!(decoded.length_beats(), 16.0);
        assert!((decoded.seconds_per_beat() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn repeated_key_pairs_in_order() {
        let composition = Composition {
            tempo: 120,
            time_signature: "4/4".into(),
            notes: vec![Note::new("D4", 1.0, 0.0, 0), Note::new("D4", 2.0, 1.0, 0)],
        };
        let decoded = read(&encode(&composition).unwrap()).unwrap();
        let got: Vec<_> = decoded.notes.iter().map(|n| (n.start_beats, n.duration_beats)).collect();
        assert_eq!(got, vec![(0.0, 1.0), (1.0, 2.0)]);
    }

    #[test]
    fn sub_tick_durations_keep_note_on_first() {
        let composition = Composition {
            tempo: 120,
            time_signature: "4/4".into(),
            notes: vec![Note::new("C4", 0.0005, 0.0, 0), Note::new("E4", 1.0, 1.0, 0)],
        };
        assert_eq!(composition.check_playable(), Ok(()));

        let bytes = encode(&composition).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let c4: Vec<bool> = smf.tracks[0]
            .iter()
            .filter_map(|event| match event.kind {
                TrackEventKind::Midi { message: MidiMessage::NoteOn { key, .. }, .. }
                    if key.as_int() == 60 =>
                {
                    Some(true)
                }
                TrackEventKind::Midi { message: MidiMessage::NoteOff { key, .. }, .. }
                    if key.as_int() == 60 =>
                {
                    Some(false)
                }
                _ => None,
            })
            .collect();
        assert_eq!(c4, vec![true, false]);

        let decoded = read(&bytes).unwrap();
        assert_eq!(decoded.notes.len(), 2);
        assert_eq!(decoded.notes[0].key, 60);
        assert_eq!(decoded.notes[0].duration_beats, 1.0 / f64::from(TICKS_PER_QUARTER));
    }

    #[test]
    fn refuses_tempo_outside_meta_range() {
        let mut composition = fallback_composition();
        composition.tempo = 3;
        assert!(encode(&composition).is_err());
        composition.tempo = 60_000_001;
        assert!(encode(&composition).is_err());

        composition.tempo = 4;
        let decoded = read(&encode(&composition).unwrap()).unwrap();
        assert!((decoded.tempo_bpm - 4.0).abs() < 1e-9);
    }

    #[test]
    fn writes_two_tracks_with_meter() {
        let bytes = encode(&fallback_composition()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);
        assert!(smf.tracks[1].iter().any(|event| matches!(
            event.kind,
            TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8))
        )));
    }

    #[test]
    fn filename_is_deterministic_per_prompt() {
        let prompt = "a calm piano piece in the rain";
        let first = midi_filename(prompt, true);
        assert_eq!(first, midi_filename(prompt, true));
        assert!(first.starts_with("original_") && first.ends_with(".mid"));
        assert_eq!(first.len(), "original_".len() + 32 + ".mid".len());

        let followup = midi_filename(prompt, false);
        assert_eq!(followup.strip_prefix("followup_"), first.strip_prefix("original_"));
        assert_eq!(midi_filename("", true), "original_d41d8cd98f00b204e9800998ecf8427e.mid");
    }

    #[test]
    fn write_composition_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("midi");
        let path = write_composition(&fallback_composition(), "hello", false, &target).unwrap();
        assert_eq!(path, target.join(midi_filename("hello", false)));
        assert_eq!(read_file(&path).unwrap().notes.len(), 18);
    }

    #[test]
    fn parses_time_signatures() {
        assert_eq!(parse_time_signature("4/4"), Some((4, 2)));
        assert_eq!(parse_time_signature("3/4"), Some((3, 2)));
        assert_eq!(parse_time_signature("6/8"), Some((6, 3)));
        assert_eq!(parse_time_signature("5/3"), None);
        assert_eq!(parse_time_signature("common"), None);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(read(b"not a midi file").is_err());
    }
}
