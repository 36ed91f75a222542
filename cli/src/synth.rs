use crate::midi::DecodedMidi;
use crate::pitch::key_frequency;
use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 44_100;
const ATTACK_SECONDS: f32 = 0.01;
const RELEASE_SECONDS: f32 = 0.08;
const DECAY_PER_SECOND: f32 = 1.2;
const VOICE_GAIN: f32 = 0.18;

#[derive(Debug, Clone)]
struct Voice {
    start: u64,
    end: u64,
    frequency: f32,
    gain: f32,
}

impl Voice {
    fn release_end(&self) -> u64 {
        self.end + seconds_to_samples(RELEASE_SECONDS)
    }

    fn sample(&self, position: u64) -> f32 {
        let elapsed = (position - self.start) as f32 / SAMPLE_RATE as f32;
        let attack = (elapsed / ATTACK_SECONDS).min(1.0);
        let release = if position < self.end {
            1.0
        } else {
            let since_end = (position - self.end) as f32 / SAMPLE_RATE as f32;
            (1.0 - since_end / RELEASE_SECONDS).max(0.0)
        };
        let decay = (-DECAY_PER_SECOND * elapsed).exp();
        let tone = (TAU * self.frequency * elapsed).sin()
            + 0.3 * (TAU * 2.0 * self.frequency * elapsed).sin();
        tone * self.gain * attack * release * decay
    }
}

pub struct SynthSource {
    voices: Vec<Voice>,
    active: Vec<usize>,
    next_voice: usize,
    position: u64,
    length: u64,
}

impl SynthSource {
    pub fn new(midi: &DecodedMidi) -> Self {
        let seconds_per_beat = midi.seconds_per_beat() as f32;
        let mut voices: Vec<Voice> = midi
            .notes
            .iter()
            .filter(|note| note.duration_beats > 0.0)
            .map(|note| {
                let start = seconds_to_samples(note.start_beats as f32 * seconds_per_beat);
                let length = seconds_to_samples(note.duration_beats as f32 * seconds_per_beat);
                Voice {
                    start,
                    end: start + length.max(1),
                    frequency: key_frequency(note.key),
                    gain: VOICE_GAIN * f32::from(note.velocity) / 127.0,
                }
            })
            .collect();
        voices.sort_by_key(|voice| voice.start);
        let length = voices.iter().map(Voice::release_end).max().unwrap_or(0);
        Self { voices, active: Vec::new(), next_voice: 0, position: 0, length }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.length as f64 / f64::from(SAMPLE_RATE))
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.length {
            return None;
        }
        while self.next_voice < self.voices.len()
            && self.voices[self.next_voice].start <= self.position
        {
            self.active.push(self.next_voice);
            self.next_voice += 1;
        }
        let position = self.position;
        let voices = &self.voices;
        self.active.retain(|&index| voices[index].release_end() > position);

        let value: f32 = self.active.iter().map(|&index| voices[index].sample(position)).sum();
        self.position += 1;
        Some(value.clamp(-1.0, 1.0))
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}

fn seconds_to_samples(seconds: f32) -> u64 {
    (seconds.max(0.0) * SAMPLE_RATE as f32).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::DecodedNote;

    fn decoded(notes: Vec<DecodedNote>) -> DecodedMidi {
        DecodedMidi { tempo_bpm: 120.0, notes }
    }

    fn note(key: u8, start_beats: f64, duration_beats: f64) -> DecodedNote {
        DecodedNote { key, velocity: 100, start_beats, duration_beats, track: 0 }
    }

    #[test]
    fn length_covers_last_note_and_release() {
        let source = SynthSource::new(&decoded(vec![note(60, 0.0, 1.0), note(64, 2.0, 2.0)]));
        // four beats at 120 bpm, plus the release tail
        let expected = 2.0 + RELEASE_SECONDS as f64;
        assert!((source.duration().as_secs_f64() - expected).abs() < 1e-3);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.sample_rate(), SAMPLE_RATE);
    }

    #[test]
    fn renders_bounded_audible_samples() {
        let chord = vec![note(48, 0.0, 1.0), note(52, 0.0, 1.0), note(55, 0.0, 1.0)];
        let samples: Vec<f32> = SynthSource::new(&decoded(chord)).collect();
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(samples.iter().any(|s| s.abs() > 0.05));
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn silent_gap_between_notes() {
        let source = SynthSource::new(&decoded(vec![note(60, 0.0, 0.5), note(60, 3.0, 0.5)]));
        let samples: Vec<f32> = source.collect();
        // 1.0 s into the piece the first note has fully released
        let gap = SAMPLE_RATE as usize;
        assert!(samples[gap..gap + 100].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn empty_input_yields_no_samples() {
        assert_eq!(SynthSource::new(&decoded(Vec::new())).count(), 0);
    }
}
