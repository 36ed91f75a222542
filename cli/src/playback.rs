use crate::{midi, synth::SynthSource};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rodio::{OutputStream, Sink};
use std::{
    io::{self, IsTerminal},
    path::Path,
    thread,
    time::Duration,
};
use tracing::{error, info};

const TICK: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Stopped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Player {
    tick: Duration,
}

impl Default for Player {
    fn default() -> Self {
        Self { tick: TICK }
    }
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    // Blocks until the file ends or a stop key arrives. Errors are logged.
    pub fn play(&self, path: &Path) -> PlaybackOutcome {
        match self.try_play(path) {
            Ok(outcome) => {
                info!(path = %path.display(), ?outcome, "playback ended");
                outcome
            }
            Err(err) => {
                error!("error playing MIDI {}: {err:#}", path.display());
                PlaybackOutcome::Failed
            }
        }
    }

    fn try_play(&self, path: &Path) -> Result<PlaybackOutcome> {
        let decoded = midi::read_file(path)?;
        let source = SynthSource::new(&decoded);

        let (_stream, handle) =
            OutputStream::try_default().context("failed to open audio output")?;
        let sink = Sink::try_new(&handle).context("failed to create audio sink")?;
        sink.append(source);
        sink.play();

        let mut keys = StopKeys::capture();
        loop {
            if sink.empty() {
                return Ok(PlaybackOutcome::Finished);
            }
            if keys.stop_requested(self.tick)? {
                sink.stop();
                return Ok(PlaybackOutcome::Stopped);
            }
        }
    }
}

// Without a terminal this only paces the loop.
struct StopKeys {
    raw: bool,
}

impl StopKeys {
    fn capture() -> Self {
        let raw = io::stdin().is_terminal() && enable_raw_mode().is_ok();
        Self { raw }
    }

    fn stop_requested(&mut self, tick: Duration) -> Result<bool> {
        if !self.raw {
            thread::sleep(tick);
            return Ok(false);
        }
        if event::poll(tick).context("failed to poll terminal events")? {
            if let Event::Key(key) = event::read().context("failed to read terminal event")? {
                return Ok(is_stop_key(&key));
            }
        }
        Ok(false)
    }
}

impl Drop for StopKeys {
    fn drop(&mut self) {
        if self.raw {
            let _ = disable_raw_mode();
        }
    }
}

fn is_stop_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}
