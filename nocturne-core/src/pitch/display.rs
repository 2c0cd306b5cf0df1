//! # Display Smoothing
//!
//! Turns the irregular raw reading stream into steady needle and note values
//! for a tuner display refreshed at 60 Hz.
//!
//! [`PitchDisplayEngine`] holds the smoothing state and is advanced once per
//! display tick. [`DisplayFeed`] runs an engine on a tokio task and publishes
//! [`DisplayValues`] snapshots through a `watch` channel.

use super::PitchReading;
use crate::tuner::tuning;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Display refresh period.
pub const DISPLAY_INTERVAL: Duration = Duration::from_micros(16_667);

/// Ticks a new rounded note has to persist before the display switches to it.
pub const NOTE_CHANGE_FRAMES: u32 = 5;

const CENTS_SPEED: f64 = 0.25;

/// MIDI convergence per tick: `0.1` at zero confidence up to `0.5` at full.
fn midi_speed(confidence: f64) -> f64 {
    0.1 + 0.4 * confidence.clamp(0.0, 1.0)
}

/// One published display frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayValues {
    /// Displayed note as a MIDI number, `-1` for none.
    pub note: i32,
    /// Interpolated fractional MIDI value.
    pub midi: f64,
    pub cents: f64,
    pub frequency: f64,
}

impl Default for DisplayValues {
    fn default() -> Self {
        Self {
            note: -1,
            midi: 0.0,
            cents: 0.0,
            frequency: 0.0,
        }
    }
}

impl DisplayValues {
    pub fn has_note(&self) -> bool {
        self.note >= 0
    }

    /// Name such as `"E2"`, or `None` when no note is shown.
    pub fn note_name(&self) -> Option<String> {
        self.has_note().then(|| tuning::display_name(self.note))
    }
}

/// Smoothing and note hysteresis state.
///
/// The target is always a whole note; the needle shows the cents offset from
/// it separately.
#[derive(Debug)]
pub struct PitchDisplayEngine {
    target_midi: f64,
    target_cents: f64,
    confidence: f64,
    display_note: i32,
    display_midi: f64,
    display_cents: f64,
    display_frequency: f64,
    note_change_frames: u32,
}

impl PitchDisplayEngine {
    pub fn new() -> Self {
        Self {
            target_midi: 0.0,
            target_cents: 0.0,
            confidence: 0.0,
            display_note: -1,
            display_midi: 0.0,
            display_cents: 0.0,
            display_frequency: 0.0,
            note_change_frames: 0,
        }
    }

    /// Sets the values the display converges to on the following ticks.
    ///
    /// The first reading after a clear is shown immediately. The frequency is
    /// informational and always shown as received.
    pub fn update_target(&mut self, midi: i32, cents: f64, frequency: f64, confidence: f64) {
        self.target_midi = midi as f64;
        self.target_cents = cents;
        self.confidence = confidence;
        self.display_frequency = frequency;

        if self.display_note < 0 {
            self.display_note = midi;
            self.display_midi = midi as f64;
            self.display_cents = cents;
        }
    }

    /// Advances the display by one frame.
    pub fn tick(&mut self) {
        if self.display_note < 0 {
            return;
        }

        self.display_midi += (self.target_midi - self.display_midi) * midi_speed(self.confidence);
        self.display_cents += (self.target_cents - self.display_cents) * CENTS_SPEED;

        let rounded = self.target_midi.round() as i32;
        if rounded == self.display_note {
            self.note_change_frames = 0;
        } else {
            self.note_change_frames += 1;
        }
        if self.note_change_frames > NOTE_CHANGE_FRAMES {
            self.display_note = rounded;
            self.display_midi = self.target_midi;
            self.display_cents = self.target_cents;
            self.note_change_frames = 0;
        }
    }

    /// Clears every displayed value.
    pub fn stop(&mut self) {
        *self = Self::new();
    }

    pub fn is_active(&self) -> bool {
        self.display_note >= 0
    }

    pub fn display_note(&self) -> i32 {
        self.display_note
    }

    pub fn display_cents(&self) -> f64 {
        self.display_cents
    }

    pub fn display_frequency(&self) -> f64 {
        self.display_frequency
    }

    pub fn values(&self) -> DisplayValues {
        DisplayValues {
            note: self.display_note,
            midi: self.display_midi,
            cents: self.display_cents,
            frequency: self.display_frequency,
        }
    }
}

enum Command {
    Start,
    Reading(PitchReading),
    Stop,
}

/// Handle to a running display driver.
///
/// Cloning shares the driver. The driver task ends when every handle is
/// dropped.
#[derive(Clone)]
pub struct DisplayFeed {
    commands: mpsc::UnboundedSender<Command>,
}

impl DisplayFeed {
    /// Spawns the 60 Hz driver on the current tokio runtime.
    pub fn spawn() -> (Self, watch::Receiver<DisplayValues>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (values_tx, values_rx) = watch::channel(DisplayValues::default());
        tokio::spawn(drive(commands_rx, values_tx));
        (Self { commands: commands_tx }, values_rx)
    }

    /// Begins a listening session from a cleared display.
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Retargets the display. Unpitched readings keep the last target.
    pub fn push(&self, reading: &PitchReading) {
        if reading.is_pitched() {
            let _ = self.commands.send(Command::Reading(*reading));
        }
    }

    /// Ends the session and publishes a cleared display.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }
}

async fn drive(mut commands: mpsc::UnboundedReceiver<Command>, values: watch::Sender<DisplayValues>) {
    let mut engine = PitchDisplayEngine::new();
    let mut interval = tokio::time::interval(DISPLAY_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut listening = false;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Start) => {
                    engine.stop();
                    listening = true;
                }
                Some(Command::Reading(reading)) => {
                    if listening {
                        engine.update_target(reading.midi, reading.cents, reading.hz, reading.confidence);
                    }
                }
                Some(Command::Stop) => {
                    engine.stop();
                    listening = false;
                    values.send_replace(engine.values());
                }
                None => break,
            },
            _ = interval.tick() => {
                if listening {
                    engine.tick();
                    let frame = engine.values();
                    values.send_if_modified(|current| {
                        let changed = *current != frame;
                        *current = frame;
                        changed
                    });
                }
            }
        }
    }
    log::debug!("Display driver finished");
}
