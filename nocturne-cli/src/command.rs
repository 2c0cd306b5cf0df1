//! Parsing of the line-oriented commands typed at the prompt.

use nocturne_core::metronome::{BeatSound, MetronomeAction, TimeSignature};
use nocturne_core::tuner::{Instrument, TunerAction, TunerMode, TuningPreset};
use std::time::Instant;

pub const HELP: &str = "\
metronome:
  play | stop             start or stop the click
  bpm <n>                 set the tempo (30-240)
  + | -                   nudge the tempo by one
  tap                     tap tempo
  drag <degrees>          set the dial angle
  ts <beats/note>         time signature, e.g. 3/4 or 7/8
  accent                  cycle the accent pattern
  sound <key>             beat sound (simple, classic, seiko, ...)
tuner:
  listen | unlisten       start or stop the microphone
  mode                    switch microphone / reference tone
  instrument <key>        guitar, bass or ukulele
  tuning <key>            tuning preset of the instrument
  string <n>              toggle the reference tone of string n (1 = first)
  a4 <hz>                 calibration (430-450)
general:
  help | quit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Metronome(MetronomeAction),
    /// A full dial gesture ending at an angle in degrees.
    Drag(f64),
    Tuner(TunerAction),
    /// Flips between microphone and reference tone mode.
    ToggleMode,
    Help,
    Quit,
}

/// Parses one line. Empty lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let command = match verb.to_ascii_lowercase().as_str() {
        "play" => Command::Metronome(MetronomeAction::PlayTapped),
        "stop" => Command::Metronome(MetronomeAction::StopTapped),
        "+" => Command::Metronome(MetronomeAction::BpmPlus),
        "-" => Command::Metronome(MetronomeAction::BpmMinus),
        "bpm" => Command::Metronome(MetronomeAction::BpmEntryConfirmed(number(verb, arg)?)),
        "tap" => Command::Metronome(MetronomeAction::TapTempoPressed(Instant::now())),
        "drag" => Command::Drag(number(verb, arg)?),
        "ts" => Command::Metronome(MetronomeAction::TimeSignatureChanged(
            required(verb, arg)?.parse::<TimeSignature>()?,
        )),
        "accent" => Command::Metronome(MetronomeAction::AccentPatternCycled),
        "sound" => Command::Metronome(MetronomeAction::BeatSoundChanged(
            required(verb, arg)?.parse::<BeatSound>()?,
        )),
        "listen" => Command::Tuner(TunerAction::StartListening),
        "unlisten" => Command::Tuner(TunerAction::StopListening),
        "mode" => Command::ToggleMode,
        "instrument" => Command::Tuner(TunerAction::InstrumentChanged(
            required(verb, arg)?.parse::<Instrument>()?,
        )),
        "tuning" => Command::Tuner(TunerAction::TuningChanged(
            required(verb, arg)?.parse::<TuningPreset>()?,
        )),
        "string" => {
            let n: usize = number(verb, arg)?;
            if n == 0 {
                return Err("strings are numbered from 1".to_string());
            }
            Command::Tuner(TunerAction::StringTapped(n - 1))
        }
        "a4" => Command::Tuner(TunerAction::A4CalibrationChanged(number(verb, arg)?)),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

/// The mode a [`Command::ToggleMode`] switches to.
pub fn toggled(mode: TunerMode) -> TunerMode {
    match mode {
        TunerMode::Microphone => TunerMode::ReferenceTone,
        TunerMode::ReferenceTone => TunerMode::Microphone,
    }
}

fn required<'a>(verb: &str, arg: Option<&'a str>) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("'{}' needs an argument", verb))
}

fn number<T: std::str::FromStr>(verb: &str, arg: Option<&str>) -> Result<T, String> {
    let arg = required(verb, arg)?;
    arg.parse().map_err(|_| format!("'{}' is not a valid number for '{}'", arg, verb))
}
