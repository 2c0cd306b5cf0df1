//! # Main Display
//!
//! One-line summaries of the metronome and tuner state, and of the smoothed
//! tuner display. The shell prints a line whenever its text changes.

use super::cent_meter::CentMeter;
use nocturne_core::metronome::MetronomeState;
use nocturne_core::pitch::DisplayValues;
use nocturne_core::tuner::{TunerMode, TunerState};

/// Beat dots with accents as `O`, the current beat in brackets while
/// playing.
fn beat_row(state: &MetronomeState) -> String {
    let pattern = state.accent_pattern();
    pattern
        .as_slice()
        .iter()
        .enumerate()
        .map(|(beat, &accent)| {
            let dot = if accent { 'O' } else { 'o' };
            if state.is_playing && beat as u32 == state.current_beat {
                format!("[{}]", dot)
            } else {
                format!(" {} ", dot)
            }
        })
        .collect()
}

pub fn metronome_line(state: &MetronomeState) -> String {
    let transport = if state.is_playing { "playing" } else { "stopped" };
    format!(
        "metronome {:>3} bpm {} {} {} |{}|",
        state.bpm,
        state.time_signature,
        state.beat_sound,
        transport,
        beat_row(state)
    )
}

pub fn tuner_line(state: &TunerState) -> String {
    let mut line = format!(
        "tuner {} {} A4={:.0} Hz",
        state.mode.display_name(),
        state.selected_tuning,
        state.a4_calibration
    );
    match state.mode {
        TunerMode::Microphone => {
            line.push_str(if state.is_listening { " listening" } else { " idle" });
            line.push_str(&format!(" mic={:?}", state.mic_permission));
            if let Some(pitch) = &state.detected_pitch {
                line.push_str(&format!(" {} stability {:.0}%", pitch, state.pitch_stability * 100.0));
            }
        }
        TunerMode::ReferenceTone => {
            let strings: Vec<String> = state
                .current_strings()
                .iter()
                .map(|s| {
                    if state.playing_string_index == Some(s.string_number - 1) {
                        format!("*{}*", s.note_name)
                    } else {
                        s.note_name.clone()
                    }
                })
                .collect();
            line.push_str(&format!(" strings {}", strings.join(" ")));
        }
    }
    line
}

pub fn display_line(values: &DisplayValues) -> String {
    match values.note_name() {
        Some(name) => format!(
            "{:<4} {:7.2} Hz {}",
            name,
            values.frequency,
            CentMeter::new(Some(values.cents)).render()
        ),
        None => format!("--   {:>10} {}", "", CentMeter::new(None).render()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocturne_core::metronome::TimeSignature;

    #[test]
    fn metronome_line_marks_the_current_beat() {
        let state = MetronomeState {
            is_playing: true,
            current_beat: 1,
            time_signature: TimeSignature::THREE_FOUR,
            ..MetronomeState::default()
        };
        let line = metronome_line(&state);
        assert!(line.contains("120 bpm 3/4"));
        assert!(line.contains("| O [o] o |"));
    }

    #[test]
    fn reference_mode_lists_strings_and_the_playing_one() {
        let state = TunerState {
            mode: TunerMode::ReferenceTone,
            playing_string_index: Some(0),
            ..TunerState::default()
        };
        let line = tuner_line(&state);
        assert!(line.contains("strings *E2* A2 D3 G3 B3 E4"));
    }

    #[test]
    fn display_without_a_note_shows_dashes() {
        assert!(display_line(&DisplayValues::default()).starts_with("--"));
    }

    #[test]
    fn display_with_a_note_shows_name_and_meter() {
        let values = DisplayValues {
            note: 69,
            midi: 69.0,
            cents: 2.0,
            frequency: 440.5,
        };
        let line = display_line(&values);
        assert!(line.starts_with("A4"));
        assert!(line.contains("440.50 Hz"));
        assert!(line.ends_with("in tune"));
    }
}
