mod common;

use approx::assert_relative_eq;
use common::{eventually, settle, tuner, tuner_with, DetectorCall, RecordingSettings, ToneCall};
use nocturne_core::audio::ToneEvent;
use nocturne_core::pitch::{MicPermission, PitchReading};
use nocturne_core::settings::TunerSettings;
use nocturne_core::tuner::effects::{PERSIST, PITCH, TONE};
use nocturne_core::tuner::{
    Instrument, NoteName, TunerAction, TunerEffects, TunerMode, TunerReducer, TunerState, TuningDatabase,
    TuningPreset,
};
use nocturne_core::{EffectShape, Reducer};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn reduce(state: &mut TunerState, action: TunerAction) -> Vec<EffectShape> {
    let effects = TunerEffects::new(
        Arc::new(common::MockDetector::new(MicPermission::Authorized)),
        Arc::new(common::MockTone::default()),
        Arc::new(RecordingSettings::default()),
    );
    TunerReducer::new(effects).reduce(state, action).shape()
}

fn a440() -> PitchReading {
    PitchReading {
        hz: 440.0,
        midi: 69,
        cents: 0.0,
        confidence: 0.95,
        stability: 0.85,
    }
}

#[test]
fn a4_calibration_stays_in_range() {
    let mut state = TunerState::default();
    for a4 in [500.0, 300.0, 442.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        reduce(&mut state, TunerAction::A4CalibrationChanged(a4));
        assert!((430.0..=450.0).contains(&state.a4_calibration), "a4 {}", state.a4_calibration);
    }
}

#[test]
fn a4_change_persists_and_retunes_the_strings() {
    let mut state = TunerState::default();
    let shape = reduce(&mut state, TunerAction::A4CalibrationChanged(432.0));
    assert_eq!(shape, vec![EffectShape::Cancel(PERSIST), EffectShape::Task(PERSIST)]);
    let a_string = &state.current_strings()[1];
    assert_eq!(a_string.midi_note, 45);
    assert_relative_eq!(a_string.frequency, 108.0, epsilon = 1e-9);

    assert!(reduce(&mut state, TunerAction::A4CalibrationChanged(432.0)).is_empty());
}

#[test]
fn pitch_reading_derives_note_and_octave() {
    let mut state = TunerState::default();
    reduce(&mut state, TunerAction::PitchDetected(a440()));

    let pitch = state.detected_pitch.clone().unwrap();
    assert_eq!(pitch.note_name, NoteName::A);
    assert_eq!(pitch.octave, 4);
    assert_eq!(pitch.midi_note, 69);
    assert_relative_eq!(pitch.cents, 0.0);
    assert_eq!(pitch.confidence, 0.95);
    assert_eq!(state.pitch_stability, 0.85);
}

#[test]
fn out_of_range_readings_are_discarded() {
    let mut state = TunerState::default();
    reduce(&mut state, TunerAction::PitchDetected(a440()));
    reduce(
        &mut state,
        TunerAction::PitchDetected(PitchReading {
            midi: 140,
            stability: 0.1,
            ..a440()
        }),
    );
    assert_eq!(state.detected_pitch.as_ref().map(|p| p.midi_note), Some(69));
    assert_eq!(state.pitch_stability, 0.85);
}

#[test]
fn pitch_lost_keeps_the_note_but_drops_stability() {
    let mut state = TunerState::default();
    reduce(&mut state, TunerAction::PitchDetected(a440()));
    reduce(&mut state, TunerAction::PitchLost);

    let pitch = state.detected_pitch.clone().unwrap();
    assert_eq!(pitch.note_name, NoteName::A);
    assert_eq!(pitch.octave, 4);
    assert_eq!(state.pitch_stability, 0.0);
}

#[test]
fn instrument_change_selects_its_default_tuning() {
    let mut state = TunerState {
        playing_string_index: Some(2),
        ..TunerState::default()
    };
    let shape = reduce(&mut state, TunerAction::InstrumentChanged(Instrument::Ukulele));
    assert_eq!(state.selected_instrument, Instrument::Ukulele);
    assert_eq!(state.selected_tuning, TuningDatabase::default_tuning(Instrument::Ukulele));
    assert_eq!(state.playing_string_index, None);
    assert!(shape.contains(&EffectShape::Cancel(TONE)));
    assert!(shape.contains(&EffectShape::Task(PERSIST)));

    reduce(&mut state, TunerAction::InstrumentChanged(Instrument::Bass));
    assert_eq!(state.selected_tuning, TuningPreset::BassStandard);
}

#[test]
fn tapping_a_string_toggles_its_tone() {
    let mut state = TunerState::default();
    let shape = reduce(&mut state, TunerAction::StringTapped(0));
    assert_eq!(state.playing_string_index, Some(0));
    assert_eq!(shape, vec![EffectShape::Stream(TONE)]);

    reduce(&mut state, TunerAction::StringTapped(3));
    assert_eq!(state.playing_string_index, Some(3));

    let shape = reduce(&mut state, TunerAction::StringTapped(3));
    assert_eq!(state.playing_string_index, None);
    assert_eq!(shape, vec![EffectShape::Cancel(TONE), EffectShape::Task(TONE)]);

    assert!(reduce(&mut state, TunerAction::StringTapped(42)).is_empty());
}

#[test]
fn leaving_a_mode_stops_what_it_was_doing() {
    let mut state = TunerState {
        is_listening: true,
        pitch_stability: 0.5,
        ..TunerState::default()
    };
    let shape = reduce(&mut state, TunerAction::ModeChanged(TunerMode::ReferenceTone));
    assert!(!state.is_listening);
    assert_eq!(state.pitch_stability, 0.0);
    assert!(shape.contains(&EffectShape::Cancel(PITCH)));

    assert!(reduce(&mut state, TunerAction::ModeChanged(TunerMode::ReferenceTone)).is_empty());
}

#[test]
fn stop_all_with_nothing_active_does_nothing() {
    let mut state = TunerState::default();
    assert!(reduce(&mut state, TunerAction::StopAll).is_empty());
}

#[test]
fn denied_permission_never_listens() {
    let mut state = TunerState {
        mic_permission: MicPermission::Denied,
        ..TunerState::default()
    };
    assert!(reduce(&mut state, TunerAction::StartListening).is_empty());
    assert!(!state.is_listening);
}

#[test]
fn loaded_settings_are_clamped() {
    let mut state = TunerState::default();
    reduce(
        &mut state,
        TunerAction::SettingsLoaded(TunerSettings {
            instrument: Instrument::Bass,
            tuning: TuningPreset::BassDropD,
            a4: 470.0,
        }),
    );
    assert_eq!(state.selected_instrument, Instrument::Bass);
    assert_eq!(state.selected_tuning, TuningPreset::BassDropD);
    assert_eq!(state.a4_calibration, 450.0);
}

#[tokio::test(start_paused = true)]
async fn first_listen_asks_for_permission_then_starts() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::StartListening);
    assert!(!h.store.state().is_listening);
    settle().await;

    assert_eq!(h.detector.calls(), vec![DetectorCall::RequestPermission, DetectorCall::Start]);
    let state = h.store.state();
    assert_eq!(state.mic_permission, MicPermission::Authorized);
    assert!(state.is_listening);
}

#[tokio::test(start_paused = true)]
async fn refused_permission_stays_idle() {
    let h = tuner(MicPermission::Denied);
    h.store.send(TunerAction::StartListening);
    settle().await;

    assert_eq!(h.detector.calls(), vec![DetectorCall::RequestPermission]);
    let state = h.store.state();
    assert_eq!(state.mic_permission, MicPermission::Denied);
    assert!(!state.is_listening);
}

#[tokio::test(start_paused = true)]
async fn readings_flow_into_state_until_stopped() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::MicPermissionUpdated(MicPermission::Authorized));
    settle().await;

    assert!(h.detector.emit(a440()));
    settle().await;
    assert_eq!(h.store.state().detected_pitch.map(|p| p.midi_note), Some(69));

    assert!(h.detector.emit(PitchReading::NONE));
    settle().await;
    let state = h.store.state();
    assert!(state.detected_pitch.is_some());
    assert_eq!(state.pitch_stability, 0.0);

    h.store.send(TunerAction::StopListening);
    settle().await;
    let state = h.store.state();
    assert!(!state.is_listening);
    assert!(state.detected_pitch.is_none());
    assert_eq!(h.detector.calls().last(), Some(&DetectorCall::Stop));
    assert!(!h.detector.emit(a440()));
}

#[tokio::test(start_paused = true)]
async fn capture_failure_stops_listening() {
    let h = tuner(MicPermission::Authorized);
    h.detector.fail_start.store(true, Ordering::SeqCst);
    h.store.send(TunerAction::MicPermissionUpdated(MicPermission::Authorized));
    assert!(h.store.state().is_listening);
    settle().await;
    assert!(!h.store.state().is_listening);
}

#[tokio::test(start_paused = true)]
async fn lost_capture_stops_listening() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::MicPermissionUpdated(MicPermission::Authorized));
    settle().await;
    assert!(h.detector.emit(a440()));
    settle().await;
    assert!(h.store.state().detected_pitch.is_some());

    h.detector.end_sessions();
    settle().await;

    let state = h.store.state();
    assert!(!state.is_listening);
    assert!(state.detected_pitch.is_none());
    assert_eq!(state.pitch_stability, 0.0);
}

#[tokio::test(start_paused = true)]
async fn listening_again_replaces_the_running_session() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::MicPermissionUpdated(MicPermission::Authorized));
    settle().await;
    let first = h.detector.sessions.lock()[0].clone();

    h.store.send(TunerAction::StartListening);
    settle().await;

    assert_eq!(h.detector.calls(), vec![DetectorCall::Start, DetectorCall::Start]);
    assert!(first.is_closed());
    assert!(!h.detector.sessions.lock()[1].is_closed());
    assert!(h.store.is_running(PITCH));
    // The replaced session ended without reporting a failure.
    assert!(h.store.state().is_listening);

    // Readings from the replaced session never reach the state.
    assert!(first.send(a440()).is_err());
    assert!(h.store.state().detected_pitch.is_none());
    let reading = PitchReading {
        hz: 110.0,
        midi: 45,
        ..a440()
    };
    assert!(h.detector.emit(reading));
    settle().await;
    assert_eq!(h.store.state().detected_pitch.map(|p| p.midi_note), Some(45));
}

#[tokio::test(start_paused = true)]
async fn a_new_tone_replaces_the_sounding_one() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::StringTapped(0));
    settle().await;
    let first = h.tone.sessions.lock()[0].clone();

    h.store.send(TunerAction::StringTapped(5));
    settle().await;

    let strings = TuningDatabase::strings(TuningPreset::GuitarStandard, 440.0);
    assert_eq!(
        h.tone.calls(),
        vec![ToneCall::Play(strings[0].frequency), ToneCall::Play(strings[5].frequency)]
    );
    assert!(first.is_closed());
    assert_eq!(h.store.state().playing_string_index, Some(5));
}

#[tokio::test(start_paused = true)]
async fn tone_end_clears_the_playing_string() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::StringTapped(1));
    settle().await;
    assert!(h.tone.emit(ToneEvent::Stopped));
    settle().await;
    assert_eq!(h.store.state().playing_string_index, None);

    h.tone.fail_play.store(true, Ordering::SeqCst);
    h.store.send(TunerAction::StringTapped(2));
    assert_eq!(h.store.state().playing_string_index, Some(2));
    settle().await;
    assert_eq!(h.store.state().playing_string_index, None);
}

#[tokio::test(start_paused = true)]
async fn tuning_change_silences_the_tone_and_keeps_the_instrument() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::StringTapped(0));
    settle().await;
    let first = h.tone.sessions.lock()[0].clone();

    h.store.send(TunerAction::TuningChanged(TuningPreset::GuitarDropD));
    settle().await;

    let state = h.store.state();
    assert_eq!(state.selected_instrument, Instrument::Guitar);
    assert_eq!(state.selected_tuning, TuningPreset::GuitarDropD);
    assert_eq!(state.playing_string_index, None);
    let stops = h.tone.calls().iter().filter(|c| **c == ToneCall::Stop).count();
    assert_eq!(stops, 1);
    assert!(first.is_closed());
    assert!(!h.store.is_running(TONE));
}

#[tokio::test(start_paused = true)]
async fn stop_all_silences_everything() {
    let h = tuner(MicPermission::Authorized);
    h.store.send(TunerAction::MicPermissionUpdated(MicPermission::Authorized));
    h.store.send(TunerAction::StringTapped(0));
    settle().await;

    h.store.send(TunerAction::StopAll);
    settle().await;
    let state = h.store.state();
    assert!(!state.is_listening);
    assert_eq!(state.playing_string_index, None);
    assert!(h.detector.calls().contains(&DetectorCall::Stop));
    assert!(h.tone.calls().contains(&ToneCall::Stop));
    assert!(!h.store.is_running(PITCH));
}

#[tokio::test(start_paused = true)]
async fn calibration_edits_are_saved_once() {
    let h = tuner(MicPermission::Authorized);
    for a4 in [441.0, 442.0, 443.0] {
        h.store.send(TunerAction::A4CalibrationChanged(a4));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(h.settings.tuner_saves().is_empty());

    tokio::time::sleep(Duration::from_millis(301)).await;
    eventually(|| !h.settings.tuner_saves().is_empty()).await;
    assert_eq!(
        h.settings.tuner_saves(),
        vec![TunerSettings {
            a4: 443.0,
            ..TunerSettings::default()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn settings_are_loaded_on_request() {
    let h = tuner_with(
        MicPermission::Authorized,
        RecordingSettings {
            tuner: TunerSettings {
                instrument: Instrument::Ukulele,
                tuning: TuningPreset::UkuleleStandardC,
                a4: 442.0,
            },
            ..RecordingSettings::default()
        },
    );
    h.store.send(TunerAction::LoadSettings);
    eventually(|| h.store.state().a4_calibration != 440.0).await;

    let state = h.store.state();
    assert_eq!(state.selected_instrument, Instrument::Ukulele);
    assert_eq!(state.selected_tuning, TuningPreset::UkuleleStandardC);
    assert_eq!(state.a4_calibration, 442.0);
}
