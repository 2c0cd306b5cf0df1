//! # Beat Scheduler
//!
//! The sample-accurate core of the metronome. [`BeatScheduler`] runs inside
//! the output callback; the control plane changes tempo, accent pattern and
//! click samples through a [`SchedulerHandle`] while it plays.
//!
//! Parameters live in an immutable [`ClickParams`] snapshot behind an
//! `ArcSwap`. The control plane publishes a whole new snapshot, the render
//! path loads the current one once per buffer, so a reader never observes a
//! half-written update and never waits for a writer. Replaced snapshots are
//! retired on the control side and freed there once the render path has let
//! go of them.

use super::output::SampleSource;
use super::samples::ClickSamples;
use crate::metronome::Tick;
use arc_swap::ArcSwap;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;

/// Render parameters shared between the control plane and the audio thread.
#[derive(Debug, Clone)]
pub struct ClickParams {
    pub samples_per_beat: f64,
    pub accent_pattern: Vec<bool>,
    pub samples: Arc<ClickSamples>,
}

impl ClickParams {
    /// Whether beat `index` is accented. Beats outside the pattern fall back
    /// to accenting the downbeat only.
    fn is_accent(&self, index: u32) -> bool {
        self.accent_pattern
            .get(index as usize)
            .copied()
            .unwrap_or(index == 0)
    }
}

/// Control-plane side of a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    params: Arc<ArcSwap<ClickParams>>,
    sample_rate: u32,
    retired: Arc<Mutex<Vec<Arc<ClickParams>>>>,
}

impl SchedulerHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn params(&self) -> Arc<ClickParams> {
        self.params.load_full()
    }

    /// Takes effect from the next beat on; the beat in progress keeps its length.
    pub fn set_tempo(&self, bpm: u32) {
        let samples_per_beat = super::samples_per_beat(self.sample_rate, bpm);
        self.publish(|current| ClickParams {
            samples_per_beat,
            ..current.clone()
        });
    }

    pub fn set_accent_pattern(&self, accent_pattern: Vec<bool>) {
        self.publish(|current| ClickParams {
            accent_pattern: accent_pattern.clone(),
            ..current.clone()
        });
    }

    pub fn set_samples(&self, samples: Arc<ClickSamples>) {
        self.publish(|current| ClickParams {
            samples: Arc::clone(&samples),
            ..current.clone()
        });
    }

    /// Swaps in a new snapshot and retires the old one.
    fn publish(&self, update: impl Fn(&ClickParams) -> ClickParams) {
        let previous = self.params.rcu(|current| update(current));
        let mut retired = self.retired.lock();
        retired.push(previous);
        // Anything still loaded by the render path has a second owner.
        retired.retain(|params| Arc::strong_count(params) > 1);
    }
}

/// Render-side beat clock.
pub struct BeatScheduler {
    params: Arc<ArcSwap<ClickParams>>,
    beats_per_measure: u32,
    ticks: Sender<Tick>,
    sample_index: u64,
    next_beat_sample: f64,
    beat: u32,
    beat_start: u64,
    beat_is_accent: bool,
}

impl BeatScheduler {
    /// Creates a scheduler whose first beat falls on the first rendered sample.
    ///
    /// # Arguments
    /// * `sample_rate` - Output sample rate in Hz
    /// * `params` - Initial render parameters
    /// * `beats_per_measure` - Beat index wraps at this count; fixed for the session
    /// * `ticks` - Receives one [`Tick`] per beat; a full channel drops the tick
    pub fn new(
        sample_rate: u32,
        params: ClickParams,
        beats_per_measure: u32,
        ticks: Sender<Tick>,
    ) -> (Self, SchedulerHandle) {
        let params = Arc::new(ArcSwap::from_pointee(params));
        let handle = SchedulerHandle {
            params: Arc::clone(&params),
            sample_rate,
            retired: Arc::new(Mutex::new(Vec::new())),
        };
        let scheduler = Self {
            params,
            beats_per_measure: beats_per_measure.max(1),
            ticks,
            sample_index: 0,
            next_beat_sample: 0.0,
            beat: 0,
            beat_start: 0,
            beat_is_accent: false,
        };
        (scheduler, handle)
    }

    /// Index of the beat that will start next.
    pub fn next_beat(&self) -> u32 {
        self.beat
    }

    fn next_sample(&mut self, params: &ClickParams) -> f32 {
        if self.sample_index as f64 >= self.next_beat_sample {
            let is_accent = params.is_accent(self.beat);
            let _ = self.ticks.try_send(Tick {
                beat: self.beat,
                is_accent,
            });
            self.beat_is_accent = is_accent;
            self.beat_start = self.sample_index;
            self.beat = (self.beat + 1) % self.beats_per_measure;
            self.next_beat_sample += params.samples_per_beat;
        }

        let click = if self.beat_is_accent {
            &params.samples.accent
        } else {
            &params.samples.normal
        };
        let offset = (self.sample_index - self.beat_start) as usize;
        self.sample_index += 1;
        click.get(offset).copied().unwrap_or(0.0)
    }
}

impl SampleSource for BeatScheduler {
    fn render(&mut self, out: &mut [f32]) {
        let params = self.params.load();
        for sample in out.iter_mut() {
            *sample = self.next_sample(&params);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn params(bpm: u32, pattern: &[bool]) -> ClickParams {
        ClickParams {
            samples_per_beat: crate::audio::samples_per_beat(RATE, bpm),
            accent_pattern: pattern.to_vec(),
            samples: Arc::new(ClickSamples {
                accent: vec![1.0, 1.0],
                normal: vec![0.5],
            }),
        }
    }

    fn render(scheduler: &mut BeatScheduler, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        scheduler.render(&mut out);
        out
    }

    #[test]
    fn emits_one_tick_per_beat_with_accents() {
        let (tx, rx) = crossbeam_channel::bounded(16);
        // 120 BPM at 1 kHz: a beat every 500 samples.
        let (mut scheduler, _handle) = BeatScheduler::new(RATE, params(120, &[true, false, false]), 3, tx);

        let out = render(&mut scheduler, 1600);
        let ticks: Vec<Tick> = rx.try_iter().collect();
        assert_eq!(
            ticks,
            vec![
                Tick { beat: 0, is_accent: true },
                Tick { beat: 1, is_accent: false },
                Tick { beat: 2, is_accent: false },
                Tick { beat: 0, is_accent: true },
            ]
        );

        assert_eq!(&out[0..3], &[1.0, 1.0, 0.0]);
        assert_eq!(&out[500..502], &[0.5, 0.0]);
        assert_eq!(out[1500], 1.0);
        assert!(out[2..500].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn missing_pattern_entries_accent_only_the_downbeat() {
        let (tx, rx) = crossbeam_channel::bounded(16);
        let (mut scheduler, _handle) = BeatScheduler::new(RATE, params(120, &[]), 2, tx);
        render(&mut scheduler, 1001);
        let accents: Vec<bool> = rx.try_iter().map(|t| t.is_accent).collect();
        assert_eq!(accents, vec![true, false, true]);
    }

    #[test]
    fn tempo_change_applies_from_the_next_beat() {
        let (tx, rx) = crossbeam_channel::bounded(16);
        let (mut scheduler, handle) = BeatScheduler::new(RATE, params(120, &[true]), 4, tx);

        render(&mut scheduler, 10);
        // Beat 1 is already due at sample 500; the one after it uses 60 BPM.
        handle.set_tempo(60);
        render(&mut scheduler, 490);
        assert_eq!(rx.try_iter().count(), 1);
        render(&mut scheduler, 1);
        assert_eq!(rx.try_iter().count(), 1);
        render(&mut scheduler, 999);
        assert_eq!(rx.try_iter().count(), 0);
        render(&mut scheduler, 1);
        assert_eq!(rx.try_iter().next(), Some(Tick { beat: 2, is_accent: false }));
    }

    #[test]
    fn pattern_and_samples_swap_while_running() {
        let (tx, rx) = crossbeam_channel::bounded(16);
        let (mut scheduler, handle) = BeatScheduler::new(RATE, params(120, &[true, false]), 2, tx);
        render(&mut scheduler, 1);
        handle.set_accent_pattern(vec![true, true]);
        handle.set_samples(Arc::new(ClickSamples {
            accent: vec![0.25],
            normal: vec![0.1],
        }));
        let out = render(&mut scheduler, 500);
        assert_eq!(out[499], 0.25);
        let accents: Vec<bool> = rx.try_iter().map(|t| t.is_accent).collect();
        assert_eq!(accents, vec![true, true]);
        assert_eq!(handle.params().accent_pattern, vec![true, true]);
    }

    #[test]
    fn replaced_snapshots_are_freed_off_the_render_path() {
        let (tx, _rx) = crossbeam_channel::bounded(16);
        let (scheduler, handle) = BeatScheduler::new(RATE, params(120, &[true]), 4, tx);

        // Stands in for the snapshot a render call has loaded.
        let in_render = scheduler.params.load_full();
        handle.set_samples(Arc::new(ClickSamples {
            accent: vec![0.25],
            normal: vec![0.1],
        }));
        assert_eq!(handle.retired.lock().len(), 1);
        assert_eq!(Arc::strong_count(&in_render), 2);

        drop(in_render);
        handle.set_tempo(60);
        assert!(handle.retired.lock().is_empty());
    }

    #[test]
    fn full_tick_channel_never_blocks_rendering() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let (mut scheduler, _handle) = BeatScheduler::new(RATE, params(240, &[true]), 4, tx);
        render(&mut scheduler, 5000);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(scheduler.next_beat(), 20 % 4);
    }
}
