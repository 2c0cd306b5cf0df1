//! # YIN Estimator
//!
//! Default [`PitchEstimator`]: the YIN difference function finds the period,
//! an FFT peak search around it refines the frequency, and the result is
//! mapped to the nearest MIDI note against a reference A4.
//!
//! ## Features
//! - RMS noise gate and clarity check to reject silence and noise
//! - First-dip period selection against octave errors
//! - Parabolic interpolation in both the lag and the frequency domain
//! - Stability score from consecutive frames agreeing on the note

use super::{PitchEstimator, PitchReading};
use crate::tuner::tuning;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// A dip deeper than this in the normalized difference is a clear tone.
const CLARITY_THRESHOLD: f32 = 0.1;
/// Lowest frequency reported.
const MIN_FREQUENCY: f32 = 20.0;
/// Spectral refinement may move the estimate by at most this ratio.
const MAX_REFINEMENT: f32 = 0.03;
/// Frames that must agree on a note for full stability.
const STABLE_FRAMES: u32 = 2;

pub struct YinEstimator {
    amplitude_threshold: f32,
    a4: f64,
    planner: FftPlanner<f32>,
    last_midi: Option<i32>,
    agreeing_frames: u32,
}

impl YinEstimator {
    /// # Arguments
    /// * `amplitude_threshold` - Frames with a lower RMS are treated as silence
    /// * `a4` - Reference frequency for note and cents
    pub fn new(amplitude_threshold: f32, a4: f64) -> Self {
        Self {
            amplitude_threshold,
            a4,
            planner: FftPlanner::new(),
            last_midi: None,
            agreeing_frames: 0,
        }
    }

    fn magnitudes(&mut self, signal: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = prepare_signal(signal)
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();
        let fft = self.planner.plan_fft_forward(buffer.len());
        fft.process(&mut buffer);
        buffer.iter().take(signal.len() / 2).map(|c| c.norm()).collect()
    }

    fn lost(&mut self) -> PitchReading {
        self.last_midi = None;
        self.agreeing_frames = 0;
        PitchReading::NONE
    }
}

impl Default for YinEstimator {
    fn default() -> Self {
        Self::new(0.01, 440.0)
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchReading {
        let Some((rough, dip)) = detect_pitch_yin(frame, sample_rate, self.amplitude_threshold) else {
            return self.lost();
        };
        let magnitudes = self.magnitudes(frame);
        let hz = refine_from_spectrum(&magnitudes, rough, sample_rate)
            .filter(|refined| ((refined - rough) / rough).abs() <= MAX_REFINEMENT)
            .unwrap_or(rough);

        let Some((midi, cents)) = tuning::nearest_midi(hz as f64, self.a4) else {
            return self.lost();
        };
        if !(0..=127).contains(&midi) {
            return self.lost();
        }

        if self.last_midi == Some(midi) {
            self.agreeing_frames = self.agreeing_frames.saturating_add(1);
        } else {
            self.last_midi = Some(midi);
            self.agreeing_frames = 1;
        }

        PitchReading {
            hz: hz as f64,
            midi,
            cents,
            confidence: (1.0 - dip as f64).clamp(0.0, 1.0),
            stability: (self.agreeing_frames as f64 / STABLE_FRAMES as f64).min(1.0),
        }
    }

    fn reset(&mut self) {
        self.last_midi = None;
        self.agreeing_frames = 0;
    }
}

/// YIN pitch detection.
///
/// # Arguments
/// * `signal` - Input audio frame
/// * `sample_rate` - Sample rate in Hz
/// * `amplitude_threshold` - Minimum RMS for pitch detection
///
/// # Returns
/// * `Some((frequency, dip))` - Detected frequency in Hz and the depth of the
///   normalized difference at the chosen period (0 is a perfect match)
/// * `None` - Silence, noise or no usable period
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32, amplitude_threshold: f32) -> Option<(f32, f32)> {
    let frame_size = signal.len();
    let half = frame_size / 2;
    if half < 3 {
        return None;
    }

    let rms = (signal.iter().map(|&s| s * s).sum::<f32>() / frame_size as f32).sqrt();
    if rms < amplitude_threshold {
        return None;
    }

    // Difference function
    let mut yin_buffer = vec![0.0f32; half];
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        yin_buffer[tau] = diff;
    }

    // Cumulative mean normalized difference
    let mut running_sum = 0.0;
    yin_buffer[0] = 1.0;
    for tau in 1..half {
        running_sum += yin_buffer[tau];
        if running_sum != 0.0 {
            yin_buffer[tau] *= tau as f32 / running_sum;
        } else {
            yin_buffer[tau] = 1.0;
        }
    }

    // First dip close to the global minimum, then down to its bottom.
    let min_val = yin_buffer.iter().skip(1).cloned().fold(f32::INFINITY, f32::min);
    let threshold = min_val + 0.05;
    let mut period = (2..half).find(|&tau| yin_buffer[tau] < threshold && yin_buffer[tau] < yin_buffer[tau - 1])?;
    while period + 1 < half && yin_buffer[period + 1] < yin_buffer[period] {
        period += 1;
    }

    let dip = yin_buffer[period];
    if dip > CLARITY_THRESHOLD || period + 1 >= half {
        return None;
    }

    let y1 = yin_buffer[period - 1];
    let y2 = yin_buffer[period];
    let y3 = yin_buffer[period + 1];
    let curvature = y1 - 2.0 * y2 + y3;
    let period_float = if curvature != 0.0 {
        period as f32 + (y1 - y3) / (2.0 * curvature)
    } else {
        period as f32
    };

    let frequency = sample_rate as f32 / period_float;
    if frequency.is_finite() && frequency > MIN_FREQUENCY {
        Some((frequency, dip.max(0.0)))
    } else {
        None
    }
}

/// Refines a frequency estimate using a magnitude spectrum.
///
/// Searches two bins either side of `rough_freq` for the peak and
/// interpolates it on a log scale.
///
/// # Returns
/// * `Some(refined_freq)` - Refined estimate, or `rough_freq` when the peak
///   cannot be interpolated
/// * `None` - For a non-positive estimate or an empty spectrum
pub fn refine_from_spectrum(spectrum_magnitudes: &[f32], rough_freq: f32, sample_rate: u32) -> Option<f32> {
    if rough_freq <= 0.0 || spectrum_magnitudes.len() < 3 {
        return None;
    }
    let buffer_size = spectrum_magnitudes.len() * 2;
    let last_bin = spectrum_magnitudes.len() - 1;
    let target_bin = (rough_freq * buffer_size as f32) / sample_rate as f32;
    let start_bin = (target_bin - 2.0).max(0.0) as usize;
    let end_bin = ((target_bin + 2.0).min(last_bin as f32) as usize).min(last_bin);
    if start_bin >= end_bin {
        return Some(rough_freq);
    }

    let peak_bin = spectrum_magnitudes[start_bin..=end_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(offset, _)| start_bin + offset)?;
    if peak_bin == 0 || peak_bin >= last_bin {
        return Some(rough_freq);
    }

    let y1 = spectrum_magnitudes[peak_bin - 1].ln();
    let y2 = spectrum_magnitudes[peak_bin].ln();
    let y3 = spectrum_magnitudes[peak_bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return Some(rough_freq);
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return Some(rough_freq);
    }
    let interpolated_bin = peak_bin as f32 + (y3 - y1) / (2.0 * denominator);
    let final_freq = (interpolated_bin * sample_rate as f32) / buffer_size as f32;

    if final_freq.is_finite() && final_freq > 0.0 {
        Some(final_freq)
    } else {
        Some(rough_freq)
    }
}

/// DC offset removal followed by a Hann window.
fn prepare_signal(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n < 2 {
        return signal.to_vec();
    }
    let avg = signal.iter().sum::<f32>() / n as f32;
    let n_minus_1 = (n - 1) as f32;
    signal
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let window = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
            (sample - avg) * window
        })
        .collect()
}
