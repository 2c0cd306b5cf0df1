//! Click sample loading.
//!
//! Each [`BeatSound`] has an accent and a normal click. With a sample
//! directory configured they are read from `<dir>/<name>.wav`, mixed down to
//! mono and resampled to the device rate; otherwise a short enveloped sine
//! burst is synthesized.

use crate::error::AudioError;
use crate::metronome::BeatSound;
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

/// Accent and normal click for one timbre at one sample rate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClickSamples {
    pub accent: Vec<f32>,
    pub normal: Vec<f32>,
}

/// Where click samples come from.
#[derive(Debug, Clone, Default)]
pub struct SampleLibrary {
    dir: Option<PathBuf>,
}

impl SampleLibrary {
    /// Clicks are synthesized.
    pub fn synthesized() -> Self {
        Self { dir: None }
    }

    /// Clicks are read from WAV files in `dir`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Loads both clicks of `sound` at `sample_rate`.
    pub fn load(&self, sound: BeatSound, sample_rate: u32) -> Result<ClickSamples, AudioError> {
        match &self.dir {
            Some(dir) => Ok(ClickSamples {
                accent: load_wav(&dir.join(format!("{}.wav", sound.accent_file_name())), sample_rate)?,
                normal: load_wav(&dir.join(format!("{}.wav", sound.normal_file_name())), sample_rate)?,
            }),
            None => Ok(synthesize(sound, sample_rate)),
        }
    }
}

/// Synthesized clicks for `sound`. The accent is a fifth higher and louder.
pub fn synthesize(sound: BeatSound, sample_rate: u32) -> ClickSamples {
    let (frequency, length, decay) = sound.synth_voice();
    ClickSamples {
        accent: sine_burst(frequency * 1.5, 0.8, length, decay, sample_rate),
        normal: sine_burst(frequency, 0.5, length, decay, sample_rate),
    }
}

fn sine_burst(frequency: f32, amplitude: f32, length: f32, decay: f32, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let count = (rate * length) as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / rate;
            amplitude * (TAU * frequency * t).sin() * (-t * decay).exp()
        })
        .collect()
}

/// Reads a WAV file as mono `f32` at `target_rate`.
pub fn load_wav(path: &Path, target_rate: u32) -> Result<Vec<f32>, AudioError> {
    if !path.exists() {
        return Err(AudioError::SampleNotFound(path.to_path_buf()));
    }
    let unreadable = |reason: String| AudioError::SampleUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|e| unreadable(e.to_string()))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| unreadable(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| unreadable(e.to_string()))?
        }
    };
    if interleaved.is_empty() {
        return Err(unreadable("file contains no samples".to_string()));
    }

    let mono = mix_to_mono(&interleaved, spec.channels as usize);
    Ok(resample_linear(&mono, spec.sample_rate, target_rate))
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler. Rates within 1 Hz are left alone.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || from_rate.abs_diff(to_rate) < 1 {
        return input.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let count = (input.len() as f64 * ratio) as usize;
    let last = input.len() - 1;
    (0..count)
        .map(|i| {
            let position = i as f64 / ratio;
            let low = (position as usize).min(last);
            let high = (low + 1).min(last);
            let frac = (position - low as f64) as f32;
            input[low] * (1.0 - frac) + input[high] * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn synthesized_clicks_decay_and_accent_is_louder() {
        let clicks = synthesize(BeatSound::Classic, 48_000);
        assert!((2159..=2160).contains(&clicks.normal.len()));
        let peak = |v: &[f32]| v.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak(&clicks.accent) > peak(&clicks.normal));
        let tail = &clicks.normal[clicks.normal.len() - 10..];
        assert!(peak(tail) < 0.1);
    }

    #[test]
    fn stereo_wav_is_mixed_and_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("click.wav");
        write_wav(&path, 2, 22_050, &[16384, 0, 16384, 0, -16384, 0, -16384, 0]);

        let samples = load_wav(&path, 44_100).unwrap();
        assert_eq!(samples.len(), 8);
        assert_relative_eq!(samples[0], 0.25, epsilon = 1e-4);
        assert_relative_eq!(samples[2], 0.25, epsilon = 1e-4);
        // Halfway between the second and third source frames.
        assert_relative_eq!(samples[3], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn library_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = SampleLibrary::from_dir(dir.path());
        match library.load(BeatSound::Seiko, 44_100) {
            Err(AudioError::SampleNotFound(path)) => {
                assert!(path.ends_with("seiko_accent.wav"));
            }
            other => panic!("expected SampleNotFound, got {:?}", other),
        }
    }

    #[test]
    fn resampling_keeps_matching_rates() {
        let input = [0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 44_100, 44_100), input.to_vec());
        assert_eq!(resample_linear(&input, 44_100, 22_050).len(), 1);
    }
}
