//! Shared, dependency-light signal processing used by `AudioQuality` and
//! `EnhancedAcoustic`. Pitch/formant estimation here are time- and
//! frequency-domain heuristics (autocorrelation + FFT peak-picking), not a
//! full LPC/cepstral pipeline — adequate for a heuristic quality/suspicion
//! signal, not lab-grade phonetic measurement.

use std::io::Cursor;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex32;

use analysis_core::{AnalysisError, Result};

pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_s: f64,
}

/// Decode WAV bytes into mono f32 samples in `[-1.0, 1.0]`.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AnalysisError::AudioDecode(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AnalysisError::AudioDecode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AnalysisError::AudioDecode(e.to_string()))?
                .into_iter()
                .map(|s| s as f32 / max)
                .collect()
        }
    };

    let mono: Vec<f32> = if channels <= 1 {
        samples
    } else {
        samples
            .chunks(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    let duration_s = mono.len() as f64 / spec.sample_rate as f64;

    Ok(DecodedAudio {
        samples: mono,
        sample_rate: spec.sample_rate,
        channels,
        duration_s,
    })
}

/// RMS of a sample slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// RMS expressed in dBFS (full scale = 1.0 amplitude).
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    let r = rms(samples).max(1e-9);
    20.0 * r.log10()
}

/// Split into fixed-size, non-overlapping frames (tail dropped if short).
pub fn frames(samples: &[f32], frame_len: usize) -> Vec<&[f32]> {
    samples.chunks_exact(frame_len).collect()
}

/// Time-domain autocorrelation pitch estimate for one frame, searching
/// periods corresponding to `min_hz..max_hz`. Returns `None` if no strong
/// periodic peak is found (unvoiced/silent frame).
pub fn estimate_pitch_hz(frame: &[f32], sample_rate: u32, min_hz: f32, max_hz: f32) -> Option<f32> {
    let min_lag = (sample_rate as f32 / max_hz).floor() as usize;
    let max_lag = (sample_rate as f32 / min_hz).ceil() as usize;
    if max_lag >= frame.len() || min_lag == 0 {
        return None;
    }

    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy < 1e-6 {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0f32;
    for lag in min_lag..=max_lag {
        let mut corr = 0.0f32;
        for i in 0..frame.len() - lag {
            corr += frame[i] * frame[i + lag];
        }
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best_corr / energy < 0.3 {
        return None;
    }
    Some(sample_rate as f32 / best_lag as f32)
}

/// Like [`estimate_pitch_hz`] but also returns the normalized autocorrelation
/// peak strength (0..1), used as a harmonics-to-noise proxy.
pub fn estimate_pitch_and_confidence(
    frame: &[f32],
    sample_rate: u32,
    min_hz: f32,
    max_hz: f32,
) -> Option<(f32, f32)> {
    let min_lag = (sample_rate as f32 / max_hz).floor() as usize;
    let max_lag = (sample_rate as f32 / min_hz).ceil() as usize;
    if max_lag >= frame.len() || min_lag == 0 {
        return None;
    }

    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy < 1e-6 {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0f32;
    for lag in min_lag..=max_lag {
        let mut corr = 0.0f32;
        for i in 0..frame.len() - lag {
            corr += frame[i] * frame[i + lag];
        }
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    let confidence = (best_corr / energy).clamp(0.0, 1.0);
    if best_lag == 0 || confidence < 0.3 {
        return None;
    }
    Some((sample_rate as f32 / best_lag as f32, confidence))
}

/// Magnitude spectrum of one frame via FFT (Hann-windowed).
pub fn magnitude_spectrum(frame: &[f32]) -> Vec<f32> {
    let n = frame.len();
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);

    let mut buffer: Vec<Complex32> = frame
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos();
            Complex32::new(s * w, 0.0)
        })
        .collect();

    fft.process(&mut buffer);
    buffer[..n / 2].iter().map(|c| c.norm()).collect()
}

/// Spectral centroid (Hz): the energy-weighted mean frequency.
pub fn spectral_centroid(magnitudes: &[f32], sample_rate: u32, frame_len: usize) -> f32 {
    let bin_hz = sample_rate as f32 / frame_len as f32;
    let total: f32 = magnitudes.iter().sum();
    if total < 1e-9 {
        return 0.0;
    }
    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f32 * bin_hz * m)
        .sum();
    weighted / total
}

/// Shannon entropy of the normalized magnitude spectrum (spectral flatness
/// proxy: higher entropy ~ noisier/less tonal).
pub fn spectral_entropy(magnitudes: &[f32]) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total < 1e-9 {
        return 0.0;
    }
    let max_entropy = (magnitudes.len() as f32).max(1.0).ln();
    if max_entropy <= 0.0 {
        return 0.0;
    }
    let entropy: f32 = magnitudes
        .iter()
        .map(|&m| {
            let p = m / total;
            if p > 1e-12 { -p * p.ln() } else { 0.0 }
        })
        .sum();
    entropy / max_entropy
}

/// Fraction of spectral energy above `cutoff_hz`.
pub fn high_frequency_energy_ratio(magnitudes: &[f32], sample_rate: u32, frame_len: usize, cutoff_hz: f32) -> f32 {
    let bin_hz = sample_rate as f32 / frame_len as f32;
    let cutoff_bin = (cutoff_hz / bin_hz).round() as usize;
    let total: f32 = magnitudes.iter().map(|m| m * m).sum();
    if total < 1e-9 {
        return 0.0;
    }
    let high: f32 = magnitudes
        .iter()
        .skip(cutoff_bin.min(magnitudes.len()))
        .map(|m| m * m)
        .sum();
    high / total
}

/// Top-3 spectral peaks below 4 kHz as a rough formant (F1/F2/F3) proxy.
pub fn formant_proxy(magnitudes: &[f32], sample_rate: u32, frame_len: usize) -> Vec<f32> {
    let bin_hz = sample_rate as f32 / frame_len as f32;
    let limit_bin = ((4000.0 / bin_hz) as usize).min(magnitudes.len());

    let mut peaks: Vec<(usize, f32)> = (1..limit_bin.saturating_sub(1))
        .filter(|&i| magnitudes[i] > magnitudes[i - 1] && magnitudes[i] > magnitudes[i + 1])
        .map(|i| (i, magnitudes[i]))
        .collect();
    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let mut formants: Vec<f32> = peaks.iter().take(3).map(|(i, _)| *i as f32 * bin_hz).collect();
    formants.sort_by(|a, b| a.partial_cmp(b).unwrap());
    formants
}

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

pub fn std_dev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f32>() / values.len() as f32).sqrt()
}

/// Relative (percent) cycle-to-cycle variation, used for both jitter
/// (period) and shimmer (amplitude) depending on what's passed in.
pub fn relative_perturbation(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f32> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let avg_diff = mean(&diffs);
    let avg_value = mean(values).max(1e-6);
    100.0 * avg_diff / avg_value
}
