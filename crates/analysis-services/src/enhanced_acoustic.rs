use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use analysis_core::{AnalysisContext, ResultChunk};

use crate::audio_dsp;
use crate::service::AnalysisService;

const NAME: &str = "enhanced_acoustic";
const VERSION: &str = "1.0.0";

const FRAME_LEN: usize = 1024;
const MIN_AUDIO_BYTES: usize = 1000;
const MIN_DURATION_S: f64 = 0.5;
const PITCH_MIN_HZ: f32 = 75.0;
const PITCH_MAX_HZ: f32 = 400.0;

/// spec §4.2.4. Extracts pitch, jitter/shimmer, formants, HNR, intensity,
/// pauses, and spectral descriptors from raw audio. Degrades to
/// `{analysis_quality:"poor", insufficient_voiced:true}` when the input is
/// too short or too sparsely voiced to extract from (spec boundary B3), and
/// to `{analysis_quality:"failed", insufficient_voiced:true}` only when
/// decoding or extraction itself raises (spec §4.2.4 gate).
pub struct EnhancedAcousticService;

impl EnhancedAcousticService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnhancedAcousticService {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of feature extraction, distinguishing an input that was simply
/// too short/sparse to extract from (`Poor`) from a genuine decode or
/// extraction failure (`Failed`) — spec boundary B3 requires the two be
/// reported differently.
enum Extraction {
    Ok(Map<String, serde_json::Value>),
    Poor,
    Failed,
}

fn degraded(quality: &'static str) -> Map<String, serde_json::Value> {
    Map::from_iter([
        ("analysis_quality".to_string(), json!(quality)),
        ("insufficient_voiced".to_string(), json!(true)),
    ])
}

#[async_trait]
impl AnalysisService for EnhancedAcousticService {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk> {
        let (tx, rx) = mpsc::channel(2);

        let Some(audio_bytes) = ctx.audio_bytes() else {
            ctx.write_service_result(NAME, degraded("poor"));
            let _ = tx.try_send(ResultChunk::terminal(NAME, VERSION).with_local(degraded("poor")));
            return rx;
        };

        if audio_bytes.len() < MIN_AUDIO_BYTES {
            ctx.write_service_result(NAME, degraded("poor"));
            let _ = tx.try_send(ResultChunk::terminal(NAME, VERSION).with_local(degraded("poor")));
            return rx;
        }

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }

            let result = tokio::task::spawn_blocking(move || extract_features(&audio_bytes)).await;

            let local = match result {
                Ok(Extraction::Ok(fields)) => fields,
                Ok(Extraction::Poor) => degraded("poor"),
                Ok(Extraction::Failed) => degraded("failed"),
                Err(e) => {
                    warn!(service = NAME, error = %e, "feature extraction panicked");
                    degraded("failed")
                }
            };

            ctx.set_enhanced_acoustic_metrics(local.clone());
            ctx.write_service_result(NAME, local.clone());
            let _ = tx.send(ResultChunk::terminal(NAME, VERSION).with_local(local)).await;
        });

        rx
    }
}

fn extract_features(bytes: &[u8]) -> Extraction {
    let decoded = match audio_dsp::decode_wav(bytes) {
        Ok(decoded) => decoded,
        Err(_) => return Extraction::Failed,
    };
    if decoded.duration_s < MIN_DURATION_S {
        return Extraction::Poor;
    }

    let frames = audio_dsp::frames(&decoded.samples, FRAME_LEN);
    if frames.is_empty() {
        return Extraction::Poor;
    }

    let mut pitches = Vec::new();
    let mut hnr_db = Vec::new();
    let mut intensities = Vec::new();
    let mut centroids = Vec::new();
    let mut entropies = Vec::new();
    let mut formant_sets = Vec::new();

    for frame in &frames {
        let rms = audio_dsp::rms(frame);
        intensities.push(rms);

        if let Some((hz, confidence)) =
            audio_dsp::estimate_pitch_and_confidence(frame, decoded.sample_rate, PITCH_MIN_HZ, PITCH_MAX_HZ)
        {
            pitches.push(hz);
            let hnr = 10.0 * (confidence / (1.0 - confidence).max(1e-3)).log10();
            hnr_db.push(hnr);
        }

        let spectrum = audio_dsp::magnitude_spectrum(frame);
        centroids.push(audio_dsp::spectral_centroid(&spectrum, decoded.sample_rate, FRAME_LEN));
        entropies.push(audio_dsp::spectral_entropy(&spectrum));
        let formants = audio_dsp::formant_proxy(&spectrum, decoded.sample_rate, FRAME_LEN);
        if formants.len() == 3 {
            formant_sets.push(formants);
        }
    }

    let voiced_fraction = pitches.len() as f32 / frames.len() as f32;
    if voiced_fraction < 0.05 {
        return Extraction::Poor;
    }

    let mean_intensity = audio_dsp::mean(&intensities);
    let pause_threshold = mean_intensity * 0.40;
    let mut pause_count = 0u32;
    let mut pause_total_s = 0.0f64;
    let mut in_pause = false;
    let frame_duration_s = FRAME_LEN as f64 / decoded.sample_rate as f64;
    for &intensity in &intensities {
        if intensity < pause_threshold {
            if !in_pause {
                pause_count += 1;
                in_pause = true;
            }
            pause_total_s += frame_duration_s;
        } else {
            in_pause = false;
        }
    }
    let pause_rate = pause_count as f64 / decoded.duration_s.max(1e-6);

    let pitch_range = pitches
        .iter()
        .cloned()
        .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p), hi.max(p)));

    let formant_means: Vec<f32> = if formant_sets.is_empty() {
        Vec::new()
    } else {
        (0..3)
            .map(|i| audio_dsp::mean(&formant_sets.iter().map(|f| f[i]).collect::<Vec<_>>()))
            .collect()
    };
    let formant_dispersion = if formant_means.len() == 3 {
        ((formant_means[1] - formant_means[0]) + (formant_means[2] - formant_means[1])) / 2.0
    } else {
        0.0
    };

    let extractable = [
        !pitches.is_empty(),
        !hnr_db.is_empty(),
        !formant_means.is_empty(),
        voiced_fraction > 0.3,
    ]
    .iter()
    .filter(|ok| **ok)
    .count();
    let analysis_quality = match extractable {
        4 => "good",
        3 | 2 => "fair",
        _ => "poor",
    };

    let mut fields = Map::new();
    fields.insert("analysis_quality".to_string(), json!(analysis_quality));
    fields.insert("insufficient_voiced".to_string(), json!(false));
    fields.insert("pitch_mean".to_string(), json!(audio_dsp::mean(&pitches)));
    fields.insert("pitch_std".to_string(), json!(audio_dsp::std_dev(&pitches)));
    fields.insert(
        "pitch_range".to_string(),
        json!(if pitches.is_empty() { 0.0 } else { pitch_range.1 - pitch_range.0 }),
    );
    fields.insert("pitch_jitter".to_string(), json!(audio_dsp::relative_perturbation(&pitches)));
    fields.insert("pitch_shimmer".to_string(), json!(audio_dsp::relative_perturbation(&intensities)));
    fields.insert("vocal_tremor".to_string(), json!(audio_dsp::std_dev(&pitches) / audio_dsp::mean(&pitches).max(1.0)));
    if formant_means.len() == 3 {
        fields.insert("formant_f1".to_string(), json!(formant_means[0]));
        fields.insert("formant_f2".to_string(), json!(formant_means[1]));
        fields.insert("formant_f3".to_string(), json!(formant_means[2]));
    }
    fields.insert("formant_dispersion".to_string(), json!(formant_dispersion));
    fields.insert("hnr_mean".to_string(), json!(audio_dsp::mean(&hnr_db)));
    fields.insert("hnr_std".to_string(), json!(audio_dsp::std_dev(&hnr_db)));
    fields.insert("intensity_mean".to_string(), json!(mean_intensity));
    fields.insert("intensity_std".to_string(), json!(audio_dsp::std_dev(&intensities)));
    fields.insert("pause_count".to_string(), json!(pause_count));
    fields.insert("pause_total_s".to_string(), json!(pause_total_s));
    fields.insert("pause_rate".to_string(), json!(pause_rate));
    fields.insert("spectral_centroid".to_string(), json!(audio_dsp::mean(&centroids)));
    fields.insert("spectral_entropy".to_string(), json!(audio_dsp::mean(&entropies)));

    Extraction::Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_tone_wav(freq: f32, sample_rate: u32, duration_s: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let n = (sample_rate as f32 * duration_s) as usize;
            for i in 0..n {
                let t = i as f32 / sample_rate as f32;
                let sample = (t * freq * std::f32::consts::TAU).sin();
                writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn short_audio_degrades_to_poor() {
        let bytes = synth_tone_wav(150.0, 16_000, 0.1);
        assert!(matches!(extract_features(&bytes), Extraction::Poor));
    }

    #[test]
    fn undecodable_bytes_degrade_to_failed() {
        let bytes = vec![0u8; 4];
        assert!(matches!(extract_features(&bytes), Extraction::Failed));
    }

    #[test]
    fn sustained_tone_extracts_pitch_near_fundamental() {
        let bytes = synth_tone_wav(150.0, 16_000, 2.0);
        let fields = match extract_features(&bytes) {
            Extraction::Ok(fields) => fields,
            _ => panic!("features should extract"),
        };
        let pitch_mean = fields["pitch_mean"].as_f64().unwrap();
        assert!((pitch_mean - 150.0).abs() < 15.0, "pitch_mean was {pitch_mean}");
    }
}
