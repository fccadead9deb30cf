use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use analysis_core::{AnalysisContext, ResultChunk};

use crate::audio_dsp;
use crate::service::{AnalysisService, insufficient_data};

const NAME: &str = "audio_quality";
const VERSION: &str = "1.0.0";

const FRAME_LEN: usize = 1024;

/// spec §4.2.2. Phase 1 (coarse): header-derived duration/sample_rate/
/// channels. Phase 2 (final): RMS loudness, an SNR approximation via
/// spectral-energy thresholding, high-frequency clarity, and a composite
/// quality band. Writes into `ctx.audio_summary`.
pub struct AudioQualityService;

impl AudioQualityService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AudioQualityService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisService for AudioQualityService {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn stream_analyze(
        &self,
        ctx: Arc<AnalysisContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ResultChunk> {
        let (tx, rx) = mpsc::channel(4);

        let Some(audio_bytes) = ctx.audio_bytes() else {
            let _ = tx.try_send(insufficient_data(NAME, VERSION, "no audio bytes provided"));
            return rx;
        };

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }

            let decoded = match tokio::task::spawn_blocking(move || {
                audio_dsp::decode_wav(&audio_bytes)
            })
            .await
            {
                Ok(Ok(decoded)) => decoded,
                Ok(Err(e)) => {
                    warn!(service = NAME, error = %e, "audio decode failed");
                    let _ = tx
                        .send(ResultChunk::terminal_error(NAME, VERSION, e.into_detail()))
                        .await;
                    return;
                }
                Err(e) => {
                    warn!(service = NAME, error = %e, "decode task panicked");
                    return;
                }
            };

            let coarse = Map::from_iter([
                ("duration_s".to_string(), json!(decoded.duration_s)),
                ("sample_rate".to_string(), json!(decoded.sample_rate)),
                ("channels".to_string(), json!(decoded.channels)),
            ]);
            ctx.merge_audio_summary(coarse.clone());
            if tx
                .send(
                    ResultChunk::coarse(NAME, VERSION)
                        .with_local(coarse)
                        .with_chunk_index(0),
                )
                .await
                .is_err()
            {
                return;
            }

            let loudness_dbfs = audio_dsp::rms_dbfs(&decoded.samples);
            let frames = audio_dsp::frames(&decoded.samples, FRAME_LEN);

            let mut snr_estimates = Vec::new();
            let mut clarity_ratios = Vec::new();
            for frame in &frames {
                let spectrum = audio_dsp::magnitude_spectrum(frame);
                let signal_energy: f32 = spectrum.iter().map(|m| m * m).sum();
                let noise_floor = spectrum
                    .iter()
                    .fold(f32::MAX, |acc, &m| acc.min(m * m))
                    .max(1e-9);
                snr_estimates.push(10.0 * (signal_energy.max(1e-9) / noise_floor).log10());
                clarity_ratios.push(audio_dsp::high_frequency_energy_ratio(
                    &spectrum,
                    decoded.sample_rate,
                    FRAME_LEN,
                    4000.0,
                ));
            }

            let snr_db = audio_dsp::mean(&snr_estimates);
            let clarity = audio_dsp::mean(&clarity_ratios);

            // Composite score: loudness in a healthy band, strong SNR, and
            // some (but not excessive) high-frequency energy all raise it.
            let loudness_score = (1.0 - ((loudness_dbfs + 18.0).abs() / 18.0)).clamp(0.0, 1.0);
            let snr_score = (snr_db / 40.0).clamp(0.0, 1.0);
            let clarity_score = (1.0 - (clarity - 0.15).abs() / 0.15).clamp(0.0, 1.0);
            let quality_score = 100.0 * (0.4 * loudness_score + 0.4 * snr_score + 0.2 * clarity_score);

            let band = if quality_score >= 70.0 {
                "good"
            } else if quality_score >= 40.0 {
                "fair"
            } else {
                "poor"
            };

            let final_fields = Map::from_iter([
                ("loudness_dbfs".to_string(), json!(loudness_dbfs)),
                ("snr_db".to_string(), json!(snr_db)),
                ("clarity".to_string(), json!(clarity)),
                ("quality_score".to_string(), json!(quality_score)),
                ("quality_band".to_string(), json!(band)),
            ]);
            ctx.merge_audio_summary(final_fields.clone());
            ctx.write_service_result(NAME, final_fields.clone());

            let _ = tx
                .send(
                    ResultChunk::terminal(NAME, VERSION)
                        .with_local(final_fields)
                        .with_chunk_index(1),
                )
                .await;
        });

        rx
    }
}
