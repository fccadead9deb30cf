use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scoring::BaselineProfile;

/// Request input to the pipeline (spec §6).
///
/// At least one of `transcript` or `audio_bytes` must be present; the
/// Runner rejects a request with neither at `PHASE_A_INPUT` (boundary B1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    /// Raw audio bytes, base64 in JSON transport, kept as owned bytes once
    /// decoded — never copied per-service (spec §5 resource model).
    #[serde(default, with = "audio_bytes_b64", skip_serializing_if = "Option::is_none")]
    pub audio_bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub meta: RequestMeta,
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.transcript.is_none() && self.audio_bytes.is_none() {
            return Err("neither transcript nor audio_bytes present".to_string());
        }
        Ok(())
    }
}

/// Optional session context carried alongside the request (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub duration_s: Option<f64>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
    #[serde(default)]
    pub baseline_profile: Option<BaselineProfile>,
    #[serde(default)]
    pub session_summary: Option<Map<String, Value>>,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Prior turn's credibility score, for EMA smoothing (spec §4.6 step 9).
    #[serde(default)]
    pub previous_credibility_score: Option<f64>,
}

mod audio_bytes_b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
