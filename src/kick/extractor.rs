//! Kick sample extraction.
//!
//! Cuts a fixed-length clip around the selected candidate, isolates the
//! kick band and writes a PCM one-shot. Unlike the analysis side, this is
//! the one place that fails loudly: an unusable artifact must never be
//! reported as success.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::models::KickCandidate;
use crate::probe::{BandFilter, ClipRenderer, ClipSpec, MediaInspector, ProbeError};

/// Clip geometry: 0.8 s starting 20 ms before the hit.
const PRE_ROLL_SECS: f64 = 0.02;
const CLIP_DURATION_SECS: f64 = 0.8;
/// Kick band isolation.
const KICK_BAND: BandFilter = BandFilter::new(20, 250);
const GAIN: f64 = 1.8;
const FADE_IN_SECS: f64 = 0.005;
const FADE_OUT_SECS: f64 = 0.08;
const OUTPUT_SAMPLE_RATE: u32 = 44_100;
const OUTPUT_CHANNELS: u32 = 2;

/// Validation floor for the written sample.
const MIN_OUTPUT_BYTES: u64 = 50 * 1024;
const MIN_OUTPUT_DURATION_SECS: f64 = 0.1;

/// Errors from kick extraction. All of them mean the artifact is not
/// usable; none are retried here.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("clip rendering failed: {0}")]
    Render(#[source] ProbeError),

    #[error("extracted sample failed validation: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cuts, filters and validates one kick sample.
pub struct KickExtractor {
    renderer: Arc<dyn ClipRenderer>,
    inspector: Arc<dyn MediaInspector>,
}

impl KickExtractor {
    pub fn new(renderer: Arc<dyn ClipRenderer>, inspector: Arc<dyn MediaInspector>) -> Self {
        Self {
            renderer,
            inspector,
        }
    }

    /// Render the clip for `candidate` into `output` and verify the
    /// result is playable audio.
    pub async fn extract(
        &self,
        input: &Path,
        candidate: &KickCandidate,
        output: &Path,
    ) -> Result<(), ExtractError> {
        let spec = ClipSpec {
            start_secs: (candidate.time_secs - PRE_ROLL_SECS).max(0.0),
            duration_secs: CLIP_DURATION_SECS,
            band: Some(KICK_BAND),
            gain: GAIN,
            fade_in_secs: FADE_IN_SECS,
            fade_out_secs: FADE_OUT_SECS,
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
        };

        self.renderer
            .render(input, &spec, output)
            .await
            .map_err(ExtractError::Render)?;

        self.validate(output).await.inspect_err(|e| {
            warn!(output = %output.display(), error = %e, "extracted sample rejected");
        })?;

        debug!(
            time_secs = candidate.time_secs,
            output = %output.display(),
            "kick sample written"
        );
        Ok(())
    }

    /// Re-probe the written file: it must look like audio, decode with a
    /// positive bitrate and carry more than a sliver of sound.
    async fn validate(&self, output: &Path) -> Result<(), ExtractError> {
        let bytes = tokio::fs::read(output).await?;

        if (bytes.len() as u64) < MIN_OUTPUT_BYTES {
            return Err(ExtractError::InvalidOutput(format!(
                "file too small: {} bytes (minimum {})",
                bytes.len(),
                MIN_OUTPUT_BYTES
            )));
        }

        match infer::get(&bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Audio => {}
            Some(kind) => {
                return Err(ExtractError::InvalidOutput(format!(
                    "unexpected file type: {}",
                    kind.mime_type()
                )));
            }
            None => {
                return Err(ExtractError::InvalidOutput(
                    "unrecognized file content".to_string(),
                ));
            }
        }

        let info = self
            .inspector
            .inspect(output)
            .await
            .map_err(|e| ExtractError::InvalidOutput(format!("not decodable as audio: {}", e)))?;

        if info.duration_secs <= MIN_OUTPUT_DURATION_SECS {
            return Err(ExtractError::InvalidOutput(format!(
                "duration too short: {:.3}s",
                info.duration_secs
            )));
        }
        if info.bitrate_kbps.unwrap_or(0) == 0 {
            return Err(ExtractError::InvalidOutput("no bitrate reported".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::MediaInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Renderer stub that writes a canned buffer.
    struct CannedRenderer {
        payload: Vec<u8>,
        last_spec: Mutex<Option<ClipSpec>>,
    }

    #[async_trait]
    impl ClipRenderer for CannedRenderer {
        async fn render(
            &self,
            _input: &Path,
            spec: &ClipSpec,
            output: &Path,
        ) -> Result<(), ProbeError> {
            *self.last_spec.lock().unwrap() = Some(spec.clone());
            tokio::fs::write(output, &self.payload).await?;
            Ok(())
        }
    }

    struct CannedInspector {
        info: MediaInfo,
    }

    #[async_trait]
    impl MediaInspector for CannedInspector {
        async fn inspect(&self, _path: &Path) -> Result<MediaInfo, ProbeError> {
            Ok(self.info.clone())
        }
    }

    fn wav_payload(total_len: usize) -> Vec<u8> {
        // Minimal RIFF/WAVE header followed by zero samples, enough for
        // the magic-byte sniff to call it audio.
        let mut bytes = Vec::with_capacity(total_len);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&((total_len - 8) as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&((total_len - 44) as u32).to_le_bytes());
        bytes.resize(total_len, 0);
        bytes
    }

    fn valid_info() -> MediaInfo {
        MediaInfo {
            duration_secs: 0.8,
            sample_rate: Some(44_100),
            bitrate_kbps: Some(1411),
            channels: Some(2),
            format: "wav".to_string(),
            codec: "pcm_s16le".to_string(),
        }
    }

    fn candidate_at(time_secs: f64) -> KickCandidate {
        KickCandidate {
            time_secs,
            amplitude: 0.8,
            before_amplitude: 0.1,
            attack_speed_db: 12.0,
            quality: 80.0,
        }
    }

    #[tokio::test]
    async fn valid_clip_passes_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("kick.wav");
        let renderer = Arc::new(CannedRenderer {
            payload: wav_payload(141_120),
            last_spec: Mutex::new(None),
        });
        let extractor = KickExtractor::new(
            renderer.clone(),
            Arc::new(CannedInspector { info: valid_info() }),
        );

        extractor
            .extract(Path::new("/track.mp3"), &candidate_at(5.0), &output)
            .await
            .unwrap();

        let spec = renderer.last_spec.lock().unwrap().clone().unwrap();
        assert!((spec.start_secs - 4.98).abs() < 1e-9);
        assert_eq!(spec.duration_secs, 0.8);
        assert_eq!(spec.band, Some(BandFilter::new(20, 250)));
        assert_eq!(spec.gain, 1.8);
    }

    #[tokio::test]
    async fn start_is_floored_at_zero_for_early_hits() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("kick.wav");
        let renderer = Arc::new(CannedRenderer {
            payload: wav_payload(141_120),
            last_spec: Mutex::new(None),
        });
        let extractor = KickExtractor::new(
            renderer.clone(),
            Arc::new(CannedInspector { info: valid_info() }),
        );

        extractor
            .extract(Path::new("/track.mp3"), &candidate_at(0.005), &output)
            .await
            .unwrap();
        let spec = renderer.last_spec.lock().unwrap().clone().unwrap();
        assert_eq!(spec.start_secs, 0.0);
    }

    #[tokio::test]
    async fn undersized_output_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("kick.wav");
        let extractor = KickExtractor::new(
            Arc::new(CannedRenderer {
                payload: wav_payload(1024),
                last_spec: Mutex::new(None),
            }),
            Arc::new(CannedInspector { info: valid_info() }),
        );

        let err = extractor
            .extract(Path::new("/track.mp3"), &candidate_at(5.0), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn non_audio_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("kick.wav");
        let extractor = KickExtractor::new(
            Arc::new(CannedRenderer {
                payload: vec![0u8; 120_000],
                last_spec: Mutex::new(None),
            }),
            Arc::new(CannedInspector { info: valid_info() }),
        );

        let err = extractor
            .extract(Path::new("/track.mp3"), &candidate_at(5.0), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn zero_duration_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("kick.wav");
        let mut info = valid_info();
        info.duration_secs = 0.0;
        let extractor = KickExtractor::new(
            Arc::new(CannedRenderer {
                payload: wav_payload(141_120),
                last_spec: Mutex::new(None),
            }),
            Arc::new(CannedInspector { info }),
        );

        let err = extractor
            .extract(Path::new("/track.mp3"), &candidate_at(5.0), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidOutput(_)));
    }
}
