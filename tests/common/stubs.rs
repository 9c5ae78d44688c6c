//! Scripted capability implementations.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use trackprobe::probe::{
    BandFilter, ClipRenderer, ClipSpec, LevelProbe, LevelReading, MediaInfo, MediaInspector,
    ProbeError,
};

/// Describes what the synthetic probe "hears" in the fake track.
#[derive(Debug, Clone)]
pub struct SyntheticTrack {
    pub duration_secs: f64,
    /// RMS level per band, keyed by the band's low edge in Hz.
    pub band_rms_db: Vec<(u32, f64)>,
    /// Band probes at or past this time hear near-silence instead.
    pub quiet_after_secs: Option<f64>,
    /// Whole-file peak/RMS levels.
    pub full_peak_db: f64,
    pub full_rms_db: f64,
    /// Integrated loudness; None makes the dedicated pass fail.
    pub integrated_lufs: Option<f64>,
    /// Transient bursts as (start, end, peak dB) intervals.
    pub peaks: Vec<(f64, f64, f64)>,
    /// When set, every measurement errors out.
    pub fail_all: bool,
}

impl SyntheticTrack {
    /// A quiet 180s track with one clean 0.8-amplitude hit at t=5.0.
    pub fn with_single_kick() -> Self {
        Self {
            duration_secs: 180.0,
            band_rms_db: vec![
                (20, -12.0),
                (60, -9.0),
                (250, -20.0),
                (500, -17.0),
                (2000, -24.0),
                (4000, -28.0),
            ],
            quiet_after_secs: None,
            full_peak_db: -1.9,
            full_rms_db: -12.0,
            integrated_lufs: Some(-13.0),
            // 20*log10(0.8) ~ -1.94 dB
            peaks: vec![(4.95, 5.05, -1.9382)],
            fail_all: false,
        }
    }

    /// A track whose probes all fail.
    pub fn unmeasurable() -> Self {
        Self {
            duration_secs: 180.0,
            band_rms_db: vec![],
            quiet_after_secs: None,
            full_peak_db: 0.0,
            full_rms_db: 0.0,
            integrated_lufs: None,
            peaks: vec![],
            fail_all: true,
        }
    }
}

/// Level probe scripted by a [`SyntheticTrack`].
pub struct SyntheticProbe {
    track: SyntheticTrack,
    pub calls: AtomicUsize,
}

impl SyntheticProbe {
    pub fn new(track: SyntheticTrack) -> Self {
        Self {
            track,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LevelProbe for SyntheticProbe {
    async fn measure(
        &self,
        _path: &Path,
        start_secs: f64,
        duration_secs: f64,
        band: Option<BandFilter>,
    ) -> Result<Vec<LevelReading>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.track.fail_all {
            return Err(ProbeError::ToolFailed("scripted failure".to_string()));
        }

        if let Some(band) = band {
            if let Some(quiet_after) = self.track.quiet_after_secs {
                if start_secs >= quiet_after {
                    return Ok(vec![LevelReading {
                        rms_db: Some(-55.0),
                        ..Default::default()
                    }]);
                }
            }
            return match self
                .track
                .band_rms_db
                .iter()
                .find(|(low_hz, _)| *low_hz == band.low_hz)
            {
                Some((_, rms_db)) => Ok(vec![LevelReading {
                    rms_db: Some(*rms_db),
                    ..Default::default()
                }]),
                None => Err(ProbeError::NoReadings),
            };
        }

        // Unfiltered: either the whole-file loudness pass or a short
        // transient window.
        if duration_secs >= self.track.duration_secs * 0.9 {
            return Ok(vec![LevelReading {
                peak_db: Some(self.track.full_peak_db),
                rms_db: Some(self.track.full_rms_db),
                mean_db: None,
            }]);
        }

        let window_end = start_secs + duration_secs;
        let peak_db = self
            .track
            .peaks
            .iter()
            .filter(|(burst_start, burst_end, _)| {
                window_end > *burst_start && start_secs < *burst_end
            })
            .map(|(_, _, peak_db)| *peak_db)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        match peak_db {
            Some(peak_db) => Ok(vec![LevelReading {
                peak_db: Some(peak_db),
                ..Default::default()
            }]),
            // Silence between the bursts
            None => Err(ProbeError::NoReadings),
        }
    }

    async fn measure_integrated_loudness(&self, _path: &Path) -> Result<f64, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.track.fail_all {
            return Err(ProbeError::ToolFailed("scripted failure".to_string()));
        }
        self.track.integrated_lufs.ok_or(ProbeError::NoReadings)
    }
}

/// Inspector that reports the synthetic source for audio inputs and a
/// fixed PCM description for rendered .wav outputs.
pub struct StubInspector {
    source_duration_secs: f64,
}

impl StubInspector {
    pub fn new(source_duration_secs: f64) -> Self {
        Self {
            source_duration_secs,
        }
    }
}

#[async_trait]
impl MediaInspector for StubInspector {
    async fn inspect(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let is_rendered_clip = path.extension().and_then(|e| e.to_str()) == Some("wav");
        if is_rendered_clip {
            Ok(MediaInfo {
                duration_secs: 0.8,
                sample_rate: Some(44_100),
                bitrate_kbps: Some(1411),
                channels: Some(2),
                format: "wav".to_string(),
                codec: "pcm_s16le".to_string(),
            })
        } else {
            Ok(MediaInfo {
                duration_secs: self.source_duration_secs,
                sample_rate: Some(44_100),
                bitrate_kbps: Some(320),
                channels: Some(2),
                format: "mp3".to_string(),
                codec: "mp3".to_string(),
            })
        }
    }
}

/// Renderer that writes a canned payload and records every request.
pub struct StubRenderer {
    payload: Vec<u8>,
    pub rendered: Mutex<Vec<(PathBuf, ClipSpec)>>,
}

impl StubRenderer {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            rendered: Mutex::new(Vec::new()),
        }
    }

    /// A RIFF/WAVE payload of the size a real 0.8s stereo PCM clip has.
    pub fn valid_wav_payload() -> Vec<u8> {
        let total_len = 141_164; // 44-byte header + 0.8s * 44100 * 2ch * 2 bytes
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
}

#[async_trait]
impl ClipRenderer for StubRenderer {
    async fn render(
        &self,
        _input: &Path,
        spec: &ClipSpec,
        output: &Path,
    ) -> Result<(), ProbeError> {
        self.rendered
            .lock()
            .unwrap()
            .push((output.to_path_buf(), spec.clone()));
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, &self.payload).await?;
        Ok(())
    }
}
