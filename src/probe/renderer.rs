//! Clip rendering using ffmpeg.
//!
//! The one write-side capability of the engine: cut a window out of a
//! track, run it through an isolation/gain/fade chain and encode it as PCM.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{BandFilter, ProbeError};

/// Parameters for one rendered clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    /// Clip start within the source file, seconds.
    pub start_secs: f64,
    /// Clip length, seconds.
    pub duration_secs: f64,
    /// Optional band isolation applied before gain.
    pub band: Option<BandFilter>,
    /// Linear gain multiplier.
    pub gain: f64,
    /// Fade-in length, seconds.
    pub fade_in_secs: f64,
    /// Fade-out length, seconds. The fade starts so it ends exactly at the
    /// clip boundary.
    pub fade_out_secs: f64,
    /// Output sample rate, Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u32,
}

/// The clip-rendering capability.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    async fn render(
        &self,
        input: &Path,
        spec: &ClipSpec,
        output: &Path,
    ) -> Result<(), ProbeError>;
}

/// Renderer backed by the ffmpeg command-line tool.
pub struct FfmpegClipRenderer {
    ffmpeg_bin: String,
    timeout: Duration,
}

impl FfmpegClipRenderer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            timeout,
        }
    }
}

impl Default for FfmpegClipRenderer {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl ClipRenderer for FfmpegClipRenderer {
    async fn render(
        &self,
        input: &Path,
        spec: &ClipSpec,
        output: &Path,
    ) -> Result<(), ProbeError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut command = Command::new(&self.ffmpeg_bin);
        command
            .args(["-hide_banner", "-nostats"])
            .args(["-ss", &format!("{:.3}", spec.start_secs.max(0.0))])
            .args(["-t", &format!("{:.3}", spec.duration_secs)])
            .arg("-i")
            .arg(input)
            .args(["-af", &clip_filter(spec)])
            .args(["-ar", &spec.sample_rate.to_string()])
            .args(["-ac", &spec.channels.to_string()])
            .args(["-c:a", "pcm_s16le", "-vn", "-y"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ProbeError::ToolFailed(stderr.to_string()));
        }
        Ok(())
    }
}

/// Filter chain for a rendered clip: band isolation, gain, then fades
/// anchored to the clip boundaries.
fn clip_filter(spec: &ClipSpec) -> String {
    let mut stages = Vec::new();
    if let Some(band) = spec.band {
        stages.push(format!("highpass=f={}", band.low_hz));
        stages.push(format!("lowpass=f={}", band.high_hz));
    }
    if (spec.gain - 1.0).abs() > f64::EPSILON {
        stages.push(format!("volume={}", spec.gain));
    }
    if spec.fade_in_secs > 0.0 {
        stages.push(format!("afade=t=in:st=0:d={}", spec.fade_in_secs));
    }
    if spec.fade_out_secs > 0.0 {
        let fade_start = (spec.duration_secs - spec.fade_out_secs).max(0.0);
        stages.push(format!(
            "afade=t=out:st={:.3}:d={}",
            fade_start, spec.fade_out_secs
        ));
    }
    if stages.is_empty() {
        stages.push("anull".to_string());
    }
    stages.join(",")
}
