//! Media metadata inspection using ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::ProbeError;

/// Metadata describing a playable audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Bitrate in kbps.
    pub bitrate_kbps: Option<u32>,
    /// Number of channels.
    pub channels: Option<u32>,
    /// Container format name (e.g. "mp3", "wav").
    pub format: String,
    /// Audio codec name.
    pub codec: String,
}

/// The metadata-inspection capability, trait-shaped so analysis can run
/// against a stub in tests.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait MediaInspector: Send + Sync {
    async fn inspect(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
}

/// Inspector backed by the ffprobe command-line tool.
pub struct FfprobeMediaInspector {
    ffprobe_bin: String,
    timeout: Duration,
}

impl FfprobeMediaInspector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ffprobe_bin: "ffprobe".to_string(),
            timeout,
        }
    }
}

impl Default for FfprobeMediaInspector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl MediaInspector for FfprobeMediaInspector {
    async fn inspect(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let mut command = Command::new(&self.ffprobe_bin);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ToolFailed(stderr.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let probe: FfprobeOutput = serde_json::from_str(&stdout)
            .map_err(|e| ProbeError::InvalidOutput(format!("JSON parse error: {}", e)))?;
        parse_media_info(probe)
    }
}

fn parse_media_info(probe: FfprobeOutput) -> Result<MediaInfo, ProbeError> {
    let audio_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| ProbeError::InvalidOutput("no audio stream found".to_string()))?;

    let duration_secs: f64 = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse().ok())
        .unwrap_or(0.0);

    // Prefer the stream bitrate, fall back to the container figure
    let bitrate_kbps = audio_stream
        .bit_rate
        .as_ref()
        .or(probe.format.bit_rate.as_ref())
        .and_then(|b| b.parse::<u64>().ok())
        .map(|b| (b / 1000) as u32);

    let sample_rate = audio_stream
        .sample_rate
        .as_ref()
        .and_then(|sr| sr.parse().ok());

    Ok(MediaInfo {
        duration_secs,
        sample_rate,
        bitrate_kbps,
        channels: audio_stream.channels,
        format: probe.format.format_name.clone(),
        codec: audio_stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    })
}
