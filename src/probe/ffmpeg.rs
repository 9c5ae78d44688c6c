//! ffmpeg-backed level measurements.
//!
//! Each measurement is one ffmpeg invocation over a windowed clip, with the
//! level meters (`astats`, `volumedetect`) in the filter chain and the
//! decode output discarded. The meters print to stderr as free text, which
//! is scraped with regexes.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{BandFilter, LevelProbe, LevelReading, ProbeError};

lazy_static! {
    static ref RE_PEAK_LEVEL: Regex =
        Regex::new(r"Peak level dB:\s*(-?[0-9.]+|-?inf)").unwrap();
    static ref RE_RMS_LEVEL: Regex =
        Regex::new(r"RMS level dB:\s*(-?[0-9.]+|-?inf)").unwrap();
    static ref RE_MEAN_VOLUME: Regex =
        Regex::new(r"mean_volume:\s*(-?[0-9.]+)\s*dB").unwrap();
    static ref RE_MAX_VOLUME: Regex =
        Regex::new(r"max_volume:\s*(-?[0-9.]+)\s*dB").unwrap();
    static ref RE_INPUT_I: Regex =
        Regex::new(r#""input_i"\s*:\s*"(-?[0-9.]+)""#).unwrap();
}

/// Level meter backed by the ffmpeg command-line tool.
pub struct FfmpegLevelProbe {
    ffmpeg_bin: String,
    probe_timeout: Duration,
    loudness_timeout: Duration,
}

impl FfmpegLevelProbe {
    /// # Arguments
    /// * `probe_timeout` - deadline for one windowed measurement
    /// * `loudness_timeout` - deadline for the whole-file loudness pass
    pub fn new(probe_timeout: Duration, loudness_timeout: Duration) -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            probe_timeout,
            loudness_timeout,
        }
    }

    /// Run ffmpeg with the given pre-input and filter arguments, returning
    /// captured stderr. The meters print there; stdout stays empty.
    async fn run_metered(
        &self,
        path: &Path,
        pre_input_args: &[String],
        filter: &str,
        timeout: Duration,
    ) -> Result<String, ProbeError> {
        let mut command = Command::new(&self.ffmpeg_bin);
        command
            .args(["-hide_banner", "-nostats"])
            .args(pre_input_args)
            .arg("-i")
            .arg(path)
            .args(["-af", filter, "-vn", "-f", "null", "-"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(ProbeError::ToolFailed(truncate_tail(&stderr, 512)));
        }
        Ok(stderr)
    }
}

impl Default for FfmpegLevelProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(15))
    }
}

#[async_trait]
impl LevelProbe for FfmpegLevelProbe {
    async fn measure(
        &self,
        path: &Path,
        start_secs: f64,
        duration_secs: f64,
        band: Option<BandFilter>,
    ) -> Result<Vec<LevelReading>, ProbeError> {
        let pre_input = vec![
            "-ss".to_string(),
            format!("{:.3}", start_secs.max(0.0)),
            "-t".to_string(),
            format!("{:.3}", duration_secs.max(0.0)),
        ];
        let filter = level_filter(band);

        let stderr = self
            .run_metered(path, &pre_input, &filter, self.probe_timeout)
            .await?;

        let readings = parse_level_output(&stderr);
        debug!(
            ?band,
            start_secs, duration_secs, blocks = readings.len(),
            "level probe completed"
        );
        if readings.is_empty() {
            return Err(ProbeError::NoReadings);
        }
        Ok(readings)
    }

    async fn measure_integrated_loudness(&self, path: &Path) -> Result<f64, ProbeError> {
        let stderr = self
            .run_metered(
                path,
                &[],
                "loudnorm=print_format=json",
                self.loudness_timeout,
            )
            .await?;

        RE_INPUT_I
            .captures(&stderr)
            .and_then(|cap| cap[1].parse::<f64>().ok())
            .ok_or_else(|| ProbeError::InvalidOutput("no integrated loudness figure".into()))
    }
}

/// Filter chain for one level measurement: optional band isolation, then
/// both meters in sequence.
fn level_filter(band: Option<BandFilter>) -> String {
    match band {
        Some(band) => format!(
            "highpass=f={},lowpass=f={},astats=metadata=0,volumedetect",
            band.low_hz, band.high_hz
        ),
        None => "astats=metadata=0,volumedetect".to_string(),
    }
}

/// Scrape stats blocks out of the meters' stderr text.
///
/// `astats` prints a Peak/RMS pair per channel section plus an overall
/// section; `volumedetect` adds one mean/max pair at the end. Each pair
/// becomes one [`LevelReading`]. `-inf` values (digital silence) are
/// dropped rather than parsed.
fn parse_level_output(stderr: &str) -> Vec<LevelReading> {
    let mut readings = Vec::new();
    let mut open: Option<LevelReading> = None;
    let mut volume_block = LevelReading::default();

    for line in stderr.lines() {
        if let Some(cap) = RE_PEAK_LEVEL.captures(line) {
            if let Some(reading) = open.take() {
                if !reading.is_empty() {
                    readings.push(reading);
                }
            }
            open = Some(LevelReading {
                peak_db: parse_db(&cap[1]),
                ..Default::default()
            });
        } else if let Some(cap) = RE_RMS_LEVEL.captures(line) {
            let mut reading = open.take().unwrap_or_default();
            reading.rms_db = parse_db(&cap[1]);
            if !reading.is_empty() {
                readings.push(reading);
            }
        } else if let Some(cap) = RE_MEAN_VOLUME.captures(line) {
            volume_block.mean_db = parse_db(&cap[1]);
        } else if let Some(cap) = RE_MAX_VOLUME.captures(line) {
            volume_block.peak_db = parse_db(&cap[1]);
        }
    }

    if let Some(reading) = open {
        if !reading.is_empty() {
            readings.push(reading);
        }
    }
    if !volume_block.is_empty() {
        readings.push(volume_block);
    }
    readings
}

fn parse_db(raw: &str) -> Option<f64> {
    if raw.contains("inf") {
        return None;
    }
    raw.parse().ok()
}

fn truncate_tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
