//! External audio measurement capabilities.
//!
//! Everything the analysis engine knows about an audio file arrives through
//! the traits in this module: a band-filtered decibel meter, a media
//! metadata inspector and a clip renderer. Production implementations shell
//! out to ffmpeg/ffprobe; tests substitute scripted stubs.

mod ffmpeg;
mod media;
mod renderer;

pub use ffmpeg::FfmpegLevelProbe;
pub use media::{FfprobeMediaInspector, MediaInfo, MediaInspector};
pub use renderer::{ClipRenderer, ClipSpec, FfmpegClipRenderer};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from a single external tool invocation.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("measurement tool failed: {0}")]
    ToolFailed(String),

    #[error("measurement timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no level readings in tool output")]
    NoReadings,

    #[error("invalid tool output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A frequency band a measurement is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandFilter {
    pub low_hz: u32,
    pub high_hz: u32,
}

impl BandFilter {
    pub const fn new(low_hz: u32, high_hz: u32) -> Self {
        Self { low_hz, high_hz }
    }
}

/// One parsed stats block from a measurement run.
///
/// The external tool may emit several blocks per invocation (one per
/// channel or internal buffer); callers aggregate them with
/// [`LevelReading::merge`]. A silent or out-of-range window legitimately
/// yields no readings at all.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelReading {
    pub peak_db: Option<f64>,
    pub rms_db: Option<f64>,
    pub mean_db: Option<f64>,
}

impl LevelReading {
    /// Collapse multiple stats blocks into one view: peak is the maximum
    /// across blocks, RMS and mean are arithmetic means of the blocks that
    /// carry them.
    pub fn merge(readings: &[LevelReading]) -> LevelReading {
        let peak_db = readings
            .iter()
            .filter_map(|r| r.peak_db)
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            });
        LevelReading {
            peak_db,
            rms_db: mean_of(readings.iter().filter_map(|r| r.rms_db)),
            mean_db: mean_of(readings.iter().filter_map(|r| r.mean_db)),
        }
    }

    /// The preferred level figure: RMS, then mean, then peak.
    pub fn level_db(&self) -> Option<f64> {
        self.rms_db.or(self.mean_db).or(self.peak_db)
    }

    pub fn is_empty(&self) -> bool {
        self.peak_db.is_none() && self.rms_db.is_none() && self.mean_db.is_none()
    }
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.iter().sum::<f64>() / collected.len() as f64)
    }
}

/// The decibel-meter capability: one external measurement per call.
///
/// `measure` reports the level of `[start_secs, start_secs + duration_secs]`
/// of the file, optionally restricted to a frequency band. Implementations
/// must bound each call with their own timeout so one stuck invocation
/// cannot stall a whole analysis.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait LevelProbe: Send + Sync {
    /// Measure the level of a clip. Returns every stats block the tool
    /// emitted, in output order.
    async fn measure(
        &self,
        path: &Path,
        start_secs: f64,
        duration_secs: f64,
        band: Option<BandFilter>,
    ) -> Result<Vec<LevelReading>, ProbeError>;

    /// Whole-file integrated loudness (LUFS). A separate, more expensive
    /// pass that is allowed to fail; callers fall back to an RMS estimate.
    async fn measure_integrated_loudness(&self, path: &Path) -> Result<f64, ProbeError>;
}
