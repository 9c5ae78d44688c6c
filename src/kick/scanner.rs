//! Time-domain transient scanning.
//!
//! Walks the first part of a track in fine, overlapping windows and keeps
//! every window whose peak clears the noise floor. De-duplication is the
//! selector's job; the scanner reports raw hits in chronological order.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::probe::{LevelProbe, LevelReading};

/// Kicks are most isolated early in electronic tracks; scanning stops here.
const SCAN_LIMIT_SECS: f64 = 60.0;
/// Step between window starts.
const STEP_SECS: f64 = 0.05;
/// Measurement window length (overlapping with neighbors).
const WINDOW_SECS: f64 = 0.1;
/// Windows quieter than this are noise, not transients.
const NOISE_FLOOR_DB: f64 = -40.0;

/// One surviving scan window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientPeak {
    /// Window start within the track, seconds.
    pub time_secs: f64,
    /// Linear peak amplitude, 0-1.
    pub amplitude: f64,
}

/// Convert a peak decibel reading to linear amplitude, clamped to [0, 1].
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0).clamp(0.0, 1.0)
}

/// Scans the early track for amplitude peaks.
pub struct TransientScanner {
    probe: Arc<dyn LevelProbe>,
}

impl TransientScanner {
    pub fn new(probe: Arc<dyn LevelProbe>) -> Self {
        Self { probe }
    }

    /// Scan `min(60s, duration)` of the track. A window whose probe fails
    /// or stays below the noise floor is dropped; everything else becomes
    /// a peak, in chronological order.
    pub async fn scan(&self, path: &Path, duration_secs: f64) -> Vec<TransientPeak> {
        let scan_end = duration_secs.min(SCAN_LIMIT_SECS);
        let mut peaks = Vec::new();

        let mut index = 0u32;
        loop {
            let time_secs = f64::from(index) * STEP_SECS;
            if time_secs >= scan_end {
                break;
            }
            index += 1;

            let readings = match self.probe.measure(path, time_secs, WINDOW_SECS, None).await {
                Ok(readings) => readings,
                Err(_) => continue,
            };
            let Some(peak_db) = LevelReading::merge(&readings).peak_db else {
                continue;
            };
            if peak_db < NOISE_FLOOR_DB {
                continue;
            }
            peaks.push(TransientPeak {
                time_secs,
                amplitude: db_to_amplitude(peak_db),
            });
        }

        debug!(
            scan_end,
            windows = index,
            peaks = peaks.len(),
            "transient scan complete"
        );
        peaks
    }
}
