//! Per-band frequency energy profiling.
//!
//! Samples the level probe across six fixed bands and maps decibel
//! readings onto a 0-255 energy scale. Probe failures degrade to per-band
//! defaults; the profiler itself never fails.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::probe::{BandFilter, LevelProbe, LevelReading};

use super::models::FrequencyProfile;

/// Band edges and the energy substituted when that band's probe fails.
struct Band {
    name: &'static str,
    filter: BandFilter,
    fallback: u8,
}

const BANDS: [Band; 6] = [
    Band {
        name: "sub_bass",
        filter: BandFilter::new(20, 60),
        fallback: 80,
    },
    Band {
        name: "bass",
        filter: BandFilter::new(60, 250),
        fallback: 90,
    },
    Band {
        name: "low_mid",
        filter: BandFilter::new(250, 500),
        fallback: 70,
    },
    Band {
        name: "mid",
        filter: BandFilter::new(500, 2000),
        fallback: 75,
    },
    Band {
        name: "high_mid",
        filter: BandFilter::new(2000, 4000),
        fallback: 65,
    },
    Band {
        name: "high",
        filter: BandFilter::new(4000, 20000),
        fallback: 60,
    },
];

/// Map a decibel reading onto the 0-255 energy scale: -60 dB -> 0,
/// 0 dB -> 255, clamped outside that range.
pub fn db_to_energy(db: f64) -> u8 {
    let scaled = ((db + 60.0) / 60.0) * 255.0;
    scaled.clamp(0.0, 255.0).round() as u8
}

/// Samples band energies at a single time window.
pub struct FrequencyProfiler {
    probe: Arc<dyn LevelProbe>,
}

impl FrequencyProfiler {
    pub fn new(probe: Arc<dyn LevelProbe>) -> Self {
        Self { probe }
    }

    /// The default sample window for a track: its middle, for
    /// `min(2s, duration/10)`.
    pub fn default_window(duration_secs: f64) -> (f64, f64) {
        let sample_duration = (duration_secs / 10.0).min(2.0).max(0.0);
        let sample_time = (duration_secs / 2.0 - sample_duration / 2.0).max(0.0);
        (sample_time, sample_duration)
    }

    /// Profile all six bands over `[sample_time, sample_time + sample_duration]`.
    ///
    /// Always returns a complete profile: a band whose probe fails or
    /// reports nothing gets its documented fallback energy.
    pub async fn profile(
        &self,
        path: &Path,
        sample_time: f64,
        sample_duration: f64,
    ) -> FrequencyProfile {
        let mut energies = [0u8; 6];
        for (slot, band) in energies.iter_mut().zip(BANDS.iter()) {
            *slot = self.band_energy(path, sample_time, sample_duration, band).await;
        }
        FrequencyProfile {
            sub_bass: energies[0],
            bass: energies[1],
            low_mid: energies[2],
            mid: energies[3],
            high_mid: energies[4],
            high: energies[5],
        }
    }

    async fn band_energy(
        &self,
        path: &Path,
        sample_time: f64,
        sample_duration: f64,
        band: &Band,
    ) -> u8 {
        match self
            .probe
            .measure(path, sample_time, sample_duration, Some(band.filter))
            .await
        {
            Ok(readings) => match LevelReading::merge(&readings).level_db() {
                Some(db) => db_to_energy(db),
                None => {
                    debug!(band = band.name, "probe returned no level, using fallback");
                    band.fallback
                }
            },
            Err(e) => {
                debug!(band = band.name, error = %e, "band probe failed, using fallback");
                band.fallback
            }
        }
    }
}
