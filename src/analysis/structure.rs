//! Track structure estimation.
//!
//! Derives a coarse intro/drop/breakdown/outro picture and the overall
//! energy curve from the profiles the temporal scan already collected, so
//! no additional probes are spent here.

use super::arrangement::{find_segments, SampledProfile, TracePoint};
use super::models::{EnergyPoint, TrackStructure};

/// A sample counts as "high energy" above this fraction of the loudest
/// sample.
const HIGH_ENERGY_RATIO: f64 = 0.6;

/// Overall energy per sample point, scaled to 0-100.
pub fn energy_curve(samples: &[SampledProfile]) -> Vec<EnergyPoint> {
    samples
        .iter()
        .map(|s| EnergyPoint {
            time_secs: s.time_secs,
            energy: ((s.profile.overall() / 255.0) * 100.0).min(100.0).round() as u8,
        })
        .collect()
}

/// Estimate the track structure from the sampled overall-energy trace.
///
/// The intro ends where the trace first crosses into high energy; the
/// drop is the longest high region; the breakdown is the longest gap
/// between high regions; the outro is whatever trails the last one.
pub fn estimate_structure(samples: &[SampledProfile], duration_secs: f64) -> TrackStructure {
    let trace: Vec<TracePoint> = samples
        .iter()
        .map(|s| TracePoint {
            time_secs: s.time_secs,
            energy: s.profile.overall(),
        })
        .collect();

    let max_energy = trace.iter().map(|p| p.energy).fold(0.0, f64::max);
    if max_energy <= 0.0 || trace.is_empty() {
        return TrackStructure {
            intro_secs: duration_secs * 0.1,
            ..Default::default()
        };
    }

    let regions = find_segments(&trace, max_energy * HIGH_ENERGY_RATIO);
    if regions.is_empty() {
        return TrackStructure {
            intro_secs: duration_secs * 0.1,
            ..Default::default()
        };
    }

    let intro_secs = regions[0].start_secs;
    let drop_secs = regions
        .iter()
        .map(|r| r.end_secs - r.start_secs)
        .fold(0.0, f64::max);
    let breakdown_secs = regions
        .windows(2)
        .map(|pair| pair[1].start_secs - pair[0].end_secs)
        .fold(0.0, f64::max);
    let outro_secs = (duration_secs - regions[regions.len() - 1].end_secs).max(0.0);

    TrackStructure {
        intro_secs,
        drop_secs,
        breakdown_secs,
        outro_secs,
    }
}
