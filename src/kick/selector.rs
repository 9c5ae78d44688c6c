//! Kick candidate selection.
//!
//! Turns the scanner's raw peak list into a single best candidate:
//! de-duplicate, measure isolation and attack around each peak, score,
//! rank with an amplitude tie-break, and fall back gracefully when no
//! peak is convincing.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::analysis::models::KickCandidate;
use crate::probe::{LevelProbe, LevelReading};

use super::scanner::{db_to_amplitude, TransientPeak};

/// Peaks closer than this to a kept, louder peak are duplicates.
const DEDUP_WINDOW_SECS: f64 = 0.3;
/// Peaks at or before this point get analyzed first.
const PRIORITY_CUTOFF_SECS: f64 = 45.0;
/// Analysis caps for the priority set and the late fallback set.
const MAX_PRIORITY_ANALYSIS: usize = 20;
const MAX_LATE_ANALYSIS: usize = 10;
/// Late peaks are only analyzed when the priority set produced fewer
/// valid candidates than this.
const MIN_VALID_CANDIDATES: usize = 3;
/// Quality bonus for peaks from the priority set.
const PRIORITY_MULTIPLIER: f64 = 1.2;
/// Candidates this close in quality tie-break on amplitude.
const TIE_BREAK_QUALITY_DELTA: f64 = 5.0;

/// Acceptance thresholds.
const MIN_QUALITY: f64 = 25.0;
const MIN_ISOLATION: f64 = 0.05;
const MIN_AMPLITUDE: f64 = 0.1;

/// Returned when the scanner found nothing usable at all.
const DEFAULT_TIME_SECS: f64 = 2.0;
const DEFAULT_AMPLITUDE: f64 = 0.5;

impl KickCandidate {
    /// How much quieter the surroundings are than the peak itself.
    pub fn isolation(&self) -> f64 {
        self.amplitude - self.before_amplitude
    }
}

/// Picks the single best kick candidate from a peak list.
pub struct KickSelector {
    probe: Arc<dyn LevelProbe>,
}

impl KickSelector {
    pub fn new(probe: Arc<dyn LevelProbe>) -> Self {
        Self { probe }
    }

    /// Select the cleanest kick among `peaks`. Always returns a candidate;
    /// the fallbacks are, in order: the best-scoring accepted candidate,
    /// the loudest de-duplicated peak with a synthetic score, a fixed
    /// default position.
    pub async fn select(&self, path: &Path, peaks: &[TransientPeak]) -> KickCandidate {
        let deduped = dedup_peaks(peaks);
        if deduped.is_empty() {
            debug!("no peaks survived de-duplication, using default candidate");
            return synthetic_candidate(DEFAULT_TIME_SECS, DEFAULT_AMPLITUDE);
        }

        let (priority, late): (Vec<&TransientPeak>, Vec<&TransientPeak>) = deduped
            .iter()
            .partition(|p| p.time_secs <= PRIORITY_CUTOFF_SECS);

        let mut accepted = Vec::new();
        for peak in priority.into_iter().take(MAX_PRIORITY_ANALYSIS) {
            if let Some(candidate) = self.analyze_peak(path, peak, true).await {
                accepted.push(candidate);
            }
        }
        if accepted.len() < MIN_VALID_CANDIDATES {
            for peak in late.into_iter().take(MAX_LATE_ANALYSIS) {
                if let Some(candidate) = self.analyze_peak(path, peak, false).await {
                    accepted.push(candidate);
                }
            }
        }

        if let Some(best) = rank(&accepted) {
            debug!(
                time_secs = best.time_secs,
                quality = best.quality,
                "kick candidate selected"
            );
            return best;
        }

        // Nothing passed acceptance: the loudest de-duplicated peak still
        // beats a made-up position.
        let loudest = deduped[0];
        debug!(
            time_secs = loudest.time_secs,
            "no candidate passed acceptance, falling back to loudest peak"
        );
        synthetic_candidate(loudest.time_secs, loudest.amplitude)
    }

    /// Measure isolation and attack around one peak and score it. Returns
    /// None when the candidate fails acceptance.
    async fn analyze_peak(
        &self,
        path: &Path,
        peak: &TransientPeak,
        priority: bool,
    ) -> Option<KickCandidate> {
        let t = peak.time_secs;

        // Surrounding loudness: 200 ms ending 50 ms pre-peak, 150 ms
        // starting 50 ms post-peak. A silent window reads as amplitude 0.
        let before = self.window_amplitude(path, t - 0.25, 0.2).await;
        let after = self.window_amplitude(path, t + 0.05, 0.15).await;
        let surrounding = (before + after) / 2.0;
        let isolation = peak.amplitude - surrounding;

        // Attack steepness: the level jump from just-before to on-peak.
        let pre_db = self.window_db(path, t - 0.01, 0.01).await;
        let on_db = self.window_db(path, t, 0.01).await;
        let attack_speed_db = match (pre_db, on_db) {
            (Some(pre), Some(on)) => (on - pre).max(0.0),
            _ => 0.0,
        };

        let mut quality = composite_quality(peak.amplitude, isolation, attack_speed_db);
        if priority {
            quality *= PRIORITY_MULTIPLIER;
        }

        let accepted =
            quality > MIN_QUALITY && isolation > MIN_ISOLATION && peak.amplitude > MIN_AMPLITUDE;
        if !accepted {
            return None;
        }
        Some(KickCandidate {
            time_secs: t,
            amplitude: peak.amplitude,
            before_amplitude: surrounding,
            attack_speed_db,
            quality,
        })
    }

    async fn window_db(&self, path: &Path, start_secs: f64, duration_secs: f64) -> Option<f64> {
        let readings = self
            .probe
            .measure(path, start_secs.max(0.0), duration_secs, None)
            .await
            .ok()?;
        LevelReading::merge(&readings).peak_db
    }

    async fn window_amplitude(&self, path: &Path, start_secs: f64, duration_secs: f64) -> f64 {
        self.window_db(path, start_secs, duration_secs)
            .await
            .map(db_to_amplitude)
            .unwrap_or(0.0)
    }
}

/// The composite quality score: half amplitude, 40% isolation, 10% attack.
fn composite_quality(amplitude: f64, isolation: f64, attack_speed_db: f64) -> f64 {
    let amplitude_score = 100.0 * amplitude;
    let isolation_score = ((isolation / 0.6) * 100.0).max(0.0).min(100.0);
    let attack_score = ((attack_speed_db / 30.0) * 100.0).min(100.0);
    0.5 * amplitude_score + 0.4 * isolation_score + 0.1 * attack_score
}

/// Fallback candidate built from a bare peak: no measured surroundings,
/// quality is the amplitude term of the composite alone.
fn synthetic_candidate(time_secs: f64, amplitude: f64) -> KickCandidate {
    KickCandidate {
        time_secs,
        amplitude,
        before_amplitude: 0.0,
        attack_speed_db: 0.0,
        quality: 0.5 * 100.0 * amplitude,
    }
}

/// Greedy de-duplication: loudest first, keep a peak only when no kept
/// peak sits within [`DEDUP_WINDOW_SECS`] of it. Output stays
/// amplitude-descending; equal amplitudes order by time for determinism.
pub fn dedup_peaks(peaks: &[TransientPeak]) -> Vec<TransientPeak> {
    let mut sorted: Vec<TransientPeak> = peaks.to_vec();
    sorted.sort_by(|a, b| {
        b.amplitude
            .total_cmp(&a.amplitude)
            .then(a.time_secs.total_cmp(&b.time_secs))
    });

    let mut kept: Vec<TransientPeak> = Vec::new();
    for peak in sorted {
        let duplicate = kept
            .iter()
            .any(|k| (k.time_secs - peak.time_secs).abs() < DEDUP_WINDOW_SECS);
        if !duplicate {
            kept.push(peak);
        }
    }
    kept
}

/// Rank accepted candidates: highest quality wins, but anything within
/// [`TIE_BREAK_QUALITY_DELTA`] of the top quality competes on amplitude.
fn rank(candidates: &[KickCandidate]) -> Option<KickCandidate> {
    let top_quality = candidates
        .iter()
        .map(|c| c.quality)
        .fold(f64::NEG_INFINITY, f64::max);
    candidates
        .iter()
        .filter(|c| top_quality - c.quality < TIE_BREAK_QUALITY_DELTA)
        .max_by(|a, b| {
            a.amplitude
                .total_cmp(&b.amplitude)
                .then(a.quality.total_cmp(&b.quality))
        })
        .copied()
}
