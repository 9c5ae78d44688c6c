//! Temporal arrangement of detected elements.
//!
//! Re-profiles the track at a bounded set of time points, tracks each
//! element's energy over time and converts the traces into discrete
//! active segments.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::probe::LevelProbe;

use super::frequency::FrequencyProfiler;
use super::models::{DetectedElements, ElementCategory, FrequencyProfile, TemporalSegment};

/// Maximum number of sample points per track.
const MAX_SAMPLE_POINTS: usize = 10;

/// An element's energy trace crosses into "active" at this level
/// (0-255 scale).
const SEGMENT_THRESHOLD: f64 = 30.0;

/// One frequency profile taken at a known track position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledProfile {
    pub time_secs: f64,
    pub profile: FrequencyProfile,
}

/// Result of a temporal scan: the per-point profiles (reused by the
/// structure estimator) and the derived segments.
#[derive(Debug, Clone, Default)]
pub struct ArrangementScan {
    pub samples: Vec<SampledProfile>,
    pub segments: Vec<TemporalSegment>,
}

/// One point of an element's energy trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    pub time_secs: f64,
    pub energy: f64,
}

/// A closed segment produced by [`find_segments`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub confidence: u8,
}

/// Which band(s) carry an element's energy.
#[derive(Debug, Clone, Copy)]
enum BandCombo {
    SubBass,
    Bass,
    Mid,
    High,
    MidHighMid,
    LowMidMid,
    HighMidHigh,
    MidLowMid,
}

impl BandCombo {
    fn value(self, p: &FrequencyProfile) -> f64 {
        let mean = |a: u8, b: u8| (f64::from(a) + f64::from(b)) / 2.0;
        match self {
            BandCombo::SubBass => f64::from(p.sub_bass),
            BandCombo::Bass => f64::from(p.bass),
            BandCombo::Mid => f64::from(p.mid),
            BandCombo::High => f64::from(p.high),
            BandCombo::MidHighMid => mean(p.mid, p.high_mid),
            BandCombo::LowMidMid => mean(p.low_mid, p.mid),
            BandCombo::HighMidHigh => mean(p.high_mid, p.high),
            BandCombo::MidLowMid => mean(p.mid, p.low_mid),
        }
    }
}

/// Samples a track over time and segments each element's presence.
pub struct TemporalArranger {
    profiler: FrequencyProfiler,
}

impl TemporalArranger {
    pub fn new(probe: Arc<dyn LevelProbe>) -> Self {
        Self {
            profiler: FrequencyProfiler::new(probe),
        }
    }

    /// Scan the track and derive active segments for every element in
    /// `elements`. An element whose trace never crosses the threshold
    /// yields no segments; that is a valid outcome, not an error.
    pub async fn arrange(
        &self,
        path: &Path,
        duration_secs: f64,
        elements: &DetectedElements,
    ) -> ArrangementScan {
        let points = sample_points(duration_secs);
        let window_secs = (duration_secs / 10.0).min(2.0).max(0.0);

        let mut samples = Vec::with_capacity(points.len());
        for time_secs in points {
            let profile = self.profiler.profile(path, time_secs, window_secs).await;
            samples.push(SampledProfile { time_secs, profile });
        }

        let mut segments = Vec::new();
        for (category, name, combo) in element_traces(elements) {
            let trace: Vec<TracePoint> = samples
                .iter()
                .map(|s| TracePoint {
                    time_secs: s.time_secs,
                    energy: combo.value(&s.profile),
                })
                .collect();
            for segment in find_segments(&trace, SEGMENT_THRESHOLD) {
                segments.push(TemporalSegment {
                    category,
                    element: name.clone(),
                    start_secs: segment.start_secs,
                    end_secs: segment.end_secs,
                    confidence: segment.confidence,
                });
            }
        }
        segments.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        debug!(
            samples = samples.len(),
            segments = segments.len(),
            "temporal scan complete"
        );
        ArrangementScan { samples, segments }
    }
}

/// Choose up to [`MAX_SAMPLE_POINTS`] sample times: fixed anchors at 10%,
/// 50% and 90% of the duration plus evenly spaced fill points, sorted
/// ascending.
pub fn sample_points(duration_secs: f64) -> Vec<f64> {
    let mut points = vec![
        duration_secs * 0.1,
        duration_secs * 0.5,
        duration_secs * 0.9,
    ];

    let interval = (duration_secs / 10.0).max(30.0);
    let mut t = interval;
    while points.len() < MAX_SAMPLE_POINTS && t < duration_secs {
        points.push(t);
        t += interval;
    }

    points.sort_by(f64::total_cmp);
    points.dedup_by(|a, b| (*a - *b).abs() < 1e-3);
    points
}

/// Segment one element's trace with a left-to-right state machine.
///
/// While the energy stays at or above `threshold` the open segment
/// extends; the first sample below it closes the segment at the
/// *previous* sample's time. A segment still open at the last sample
/// closes there. Confidence is the segment's mean energy scaled to 0-100.
/// No look-ahead or smoothing: a single-sample dip splits a segment.
pub fn find_segments(trace: &[TracePoint], threshold: f64) -> Vec<TraceSegment> {
    struct Open {
        start_secs: f64,
        last_secs: f64,
        energy_sum: f64,
        count: u32,
    }

    fn close(open: Open) -> TraceSegment {
        let mean = open.energy_sum / f64::from(open.count.max(1));
        TraceSegment {
            start_secs: open.start_secs,
            end_secs: open.last_secs,
            confidence: ((mean / 255.0) * 100.0).min(100.0).round() as u8,
        }
    }

    let mut segments = Vec::new();
    let mut open: Option<Open> = None;

    for point in trace {
        if point.energy >= threshold {
            match open.as_mut() {
                Some(seg) => {
                    seg.last_secs = point.time_secs;
                    seg.energy_sum += point.energy;
                    seg.count += 1;
                }
                None => {
                    open = Some(Open {
                        start_secs: point.time_secs,
                        last_secs: point.time_secs,
                        energy_sum: point.energy,
                        count: 1,
                    });
                }
            }
        } else if let Some(seg) = open.take() {
            segments.push(close(seg));
        }
    }
    if let Some(seg) = open {
        segments.push(close(seg));
    }
    segments
}

/// Expand detected elements into (category, name, trace source) triples.
fn element_traces(elements: &DetectedElements) -> Vec<(ElementCategory, String, BandCombo)> {
    let mut traces = Vec::new();

    for name in &elements.synths {
        traces.push((ElementCategory::Synth, name.clone(), synth_combo(name)));
    }
    for name in &elements.instruments {
        traces.push((
            ElementCategory::Instrument,
            name.clone(),
            instrument_combo(name),
        ));
    }

    let drums = &elements.drums;
    let drum_traces: [(bool, &str, BandCombo); 5] = [
        (drums.kick, "Kick", BandCombo::SubBass),
        (drums.snare, "Snare", BandCombo::MidHighMid),
        (drums.hihat, "Hi-Hat", BandCombo::High),
        (drums.cymbals, "Cymbals", BandCombo::High),
        (drums.percussion, "Percussion", BandCombo::MidLowMid),
    ];
    for (present, name, combo) in drum_traces {
        if present {
            traces.push((ElementCategory::Drum, name.to_string(), combo));
        }
    }

    let bass = &elements.bass;
    let bass_traces: [(bool, &str, BandCombo); 3] = [
        (bass.sub_bass, "Sub Bass", BandCombo::SubBass),
        (bass.mid_bass, "Mid Bass", BandCombo::Bass),
        (bass.bassline, "Bassline", BandCombo::Bass),
    ];
    for (present, name, combo) in bass_traces {
        if present {
            traces.push((ElementCategory::Bass, name.to_string(), combo));
        }
    }

    traces
}

fn synth_combo(name: &str) -> BandCombo {
    if name.contains("Lead") {
        BandCombo::MidHighMid
    } else if name.contains("Pad") {
        BandCombo::LowMidMid
    } else if name.contains("Pluck") || name.contains("Arpeggio") {
        BandCombo::HighMidHigh
    } else {
        BandCombo::Mid
    }
}

fn instrument_combo(name: &str) -> BandCombo {
    if name.contains("Piano") {
        BandCombo::MidLowMid
    } else if name.contains("Strings") {
        BandCombo::MidHighMid
    } else if name.contains("Brass") {
        BandCombo::LowMidMid
    } else {
        BandCombo::Mid
    }
}
