//! Data models for audio analysis.
//!
//! Defines frequency/loudness profiles, detected elements, temporal
//! segments and the aggregate analysis report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-band frequency energy estimates on a 0-255 scale.
///
/// Band edges, in Hz: sub_bass 20-60, bass 60-250, low_mid 250-500,
/// mid 500-2000, high_mid 2000-4000, high 4000-20000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyProfile {
    pub sub_bass: u8,
    pub bass: u8,
    pub low_mid: u8,
    pub mid: u8,
    pub high_mid: u8,
    pub high: u8,
}

impl FrequencyProfile {
    /// Mean of all six band energies, useful as an overall-energy figure.
    pub fn overall(&self) -> f64 {
        (self.sub_bass as f64
            + self.bass as f64
            + self.low_mid as f64
            + self.mid as f64
            + self.high_mid as f64
            + self.high as f64)
            / 6.0
    }
}

/// Loudness statistics for a whole file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessProfile {
    /// Highest peak level across stats blocks, dBFS.
    pub peak_db: f64,
    /// Mean RMS level across stats blocks, dBFS.
    pub rms_db: f64,
    /// Integrated loudness, LUFS. Estimated from RMS when the dedicated
    /// measurement pass fails.
    pub integrated_lufs: Option<f64>,
    /// True when `integrated_lufs` is an RMS-derived estimate rather than a
    /// measured figure.
    pub integrated_estimated: bool,
}

/// Drum elements detected in a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumFlags {
    pub kick: bool,
    pub snare: bool,
    pub hihat: bool,
    pub cymbals: bool,
    pub percussion: bool,
}

/// Bass elements detected in a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BassFlags {
    pub sub_bass: bool,
    pub mid_bass: bool,
    pub bassline: bool,
}

/// Musical elements detected from a frequency profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedElements {
    pub synths: Vec<String>,
    pub instruments: Vec<String>,
    pub drums: DrumFlags,
    pub bass: BassFlags,
}

impl DetectedElements {
    pub fn is_empty(&self) -> bool {
        self.synths.is_empty()
            && self.instruments.is_empty()
            && self.drums == DrumFlags::default()
            && self.bass == BassFlags::default()
    }
}

/// Category of a detected element, used to key temporal segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Synth,
    Instrument,
    Drum,
    Bass,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Synth => "synth",
            ElementCategory::Instrument => "instrument",
            ElementCategory::Drum => "drum",
            ElementCategory::Bass => "bass",
        }
    }
}

/// A contiguous time range during which an element's energy trace stays
/// above threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSegment {
    pub category: ElementCategory,
    pub element: String,
    pub start_secs: f64,
    pub end_secs: f64,
    /// 0-100, derived from the mean energy inside the segment.
    pub confidence: u8,
}

/// Coarse structure estimate for an electronic track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStructure {
    pub intro_secs: f64,
    pub drop_secs: f64,
    pub breakdown_secs: f64,
    pub outro_secs: f64,
}

/// One point of the overall energy curve (0-100 scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    pub time_secs: f64,
    pub energy: u8,
}

/// The externally visible analysis artifact. Recomputed on every request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysisReport {
    pub filename: String,
    pub duration_secs: f64,
    pub sample_rate: Option<u32>,
    pub bitrate_kbps: Option<u32>,
    pub channels: Option<u32>,
    pub format: String,
    pub codec: String,
    pub frequency_profile: FrequencyProfile,
    pub loudness: LoudnessProfile,
    pub structure: TrackStructure,
    pub elements: DetectedElements,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrangement: Vec<TemporalSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub energy_curve: Vec<EnergyPoint>,
    pub analyzed_at: DateTime<Utc>,
}

/// A percussive hit candidate found by the transient scanner.
///
/// Transient: only the winning candidate survives selection, as the input
/// to extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickCandidate {
    /// Position in the track, seconds.
    pub time_secs: f64,
    /// Linear peak amplitude, 0-1.
    pub amplitude: f64,
    /// Mean linear amplitude of the surrounding windows, 0-1.
    pub before_amplitude: f64,
    /// Attack steepness in dB, floored at zero.
    pub attack_speed_db: f64,
    /// Composite quality score.
    pub quality: f64,
}

/// Descriptor of an extracted kick sample, returned alongside the written
/// file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickExtraction {
    pub time_secs: f64,
    pub quality: f64,
    pub isolation: f64,
    pub amplitude: f64,
    pub output_filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_energy_is_band_mean() {
        let profile = FrequencyProfile {
            sub_bass: 60,
            bass: 60,
            low_mid: 60,
            mid: 60,
            high_mid: 60,
            high: 60,
        };
        assert!((profile.overall() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn detected_elements_default_is_empty() {
        assert!(DetectedElements::default().is_empty());

        let with_synth = DetectedElements {
            synths: vec!["Synth".to_string()],
            ..Default::default()
        };
        assert!(!with_synth.is_empty());
    }

    #[test]
    fn report_serializes_without_empty_arrangement() {
        let report = AudioAnalysisReport {
            filename: "track.mp3".to_string(),
            duration_secs: 180.0,
            sample_rate: Some(44100),
            bitrate_kbps: Some(320),
            channels: Some(2),
            format: "mp3".to_string(),
            codec: "mp3".to_string(),
            frequency_profile: FrequencyProfile {
                sub_bass: 80,
                bass: 90,
                low_mid: 70,
                mid: 75,
                high_mid: 65,
                high: 60,
            },
            loudness: LoudnessProfile {
                peak_db: -2.0,
                rms_db: -11.0,
                integrated_lufs: Some(-11.5),
                integrated_estimated: true,
            },
            structure: TrackStructure::default(),
            elements: DetectedElements::default(),
            arrangement: vec![],
            energy_curve: vec![],
            analyzed_at: Utc::now(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("arrangement"));
        assert!(json.contains("\"frequency_profile\""));
    }
}
