//! Musical element detection.
//!
//! A pure function of threshold rules over the six band energies. The
//! rules live in data tables rather than an if/else ladder so individual
//! rules stay testable and tunable in isolation. Multiple rules may fire;
//! none are mutually exclusive.

use super::models::{BassFlags, DetectedElements, DrumFlags, FrequencyProfile};

/// One labeling rule: inspects a profile, yields a label when it fires.
type LabelRule = fn(&FrequencyProfile) -> Option<&'static str>;

const SYNTH_RULES: &[LabelRule] = &[lead_synth, pad_synth, pluck_synth, atmospheric_pad, arpeggio];

const INSTRUMENT_RULES: &[LabelRule] = &[piano, strings, brass];

fn lead_synth(p: &FrequencyProfile) -> Option<&'static str> {
    if p.mid > 50 && p.high_mid > 40 {
        if f64::from(p.high_mid) > f64::from(p.mid) * 0.8 {
            Some("Brilliant Lead Synth")
        } else {
            Some("Lead Synth")
        }
    } else {
        None
    }
}

fn pad_synth(p: &FrequencyProfile) -> Option<&'static str> {
    if p.low_mid > 40 && p.mid > 35 {
        if f64::from(p.low_mid) > f64::from(p.mid) * 0.9 {
            Some("Warm Pad Synth")
        } else {
            Some("Pad Synth")
        }
    } else {
        None
    }
}

fn pluck_synth(p: &FrequencyProfile) -> Option<&'static str> {
    (p.high_mid > 45 && p.high > 35).then_some("Pluck Synth")
}

fn atmospheric_pad(p: &FrequencyProfile) -> Option<&'static str> {
    let spread = i32::from(p.mid).abs_diff(i32::from(p.low_mid))
        + i32::from(p.high_mid).abs_diff(i32::from(p.mid));
    (p.low_mid > 35 && p.mid > 35 && p.high_mid > 30 && spread < 20).then_some("Atmospheric Pad")
}

fn arpeggio(p: &FrequencyProfile) -> Option<&'static str> {
    (p.high_mid > 50 && p.high > 40).then_some("Arpeggio")
}

fn piano(p: &FrequencyProfile) -> Option<&'static str> {
    if p.mid > 45 && p.low_mid > 35 {
        if p.mid > 60 {
            Some("Warm Piano")
        } else {
            Some("Piano")
        }
    } else {
        None
    }
}

fn strings(p: &FrequencyProfile) -> Option<&'static str> {
    if p.mid > 40 && p.high_mid > 35 {
        if p.high_mid > 50 {
            Some("Bright Strings")
        } else {
            Some("Strings")
        }
    } else {
        None
    }
}

fn brass(p: &FrequencyProfile) -> Option<&'static str> {
    (p.low_mid > 45 && p.mid > 40).then_some("Brass")
}

/// Detect musical elements in a frequency profile.
///
/// Pure and total. When no synth/instrument rule fires but overall energy
/// is non-trivial, a generic label is inserted so detection is never empty
/// for a meaningful signal.
pub fn detect(profile: &FrequencyProfile) -> DetectedElements {
    let mut synths: Vec<String> = SYNTH_RULES
        .iter()
        .filter_map(|rule| rule(profile))
        .map(str::to_string)
        .collect();
    let mut instruments: Vec<String> = INSTRUMENT_RULES
        .iter()
        .filter_map(|rule| rule(profile))
        .map(str::to_string)
        .collect();

    if synths.is_empty() && profile.mid > 30 {
        synths.push("Synth".to_string());
    }
    if instruments.is_empty() && (profile.mid > 30 || profile.low_mid > 25) {
        instruments.push("Instrument".to_string());
    }

    DetectedElements {
        synths,
        instruments,
        drums: DrumFlags {
            kick: profile.sub_bass > 30,
            snare: profile.mid > 40 && profile.high_mid > 35,
            hihat: profile.high > 25,
            cymbals: profile.high > 50,
            percussion: profile.mid > 35 && profile.low_mid > 30,
        },
        bass: BassFlags {
            sub_bass: profile.sub_bass > 25,
            mid_bass: profile.bass > 35,
            bassline: profile.bass > 30 && profile.low_mid > 25,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(sub_bass: u8, bass: u8, low_mid: u8, mid: u8, high_mid: u8, high: u8) -> FrequencyProfile {
        FrequencyProfile {
            sub_bass,
            bass,
            low_mid,
            mid,
            high_mid,
            high,
        }
    }

    #[test]
    fn near_silent_profile_detects_nothing() {
        let detected = detect(&profile(10, 10, 10, 10, 10, 10));
        assert!(detected.synths.is_empty());
        assert!(detected.instruments.is_empty());
        assert_eq!(detected.drums, DrumFlags::default());
        assert_eq!(detected.bass, BassFlags::default());
        assert!(detected.is_empty());
    }

    #[test]
    fn lead_synth_brilliant_variant() {
        // high_mid > mid * 0.8 -> brilliant
        let detected = detect(&profile(0, 0, 0, 60, 55, 0));
        assert!(detected.synths.contains(&"Brilliant Lead Synth".to_string()));

        // high_mid below the brilliance ratio -> plain
        let detected = detect(&profile(0, 0, 0, 60, 45, 0));
        assert!(detected.synths.contains(&"Lead Synth".to_string()));
        assert!(!detected.synths.iter().any(|s| s.contains("Brilliant")));
    }

    #[test]
    fn pad_synth_warm_variant() {
        let detected = detect(&profile(0, 0, 55, 40, 0, 0));
        assert!(detected.synths.contains(&"Warm Pad Synth".to_string()));
    }

    #[test]
    fn atmospheric_pad_requires_flat_spread() {
        // Flat mids fire the rule
        let detected = detect(&profile(0, 0, 40, 42, 38, 0));
        assert!(detected.synths.contains(&"Atmospheric Pad".to_string()));

        // A steep spread does not
        let detected = detect(&profile(0, 0, 40, 80, 38, 0));
        assert!(!detected.synths.contains(&"Atmospheric Pad".to_string()));
    }

    #[test]
    fn instrument_variants() {
        let detected = detect(&profile(0, 0, 40, 65, 55, 0));
        assert!(detected.instruments.contains(&"Warm Piano".to_string()));
        assert!(detected.instruments.contains(&"Bright Strings".to_string()));

        let detected = detect(&profile(0, 0, 50, 45, 0, 0));
        assert!(detected.instruments.contains(&"Brass".to_string()));
    }

    #[test]
    fn generic_fallbacks_fire_on_nontrivial_energy() {
        // mid just over the fallback bar, no specific rule fires
        let detected = detect(&profile(0, 0, 0, 31, 0, 0));
        assert_eq!(detected.synths, vec!["Synth".to_string()]);
        assert_eq!(detected.instruments, vec!["Instrument".to_string()]);

        // low_mid alone is enough for the instrument fallback only
        let detected = detect(&profile(0, 0, 26, 0, 0, 0));
        assert!(detected.synths.is_empty());
        assert_eq!(detected.instruments, vec!["Instrument".to_string()]);
    }

    #[test]
    fn drum_and_bass_flags_follow_thresholds() {
        let detected = detect(&profile(35, 40, 35, 45, 40, 55));
        assert!(detected.drums.kick);
        assert!(detected.drums.snare);
        assert!(detected.drums.hihat);
        assert!(detected.drums.cymbals);
        assert!(detected.drums.percussion);
        assert!(detected.bass.sub_bass);
        assert!(detected.bass.mid_bass);
        assert!(detected.bass.bassline);

        let detected = detect(&profile(30, 30, 25, 0, 0, 0));
        assert!(!detected.drums.kick);
        assert!(detected.bass.sub_bass);
        assert!(!detected.bass.mid_bass);
        assert!(!detected.bass.bassline);
    }

    #[test]
    fn detection_is_never_empty_when_mid_energy_present() {
        for mid in 31..=255u16 {
            let detected = detect(&profile(0, 0, 0, mid as u8, 0, 0));
            assert!(!detected.synths.is_empty());
            assert!(!detected.instruments.is_empty());
        }
    }
}
