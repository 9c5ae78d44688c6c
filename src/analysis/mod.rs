//! Audio analysis module
//!
//! Turns a raw audio file into band energy estimates, loudness
//! statistics, detected musical elements, a temporal arrangement and a
//! structure estimate, all through the injected probe capabilities.

pub mod arrangement;
pub mod elements;
pub mod frequency;
pub mod loudness;
pub mod models;
pub mod service;
pub mod structure;

pub use arrangement::{find_segments, sample_points, TemporalArranger, TracePoint, TraceSegment};
pub use frequency::{db_to_energy, FrequencyProfiler};
pub use loudness::LoudnessProfiler;
pub use models::*;
pub use service::{AnalysisError, AnalysisService};
