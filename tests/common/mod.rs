//! Common test infrastructure
//!
//! Scripted stand-ins for the external tool capabilities, so the whole
//! engine can be exercised end-to-end without ffmpeg. Tests should only
//! import from this module, not from internal submodules.

mod stubs;

// Public API - this is what tests import
pub use stubs::{SyntheticProbe, SyntheticTrack, StubInspector, StubRenderer};

use std::sync::Arc;
use tempfile::TempDir;
use trackprobe::{AnalysisService, AnalysisSettings};

/// A service wired over the given synthetic track, plus the scratch
/// directory that holds the fake source file and extracted samples.
pub struct TestRig {
    pub service: AnalysisService,
    pub probe: Arc<SyntheticProbe>,
    pub renderer: Arc<StubRenderer>,
    pub track_path: std::path::PathBuf,
    pub scratch: TempDir,
}

impl TestRig {
    pub fn new(track: SyntheticTrack) -> Self {
        Self::with_renderer_payload(track, StubRenderer::valid_wav_payload())
    }

    pub fn with_renderer_payload(track: SyntheticTrack, payload: Vec<u8>) -> Self {
        let scratch = TempDir::new().unwrap();
        let track_path = scratch.path().join("track.mp3");
        std::fs::write(&track_path, b"synthetic").unwrap();

        let duration_secs = track.duration_secs;
        let probe = Arc::new(SyntheticProbe::new(track));
        let inspector = Arc::new(StubInspector::new(duration_secs));
        let renderer = Arc::new(StubRenderer::new(payload));

        let settings = AnalysisSettings {
            samples_dir: scratch.path().join("samples"),
            loudness_jitter: false,
            ..Default::default()
        };
        let service = AnalysisService::new(
            probe.clone(),
            inspector,
            renderer.clone(),
            settings,
        );

        Self {
            service,
            probe,
            renderer,
            track_path,
            scratch,
        }
    }
}
