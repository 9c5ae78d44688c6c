//! The analysis service: orchestration, deduplication and deadlines.
//!
//! Each request runs as an independent tokio task whose only suspension
//! points are external probe calls. Concurrent requests for the same file
//! collapse into one in-flight computation through a registry of shared
//! futures keyed by canonical path.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AnalysisSettings;
use crate::kick::{KickExtractor, KickSelector, TransientScanner};
use crate::probe::{ClipRenderer, LevelProbe, MediaInfo, MediaInspector};

use super::arrangement::{ArrangementScan, TemporalArranger};
use super::elements;
use super::frequency::FrequencyProfiler;
use super::loudness::LoudnessProfiler;
use super::models::{AudioAnalysisReport, KickExtraction, TrackStructure};
use super::structure;

/// Stand-in duration when even metadata probing fails; keeps the analysis
/// able to produce a complete, if degraded, report.
const FALLBACK_DURATION_SECS: f64 = 180.0;

/// Errors surfaced to the external layer.
///
/// Probe-level failures never reach here: the profilers absorb them into
/// documented defaults. Clone-able because multiple callers can attach to
/// the same failed computation.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("no usable audio at {0}")]
    NoUsableAudio(String),

    #[error("analysis deadline of {0:?} elapsed; large or long files may need more time")]
    Timeout(std::time::Duration),

    #[error("analysis task failed: {0}")]
    TaskFailed(String),

    #[error("sample extraction failed: {0}")]
    InvalidSample(String),
}

type SharedAnalysis = Shared<BoxFuture<'static, Result<Arc<AudioAnalysisReport>, AnalysisError>>>;

struct ServiceInner {
    probe: Arc<dyn LevelProbe>,
    inspector: Arc<dyn MediaInspector>,
    renderer: Arc<dyn ClipRenderer>,
    settings: AnalysisSettings,
    inflight: Mutex<HashMap<PathBuf, SharedAnalysis>>,
}

/// Entry point for the excluded HTTP layer: full-file analysis and kick
/// extraction over injected probe capabilities.
#[derive(Clone)]
pub struct AnalysisService {
    inner: Arc<ServiceInner>,
}

impl AnalysisService {
    pub fn new(
        probe: Arc<dyn LevelProbe>,
        inspector: Arc<dyn MediaInspector>,
        renderer: Arc<dyn ClipRenderer>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                probe,
                inspector,
                renderer,
                settings,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Analyze a file, joining an identical in-flight request when one
    /// exists. The wait is bounded by the configured deadline; the
    /// underlying computation is not aborted on a caller timeout, so other
    /// attached callers can still receive its result.
    pub async fn analyze_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<AudioAnalysisReport, AnalysisError> {
        let key = canonical_key(path.as_ref()).await?;
        let pending = self.attach_or_spawn(key);

        match tokio::time::timeout(self.inner.settings.analysis_timeout, pending).await {
            Ok(result) => result.map(|report| (*report).clone()),
            Err(_) => Err(AnalysisError::Timeout(self.inner.settings.analysis_timeout)),
        }
    }

    /// Find the cleanest kick in a file and write it as a one-shot sample
    /// into the configured samples directory.
    pub async fn extract_best_kick(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<KickExtraction, AnalysisError> {
        let key = canonical_key(path.as_ref()).await?;
        let inner = self.inner.clone();
        let work = async move { run_extraction(&inner, &key).await };

        match tokio::time::timeout(self.inner.settings.analysis_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout(self.inner.settings.analysis_timeout)),
        }
    }

    /// Join the registry entry for `key`, spawning the computation when
    /// this is the first request. The entry is removed once the
    /// computation settles, success or failure.
    fn attach_or_spawn(&self, key: PathBuf) -> SharedAnalysis {
        let mut inflight = self.inner.inflight.lock().unwrap();
        if let Some(existing) = inflight.get(&key) {
            return existing.clone();
        }

        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            let result = run_analysis(&inner, &task_key).await.map(Arc::new);
            inner.inflight.lock().unwrap().remove(&task_key);
            let _ = tx.send(result);
        });

        let pending: SharedAnalysis = rx
            .map(|received| match received {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::TaskFailed(
                    "analysis task dropped before settling".to_string(),
                )),
            })
            .boxed()
            .shared();
        inflight.insert(key, pending.clone());
        pending
    }
}

/// Canonicalize the dedup key. A path that cannot be resolved at all is
/// the one input error this core rejects up front.
async fn canonical_key(path: &Path) -> Result<PathBuf, AnalysisError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|_| AnalysisError::NoUsableAudio(path.display().to_string()))
}

/// The actual analysis pipeline. Infallible past the metadata stage by
/// design: every profiler degrades instead of erroring.
async fn run_analysis(
    inner: &Arc<ServiceInner>,
    path: &Path,
) -> Result<AudioAnalysisReport, AnalysisError> {
    info!(path = %path.display(), "starting audio analysis");

    let media = match inner.inspector.inspect(path).await {
        Ok(media) => media,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "metadata probe failed, using fallback");
            fallback_media()
        }
    };
    let duration_secs = if media.duration_secs > 0.0 {
        media.duration_secs
    } else {
        FALLBACK_DURATION_SECS
    };

    let profiler = FrequencyProfiler::new(inner.probe.clone());
    let (sample_time, sample_duration) = FrequencyProfiler::default_window(duration_secs);
    let frequency_profile = profiler.profile(path, sample_time, sample_duration).await;

    let mut loudness_profiler = LoudnessProfiler::new(inner.probe.clone());
    if !inner.settings.loudness_jitter {
        loudness_profiler = loudness_profiler.without_jitter();
    }
    let loudness = loudness_profiler.profile(path, duration_secs).await;

    let detected = elements::detect(&frequency_profile);

    let scan = if inner.settings.temporal_scan {
        TemporalArranger::new(inner.probe.clone())
            .arrange(path, duration_secs, &detected)
            .await
    } else {
        ArrangementScan::default()
    };

    let track_structure = if scan.samples.is_empty() {
        TrackStructure {
            intro_secs: duration_secs * 0.1,
            ..Default::default()
        }
    } else {
        structure::estimate_structure(&scan.samples, duration_secs)
    };

    let report = AudioAnalysisReport {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
        duration_secs,
        sample_rate: media.sample_rate,
        bitrate_kbps: media.bitrate_kbps,
        channels: media.channels,
        format: media.format,
        codec: media.codec,
        frequency_profile,
        loudness,
        structure: track_structure,
        elements: detected,
        energy_curve: structure::energy_curve(&scan.samples),
        arrangement: scan.segments,
        analyzed_at: chrono::Utc::now(),
    };

    info!(
        path = %path.display(),
        synths = report.elements.synths.len(),
        segments = report.arrangement.len(),
        "audio analysis complete"
    );
    Ok(report)
}

async fn run_extraction(
    inner: &Arc<ServiceInner>,
    path: &Path,
) -> Result<KickExtraction, AnalysisError> {
    info!(path = %path.display(), "starting kick extraction");

    let duration_secs = match inner.inspector.inspect(path).await {
        Ok(media) if media.duration_secs > 0.0 => media.duration_secs,
        _ => FALLBACK_DURATION_SECS,
    };

    let peaks = TransientScanner::new(inner.probe.clone())
        .scan(path, duration_secs)
        .await;
    let candidate = KickSelector::new(inner.probe.clone())
        .select(path, &peaks)
        .await;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "track".to_string());
    let output_filename = format!("{}-kick-{}.wav", stem, short_id());
    let output_path = inner.settings.samples_dir.join(&output_filename);

    KickExtractor::new(inner.renderer.clone(), inner.inspector.clone())
        .extract(path, &candidate, &output_path)
        .await
        .map_err(|e| AnalysisError::InvalidSample(e.to_string()))?;

    info!(
        path = %path.display(),
        output = %output_path.display(),
        quality = candidate.quality,
        "kick extraction complete"
    );
    Ok(KickExtraction {
        time_secs: candidate.time_secs,
        quality: candidate.quality,
        isolation: candidate.isolation(),
        amplitude: candidate.amplitude,
        output_filename,
    })
}

fn fallback_media() -> MediaInfo {
    MediaInfo {
        duration_secs: FALLBACK_DURATION_SECS,
        sample_rate: None,
        bitrate_kbps: None,
        channels: None,
        format: "unknown".to_string(),
        codec: "unknown".to_string(),
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
