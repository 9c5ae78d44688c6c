mod file_config;

pub use file_config::{FileConfig, ProbeConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub samples_dir: Option<PathBuf>,
    pub analysis_timeout_secs: u64,
    pub temporal_scan: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            samples_dir: None,
            analysis_timeout_secs: 120,
            temporal_scan: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory extracted kick samples are written into.
    pub samples_dir: PathBuf,

    // Engine settings
    pub analysis: AnalysisSettings,
    pub probes: ProbeSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let samples_dir = file
            .samples_dir
            .map(PathBuf::from)
            .or_else(|| cli.samples_dir.clone())
            .unwrap_or_else(|| PathBuf::from("samples"));

        if samples_dir.exists() && !samples_dir.is_dir() {
            bail!("samples_dir is not a directory: {:?}", samples_dir);
        }

        let analysis_timeout_secs = file
            .analysis_timeout_secs
            .unwrap_or(cli.analysis_timeout_secs);
        if analysis_timeout_secs == 0 {
            bail!("analysis_timeout_secs must be greater than zero");
        }

        let temporal_scan = file.temporal_scan.unwrap_or(cli.temporal_scan);

        let probes_file = file.probes.unwrap_or_default();
        let probes = ProbeSettings {
            probe_timeout: Duration::from_secs(probes_file.probe_timeout_secs.unwrap_or(5)),
            loudness_timeout: Duration::from_secs(probes_file.loudness_timeout_secs.unwrap_or(15)),
            render_timeout: Duration::from_secs(probes_file.render_timeout_secs.unwrap_or(20)),
        };

        let analysis = AnalysisSettings {
            analysis_timeout: Duration::from_secs(analysis_timeout_secs),
            samples_dir: samples_dir.clone(),
            temporal_scan,
            loudness_jitter: true,
        };

        Ok(Self {
            samples_dir,
            analysis,
            probes,
        })
    }
}

/// Settings consumed by the analysis service.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// How long a single caller waits for an analysis before receiving a
    /// timeout. The underlying computation keeps running for any other
    /// attached callers.
    pub analysis_timeout: Duration,
    /// Directory extracted kick samples are written into.
    pub samples_dir: PathBuf,
    /// Whether to run the multi-point temporal scan (arrangement,
    /// structure estimate, energy curve).
    pub temporal_scan: bool,
    /// Whether the RMS-derived integrated-loudness estimate gets random
    /// jitter. Tests turn this off for deterministic reports.
    pub loudness_jitter: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(120),
            samples_dir: PathBuf::from("samples"),
            temporal_scan: true,
            loudness_jitter: true,
        }
    }
}

/// Timeouts for the external tool invocations.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Deadline for one windowed level measurement.
    pub probe_timeout: Duration,
    /// Deadline for whole-file loudness passes.
    pub loudness_timeout: Duration,
    /// Deadline for rendering one sample clip.
    pub render_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            loudness_timeout: Duration::from_secs(15),
            render_timeout: Duration::from_secs(20),
        }
    }
}
