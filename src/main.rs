use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

mod analysis;
use analysis::{AnalysisService, AudioAnalysisReport, KickExtraction};

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod kick;

mod probe;
use probe::{FfmpegClipRenderer, FfmpegLevelProbe, FfprobeMediaInspector};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "aiff"];

#[derive(Parser, Debug)]
#[command(version, about = "Probe-based audio analysis and kick extraction")]
struct CliArgs {
    /// Audio files or directories to analyze. Directories are walked
    /// recursively for audio files.
    #[clap(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Extract the best kick sample instead of running a full analysis.
    #[clap(long)]
    pub extract_kick: bool,

    /// Directory extracted kick samples are written into.
    #[clap(long)]
    pub samples_dir: Option<PathBuf>,

    /// Per-file analysis deadline in seconds.
    #[clap(long, default_value_t = 120)]
    pub analysis_timeout_secs: u64,

    /// Skip the multi-point temporal scan (faster, no arrangement or
    /// structure estimate).
    #[clap(long)]
    pub no_temporal_scan: bool,

    /// Path to a TOML config file. Values there override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Pretty-print the JSON reports.
    #[clap(long)]
    pub pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!(
        "trackprobe {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        samples_dir: cli_args.samples_dir.clone(),
        analysis_timeout_secs: cli_args.analysis_timeout_secs,
        temporal_scan: !cli_args.no_temporal_scan,
    };
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    let probe = Arc::new(FfmpegLevelProbe::new(
        app_config.probes.probe_timeout,
        app_config.probes.loudness_timeout,
    ));
    let inspector = Arc::new(FfprobeMediaInspector::default());
    let renderer = Arc::new(FfmpegClipRenderer::new(app_config.probes.render_timeout));
    let service = AnalysisService::new(probe, inspector, renderer, app_config.analysis.clone());

    let files = collect_audio_files(&cli_args.inputs)?;
    if files.is_empty() {
        bail!("no audio files found in the given inputs");
    }
    info!("{} file(s) to process", files.len());

    let progress = if files.len() > 1 {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .expect("valid progress template"),
        );
        Some(bar)
    } else {
        None
    };

    let mut failures = 0usize;
    for file in &files {
        if let Some(bar) = &progress {
            bar.set_message(
                file.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        }

        let outcome = if cli_args.extract_kick {
            service
                .extract_best_kick(file)
                .await
                .map(Output::Extraction)
        } else {
            service.analyze_file(file).await.map(Output::Report)
        };

        match outcome {
            Ok(output) => println!("{}", output.to_json(cli_args.pretty)?),
            Err(e) => {
                error!(file = %file.display(), error = %e, "processing failed");
                failures += 1;
            }
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    if failures > 0 {
        bail!("{} of {} file(s) failed", failures, files.len());
    }
    Ok(())
}

enum Output {
    Report(AudioAnalysisReport),
    Extraction(KickExtraction),
}

impl Output {
    fn to_json(&self, pretty: bool) -> Result<String> {
        let json = match (self, pretty) {
            (Output::Report(report), true) => serde_json::to_string_pretty(report),
            (Output::Report(report), false) => serde_json::to_string(report),
            (Output::Extraction(extraction), true) => serde_json::to_string_pretty(extraction),
            (Output::Extraction(extraction), false) => serde_json::to_string(extraction),
        };
        json.context("Failed to serialize output")
    }
}

/// Expand files and directories into a flat list of audio files.
fn collect_audio_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_audio_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("input does not exist: {:?}", input);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
