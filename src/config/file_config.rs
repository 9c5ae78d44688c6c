use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub samples_dir: Option<String>,
    pub analysis_timeout_secs: Option<u64>,
    pub temporal_scan: Option<bool>,

    // Feature configs
    pub probes: Option<ProbeConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProbeConfig {
    pub probe_timeout_secs: Option<u64>,
    pub loudness_timeout_secs: Option<u64>,
    pub render_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
