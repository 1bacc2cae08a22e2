use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the PNG files are written to; created if missing.
    pub dir: PathBuf,
    /// File stem: screenshots are saved as `<stem>-<index>.png`.
    pub stem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Monitor index to capture; 0 is the whole virtual desktop.
    /// Unset means every physical monitor.
    pub monitor: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig {
                dir: PathBuf::from("."),
                stem: "monitor".into(),
            },
            capture: CaptureConfig { monitor: None },
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.stem.is_empty() {
            anyhow::bail!("Output stem must not be empty");
        }

        if self.output.stem.contains(['/', '\\']) {
            anyhow::bail!("Output stem must not contain path separators");
        }

        Ok(())
    }
}
