//! Configuration loading.
//!
//! Settings live in a TOML file. The default location is
//! `<config_dir>/answer-reveal/config.toml`; a missing default file means defaults.
//! An explicitly requested file must exist.

use crate::error::{Result, RevealError};
use crate::markdown::{ChunkPolicy, MarkupMarkers};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "answer-reveal";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reveal: RevealConfig,
    pub session: SessionConfig,
}

/// Pacing and transform settings for the render service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Delay between consecutive chars of a direct answer, in microseconds.
    pub direct_step_micros: u64,
    /// Delay between consecutive chars of an agent chunk, in microseconds.
    pub agent_step_micros: u64,
    pub chunking: ChunkPolicy,
    pub markers: MarkupMarkers,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            direct_step_micros: 500,
            agent_step_micros: 1_000,
            chunking: ChunkPolicy::Independent,
            markers: MarkupMarkers::default(),
        }
    }
}

impl RevealConfig {
    pub fn direct_step(&self) -> Duration {
        Duration::from_micros(self.direct_step_micros)
    }

    pub fn agent_step(&self) -> Duration {
        Duration::from_micros(self.agent_step_micros)
    }
}

/// Chat-session limits mirrored from the research console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Messages included as history with each query.
    pub history_window: usize,
    /// Chars of the first prompt used as a new thread's title.
    pub title_chars: usize,
    /// Chars of the latest message kept as a thread preview.
    pub preview_chars: usize,
    /// Model name sent along with queries.
    pub model: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            title_chars: 60,
            preview_chars: 200,
            model: None,
        }
    }
}

impl Config {
    /// Default config path, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, or from the default path when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RevealError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|err| {
            RevealError::file_error(format!("reading {}", path.display()), err)
        })?;
        let config = Self::from_toml(&raw)?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|err| RevealError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let markers = &self.reveal.markers;
        for marker in [&markers.bold_open, &markers.bold_close, &markers.line_break] {
            if marker.contains('*') {
                return Err(RevealError::config(format!(
                    "marker {marker:?} must not contain '*'"
                )));
            }
        }
        if self.session.title_chars == 0 {
            return Err(RevealError::config("session.title_chars must be positive"));
        }
        Ok(())
    }
}
