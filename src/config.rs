use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from worklens.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct AnalyzerConfig {
    pub input: InputConfig,
    pub thresholds: ThresholdConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub log_file: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Wasted seconds above which a worker is flagged in the report.
    pub wasted_warn_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ReportConfig {
    pub format: ReportFormat,
}

/// Output format for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

impl AnalyzerConfig {
    /// Apply CLI overrides on top of file or built-in values.
    pub fn apply_overrides(
        &mut self,
        log_file: Option<PathBuf>,
        warn_threshold: Option<u64>,
        format: Option<ReportFormat>,
    ) {
        if let Some(path) = log_file {
            self.input.log_file = path;
        }
        if let Some(secs) = warn_threshold {
            self.thresholds.wasted_warn_secs = secs;
        }
        if let Some(format) = format {
            self.report.format = format;
        }
    }
}

/// Load configuration from `path`.
///
/// `explicit` marks a user-supplied `--config` path, where a missing file is
/// an error. The default path is allowed to be absent and yields defaults.
pub fn load(path: &Path, explicit: bool) -> Result<AnalyzerConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound && !explicit => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(AnalyzerConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors from reading or parsing the config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

// --- Default implementations ---

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("debug.log"),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { wasted_warn_secs: 5 }
    }
}
