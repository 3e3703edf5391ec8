use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// `"text"` for the human-readable rendering, `"json"` for one object per line.
    #[serde(default = "default_output_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// When false, every frame-count lookup resolves to the unknown sentinel.
    #[serde(default = "default_video_enabled")]
    pub enabled: bool,
    #[serde(default = "default_probe_command")]
    pub probe_command: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

/// Rendering selected by `[output] format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: default_video_enabled(),
            probe_command: default_probe_command(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.output.format()?;
        Ok(config)
    }

    /// Load from `path` when one was given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

impl OutputConfig {
    pub fn format(&self) -> Result<OutputFormat, ConfigError> {
        match self.format.as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::Invalid {
                key: "output.format",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

// Default value functions
fn default_log_level() -> String {
    "info".into()
}
fn default_output_format() -> String {
    "text".into()
}
fn default_video_enabled() -> bool {
    true
}
fn default_probe_command() -> String {
    "ffprobe".into()
}
fn default_probe_timeout() -> u64 {
    30
}
