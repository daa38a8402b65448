//! Engine tunables and the daemon configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use tvsource_protocol::{ScreenColor, SourceInput};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown source name: {0}")]
    UnknownSource(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Demux wiring of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemuxMode {
    /// Several demuxes, each bound to its own AV source.
    #[default]
    Multi,
    /// Single demux shared by every path.
    Legacy,
}

/// Engine behaviour switches and follow-up delays.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Show snow instead of blanking while a scan sees no stable picture.
    pub snow_on_scan: bool,
    /// Show snow for an analog tuner with no signal.
    pub snow_on_no_signal: bool,
    /// Solid color preference for no-signal screens.
    pub screen_color: ScreenColor,
    /// Color shown over a blocked channel.
    pub block_color: ScreenColor,
    pub enable_video_delay_ms: u64,
    pub video_available_delay_ms: u64,
    pub frontend_recheck_delay_ms: u64,
    pub source_check_delay_ms: u64,
    pub demux_mode: DemuxMode,
    pub demux_count: u8,
    /// Source selected by `start` when nothing was persisted.
    pub default_source: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snow_on_scan: true,
            snow_on_no_signal: false,
            screen_color: ScreenColor::Blue,
            block_color: ScreenColor::Black,
            enable_video_delay_ms: 150,
            video_available_delay_ms: 50,
            frontend_recheck_delay_ms: 1000,
            source_check_delay_ms: 500,
            demux_mode: DemuxMode::Multi,
            demux_count: 3,
            default_source: None,
        }
    }
}

impl EngineConfig {
    pub fn enable_video_delay(&self) -> Duration {
        Duration::from_millis(self.enable_video_delay_ms)
    }

    pub fn video_available_delay(&self) -> Duration {
        Duration::from_millis(self.video_available_delay_ms)
    }

    pub fn frontend_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.frontend_recheck_delay_ms)
    }

    pub fn source_check_delay(&self) -> Duration {
        Duration::from_millis(self.source_check_delay_ms)
    }

    /// Demux ids whose AV bindings are reset when digital TV is selected.
    pub fn demux_ids(&self) -> std::ops::Range<u8> {
        match self.demux_mode {
            DemuxMode::Multi => 0..self.demux_count,
            DemuxMode::Legacy => 0..1,
        }
    }

    pub fn default_source(&self) -> Result<SourceInput, ConfigError> {
        match &self.default_source {
            None => Ok(SourceInput::Tv),
            Some(name) => SourceInput::from_name(name).ok_or_else(|| ConfigError::UnknownSource(name.clone())),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.demux_mode == DemuxMode::Multi && self.demux_count == 0 {
            return Err(ConfigError::Invalid {
                field: "demux_count",
                reason: "multi-demux mode needs at least one demux".to_string(),
            });
        }
        self.default_source()?;
        Ok(())
    }
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct DatabaseSection {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

impl ConfigFile {
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ConfigFile = toml::from_str(contents)?;
        config.engine.validate()?;
        Ok(config)
    }
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::parse(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.database.path.is_none());
        assert_eq!(config.engine.default_source().unwrap(), SourceInput::Tv);
    }

    #[test]
    fn test_full_file() {
        let config = ConfigFile::parse(
            r#"
            [engine]
            snow_on_scan = false
            screen_color = "black"
            block_color = "blue"
            enable_video_delay_ms = 200
            demux_mode = "legacy"
            default_source = "hdmi2"

            [database]
            path = "/var/lib/tvsource/settings.db"

            [logging]
            log_dir = "/var/log/tvsource"
            retention_days = 3
            level = "debug"
            "#,
        )
        .unwrap();

        assert!(!config.engine.snow_on_scan);
        assert_eq!(config.engine.screen_color, ScreenColor::Black);
        assert_eq!(config.engine.block_color, ScreenColor::Blue);
        assert_eq!(config.engine.enable_video_delay(), Duration::from_millis(200));
        assert_eq!(config.engine.frontend_recheck_delay_ms, 1000);
        assert_eq!(config.engine.demux_ids(), 0..1);
        assert_eq!(config.engine.default_source().unwrap(), SourceInput::Hdmi2);
        assert_eq!(config.logging.retention_days, Some(3));
    }

    #[test]
    fn test_rejects_unknown_source() {
        let err = ConfigFile::parse("[engine]\ndefault_source = \"scart\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSource(name) if name == "scart"));
    }

    #[test]
    fn test_rejects_empty_multi_demux() {
        let err = ConfigFile::parse("[engine]\ndemux_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "demux_count", .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/tvsourced.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
