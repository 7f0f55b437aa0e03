use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading or saving an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Loop and surface configuration.
///
/// Missing fields in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Simulation updates per second.
    pub target_ups: u32,
    /// Upper bound on catch-up ticks per loop iteration. `None` catches up
    /// every missed tick.
    pub max_catch_up_ticks: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Hearth".into(),
            width: 1280,
            height: 720,
            vsync: true,
            target_ups: 30,
            max_catch_up_ticks: None,
        }
    }
}

impl EngineConfig {
    /// Seconds per simulation tick.
    pub fn tick_interval(&self) -> f64 {
        1.0 / f64::from(self.target_ups)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_ups == 0 {
            return Err(ConfigError::Invalid("target_ups must be at least 1".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "surface size {}x{} is empty",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "engine config loaded");
        Ok(config)
    }

    /// Save the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_engine_cadence() {
        let config = EngineConfig::default();
        assert_eq!(config.target_ups, 30);
        assert!((config.tick_interval() - 1.0 / 30.0).abs() < 1e-12);
        assert!(config.max_catch_up_ticks.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let config = EngineConfig {
            title: "spiral".into(),
            max_catch_up_ticks: Some(8),
            ..EngineConfig::default()
        };
        config.save(tmp.path()).unwrap();

        let loaded = EngineConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, r#"{{ "target_ups": 60 }}"#).unwrap();

        let loaded = EngineConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded.target_ups, 60);
        assert_eq!(loaded.width, 1280);
    }

    #[test]
    fn zero_ups_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, r#"{{ "target_ups": 0 }}"#).unwrap();

        let err = EngineConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "not json").unwrap();
        assert!(matches!(
            EngineConfig::load(tmp.path()),
            Err(ConfigError::Json(_))
        ));
    }
}
