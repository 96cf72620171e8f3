use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "dictaphone";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding the recording (defaults to the user data directory)
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Input device name; the system default when unset
    #[serde(default)]
    pub input_device: Option<String>,
}

fn default_file_name() -> String {
    "recording.wav".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: None,
            file_name: default_file_name(),
            input_device: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default location
    /// (~/.config/dictaphone/config.json). A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save(&config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join(APP_DIR).join("config.json"))
    }

    fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join(APP_DIR))
    }

    /// Directory the recording lives in
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::data_dir(),
        }
    }

    /// The one fixed recording path
    pub fn recording_path(&self) -> Result<PathBuf> {
        Ok(self.storage_dir()?.join(&self.file_name))
    }

    /// Where the microphone consent answer is kept
    pub fn consent_path(&self) -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("permissions.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let name = Path::new(&self.file_name);

        if self.file_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(anyhow::anyhow!(
                "file_name must be a plain file name, got {:?}",
                self.file_name
            ));
        }

        if name.extension().and_then(|ext| ext.to_str()) != Some("wav") {
            return Err(anyhow::anyhow!("file_name must end in .wav"));
        }

        if matches!(&self.input_device, Some(device) if device.trim().is_empty()) {
            return Err(anyhow::anyhow!("input_device cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.file_name, "recording.wav");
        assert!(config.storage_dir.is_none());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "storage_dir": "/tmp/memos" }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/memos")));
        assert_eq!(
            config.recording_path().unwrap(),
            PathBuf::from("/tmp/memos/recording.wav")
        );
        assert!(config.input_device.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ storage_dir").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn validate_rejects_bad_file_names() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.file_name = "memo.m4a".to_string();
        assert!(config.validate().is_err());

        config.file_name = "../memo.wav".to_string();
        assert!(config.validate().is_err());

        config.file_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_device() {
        let config = Config {
            input_device: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
