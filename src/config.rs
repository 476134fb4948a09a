use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "placement-tree";
const CONFIG_FILE: &str = "config.json";

/// What to do when a new subfeature's name matches an existing sibling
/// (names compare case-insensitively).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    #[default]
    Reject,
    /// Keep both; lookups by name find the first one.
    Allow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    pub duplicate_names: DuplicateNamePolicy,
    /// Run the consistency checker after every insertion and placement.
    pub verify_after_mutation: bool,
}

impl TreeConfig {
    /// Load configuration from the user's config directory.
    /// Returns default config if file doesn't exist or fails to parse.
    pub fn load() -> Self {
        match get_config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit file. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save the current configuration to the user's config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TreeConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, TreeConfig::default());
        assert_eq!(config.duplicate_names, DuplicateNamePolicy::Reject);
        assert!(!config.verify_after_mutation);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = TreeConfig {
            duplicate_names: DuplicateNamePolicy::Allow,
            verify_after_mutation: true,
        };
        config.save_to(&path).unwrap();
        assert_eq!(TreeConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_saved_defaults_name_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        TreeConfig::default().save_to(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"duplicate_names\": \"reject\""));
        assert!(content.contains("\"verify_after_mutation\": false"));
        assert_eq!(TreeConfig::load_from(&path).unwrap(), TreeConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"verify_after_mutation": true}"#).unwrap();
        let config = TreeConfig::load_from(&path).unwrap();
        assert!(config.verify_after_mutation);
        assert_eq!(config.duplicate_names, DuplicateNamePolicy::Reject);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "not json").unwrap();
        assert!(TreeConfig::load_from(&path).is_err());
    }
}
