use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::feed::DEFAULT_FEED_URL;
use crate::utils;

const FEED_URL_ENV: &str = "MAINE_FILMS_FEED_URL";
const TMDB_KEY_ENV: &str = "TMDB_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub feed_url: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub overrides_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

impl AppConfig {
    /// Feed location: environment first, then the stored value, then the
    /// published feed.
    pub fn resolved_feed_url(&self) -> String {
        env_value(FEED_URL_ENV)
            .or_else(|| non_empty(self.feed_url.as_deref()))
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
    }

    pub fn resolved_tmdb_key(&self) -> Option<String> {
        env_value(TMDB_KEY_ENV).or_else(|| non_empty(self.tmdb_api_key.as_deref()))
    }

    pub fn resolved_overrides_path(&self) -> PathBuf {
        self.overrides_path
            .clone()
            .unwrap_or_else(utils::default_overrides_path)
    }

    pub fn resolved_output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(utils::default_feed_path)
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("ignoring unreadable config {:?}: {err}", path);
                AppConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> AppConfig {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, String>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| "config mutex poisoned".to_string())?;
        transform(&mut guard);
        write_config(&self.path, &guard)?;
        Ok(guard.clone())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            return Err(err.to_string());
        }
    }
    let contents = serde_json::to_string_pretty(config).map_err(|err| err.to_string())?;
    fs::write(path, contents).map_err(|err| err.to_string())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .and_then(|value| non_empty(Some(&value)))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::load_from(dir.path().join("config.json"));
        assert_eq!(store.read(), AppConfig::default());
    }

    #[test]
    fn update_writes_through_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let store = ConfigStore::load_from(path.clone());

        let updated = store
            .update(|config| {
                config.feed_url = Some("https://example.com/feed.json".to_string());
                config.output_path = Some(PathBuf::from("/tmp/out.json"));
            })
            .expect("update config");
        assert_eq!(updated.feed_url.as_deref(), Some("https://example.com/feed.json"));

        let reloaded = ConfigStore::load_from(path);
        assert_eq!(reloaded.read(), updated);
        assert_eq!(
            reloaded.read().resolved_output_path(),
            PathBuf::from("/tmp/out.json")
        );
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write config");
        let store = ConfigStore::load_from(path);
        assert_eq!(store.read(), AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"tmdb_api_key": "abc"}"#).expect("write config");
        let config = ConfigStore::load_from(path).read();
        assert_eq!(config.tmdb_api_key.as_deref(), Some("abc"));
        assert!(config.feed_url.is_none());
    }
}
