//! Engine and object-store configuration
//!
//! Configuration is read from `YIELDCAST_*` environment variables (after an
//! optional `.env` file) or from a JSON file. Every field has a default.

use crate::error::{ForecastError, Result};
use crate::selector::GridMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "YIELDCAST_";

/// Object store connection and cache settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend endpoint; for the filesystem backend, its root directory
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Directory for locally cached artifacts
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "yieldcast-objects".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "algorithm".to_string(),
            cache_dir: std::env::temp_dir().join("yieldcast-cache"),
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

/// Settings for a [`ForecastEngine`](crate::engine::ForecastEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    pub storage: StorageConfig,
    /// Parameter grid for the seasonal-regression search
    pub grid_mode: GridMode,
    /// Deadline for model selection and fitting, in seconds
    pub train_timeout_secs: Option<u64>,
    /// Confidence level of forecast intervals
    pub confidence_level: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("yieldcast.db"),
            storage: StorageConfig::default(),
            grid_mode: GridMode::default(),
            train_timeout_secs: None,
            confidence_level: 0.95,
        }
    }
}

impl EngineConfig {
    /// Load `.env` if present, then read `YIELDCAST_*` variables
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = var("DATABASE") {
            config.database_path = PathBuf::from(v);
        }
        if let Some(v) = var("STORAGE_ENDPOINT") {
            config.storage.endpoint = v;
        }
        if let Some(v) = var("ACCESS_KEY") {
            config.storage.access_key = v;
        }
        if let Some(v) = var("SECRET_KEY") {
            config.storage.secret_key = v;
        }
        if let Some(v) = var("BUCKET") {
            config.storage.bucket = v;
        }
        if let Some(v) = var("CACHE_DIR") {
            config.storage.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = var("GRID_MODE") {
            config.grid_mode = v.parse()?;
        }
        if let Some(v) = var("TRAIN_TIMEOUT_SECS") {
            let secs = v.trim().parse::<u64>().map_err(|e| {
                ForecastError::Config(format!("{}TRAIN_TIMEOUT_SECS: {}", ENV_PREFIX, e))
            })?;
            config.train_timeout_secs = Some(secs);
        }
        if let Some(v) = var("CONFIDENCE") {
            config.confidence_level = v.trim().parse::<f64>().map_err(|e| {
                ForecastError::Config(format!("{}CONFIDENCE: {}", ENV_PREFIX, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            ForecastError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Training deadline, if any
    pub fn train_timeout(&self) -> Option<Duration> {
        self.train_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::Config(format!(
                "Confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.storage.bucket.is_empty() || self.storage.bucket.contains('/') {
            return Err(ForecastError::Config(format!(
                "Invalid bucket name `{}`",
                self.storage.bucket
            )));
        }
        if self.train_timeout_secs == Some(0) {
            return Err(ForecastError::Config(
                "Training timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.storage.bucket, "algorithm");
        assert_eq!(config.grid_mode, GridMode::Reduced);
        assert!(config.train_timeout().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("YIELDCAST_BUCKET", "models"),
            ("YIELDCAST_GRID_MODE", "full"),
            ("YIELDCAST_TRAIN_TIMEOUT_SECS", "30"),
            ("YIELDCAST_CONFIDENCE", "0.8"),
            ("YIELDCAST_SECRET_KEY", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(config.storage.bucket, "models");
        assert_eq!(config.grid_mode, GridMode::Full);
        assert_eq!(config.train_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.confidence_level, 0.8);
        assert!(!format!("{:?}", config.storage).contains("hunter2"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(EngineConfig::from_lookup(lookup(&[("YIELDCAST_CONFIDENCE", "1.5")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("YIELDCAST_GRID_MODE", "huge")])).is_err());
        assert!(
            EngineConfig::from_lookup(lookup(&[("YIELDCAST_TRAIN_TIMEOUT_SECS", "soon")])).is_err()
        );
    }

    #[test]
    fn test_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"grid_mode": "full", "storage": {"bucket": "b"}}"#).unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.grid_mode, GridMode::Full);
        assert_eq!(config.storage.bucket, "b");
        assert_eq!(config.confidence_level, 0.95);
    }
}
