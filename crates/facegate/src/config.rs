use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Kiosk configuration: optional TOML file, then `FACEGATE_*` environment
/// variables on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory holding registered faces.
    pub store_dir: PathBuf,
    /// ArcFace ONNX model file.
    pub model_path: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            store_dir: facegate_core::default_store_dir(),
            model_path: facegate_core::default_model_path(),
            similarity_threshold: 0.40,
        }
    }
}

impl Config {
    /// Load from `path` (or `FACEGATE_CONFIG`) if given, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACEGATE_CONFIG").ok().map(PathBuf::from));

        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FACEGATE_*` overrides read through `lookup`. Unparseable
    /// numbers keep the current value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(device) = lookup("FACEGATE_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        if let Some(dir) = lookup("FACEGATE_STORE_DIR") {
            self.store_dir = PathBuf::from(dir);
        }
        if let Some(model) = lookup("FACEGATE_MODEL_PATH") {
            self.model_path = PathBuf::from(model);
        }
        if let Some(threshold) = lookup("FACEGATE_SIMILARITY_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.similarity_threshold = threshold;
        }
        self
    }
}

/// Fixed pacing of the capture pipeline and the page timers.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Producer sleep between frames.
    pub capture_interval: Duration,
    /// Preview refresh tick.
    pub preview_tick: Duration,
    /// Registration page check for the first frame.
    pub readiness_poll: Duration,
    /// Scanning indicator alternation.
    pub scan_cadence: Duration,
    /// Delay before authentication starts looking for a frame.
    pub warm_up: Duration,
    /// Re-poll interval while no frame is available.
    pub repoll: Duration,
    /// How long "access granted" stays up before the secure page.
    pub granted_display: Duration,
    /// How long "access denied" stays up before returning to login.
    pub denied_display: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            capture_interval: facegate_hw::CAPTURE_INTERVAL,
            preview_tick: Duration::from_millis(10),
            readiness_poll: Duration::from_millis(100),
            scan_cadence: Duration::from_millis(500),
            warm_up: Duration::from_secs(2),
            repoll: Duration::from_millis(100),
            granted_display: Duration::from_secs(1),
            denied_display: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera_device, "/dev/video0");
        assert!((config.similarity_threshold - 0.40).abs() < 1e-6);
        assert!(config.store_dir.ends_with("facegate/faces"));
    }

    #[test]
    fn test_toml_partial_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            camera_device = "/dev/video4"
            similarity_threshold = 0.55
            "#,
        )
        .unwrap();
        assert_eq!(config.camera_device, "/dev/video4");
        assert!((config.similarity_threshold - 0.55).abs() < 1e-6);
        assert_eq!(config.model_path, Config::default().model_path);
    }

    #[test]
    fn test_toml_rejects_bad_types() {
        assert!(Config::from_toml_str("similarity_threshold = \"high\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FACEGATE_STORE_DIR", "/srv/faces"),
            ("FACEGATE_SIMILARITY_THRESHOLD", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.store_dir, PathBuf::from("/srv/faces"));
        assert!((config.similarity_threshold - 0.40).abs() < 1e-6);
        assert_eq!(config.camera_device, "/dev/video0");
    }

    #[test]
    fn test_default_timings() {
        let t = Timings::default();
        assert_eq!(t.capture_interval, Duration::from_millis(33));
        assert_eq!(t.warm_up, Duration::from_secs(2));
        assert!(t.denied_display > t.granted_display);
    }
}
