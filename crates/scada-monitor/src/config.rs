//! Application configuration.
//!
//! Loaded from a TOML file, then overridden by `SCADA__<SECTION>__<KEY>`
//! environment variables (e.g. `SCADA__SERVER__BASE_URL`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use scada_dashboard::DashboardConfig;
use scada_diagram::{FrameLoopConfig, SvgExport, DEFAULT_WIDTH, MAX_FPS};
use scada_transport::{ClientConfig, PushConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SCADA";

/// Config file used when neither `--config` nor `SCADA_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Server endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the SCADA backend. The push channel URL is derived from it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout (ms).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Push channel configuration subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    /// Disable to run on polling alone.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Flat delay between a close and the next connect (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Consecutive failed connects before giving up (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: 0,
        }
    }
}

impl From<PushSettings> for PushConfig {
    fn from(cfg: PushSettings) -> Self {
        Self {
            url: String::new(), // Derived from the server base URL
            reconnect_delay_ms: cfg.reconnect_delay_ms,
            max_reconnect_attempts: cfg.max_reconnect_attempts,
        }
    }
}

/// Diagram rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Width of the container the diagram fills.
    #[serde(default = "default_width")]
    pub width: f64,
    /// Write the current frame to this SVG file periodically.
    #[serde(default)]
    pub svg_path: Option<PathBuf>,
    /// SVG export interval (ms).
    #[serde(default = "default_svg_interval_ms")]
    pub svg_interval_ms: u64,
}

fn default_fps() -> u32 {
    30
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_svg_interval_ms() -> u64 {
    1000
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fps: default_fps(),
            width: default_width(),
            svg_path: None,
            svg_interval_ms: default_svg_interval_ms(),
        }
    }
}

impl RenderConfig {
    pub fn frame_loop_config(&self) -> FrameLoopConfig {
        FrameLoopConfig {
            fps: self.fps,
            svg_export: self.svg_path.clone().map(|path| SvgExport {
                path,
                interval: Duration::from_millis(self.svg_interval_ms),
            }),
        }
    }
}

/// Credentials handed over by the external identity service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub push: PushSettings,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load from `path` (if it exists) layered under environment overrides.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder();

        if path.exists() {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file, without environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall a loop.
    pub fn validate(&self) -> AppResult<()> {
        if self.server.base_url.trim().is_empty() {
            return Err(AppError::Config("server.base_url is empty".to_string()));
        }
        if self.dashboard.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "dashboard.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.render.enabled && !(1..=MAX_FPS).contains(&self.render.fps) {
            return Err(AppError::Config(format!(
                "render.fps must be between 1 and {MAX_FPS}"
            )));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.server.base_url.clone(),
            timeout_ms: self.server.timeout_ms,
            retry: self.retry.clone(),
        }
    }

    /// Push settings with the derived channel URL filled in.
    pub fn push_config(&self, url: String) -> PushConfig {
        let base: PushConfig = self.push.clone().into();
        PushConfig { url, ..base }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scada_dashboard::MergePolicy;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.push.reconnect_delay_ms, 5000);
        assert_eq!(config.dashboard.poll_interval_ms, 3000);
        assert_eq!(config.render.fps, 30);
        assert!(config.session.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            base_url = "https://plant.example"

            [dashboard]
            merge_policy = "versioned"

            [render]
            svg_path = "/tmp/pid.svg"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "https://plant.example");
        assert_eq!(config.server.timeout_ms, 10_000);
        assert_eq!(config.dashboard.merge_policy, MergePolicy::Versioned);
        assert_eq!(config.dashboard.alert_window, 256);

        let frame = config.render.frame_loop_config();
        let export = frame.svg_export.unwrap();
        assert_eq!(export.path, PathBuf::from("/tmp/pid.svg"));
        assert_eq!(export.interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_push_config_keeps_settings() {
        let mut config = AppConfig::default();
        config.push.max_reconnect_attempts = 4;
        let push = config.push_config("ws://plant/ws".to_string());
        assert_eq!(push.url, "ws://plant/ws");
        assert_eq!(push.reconnect_delay_ms, 5000);
        assert_eq!(push.max_reconnect_attempts, 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = AppConfig::from_toml("[dashboard]\npoll_interval_ms = 0\n");
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = AppConfig::from_toml("[server]\nbase_url = 5\n");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_fps_out_of_range_rejected() {
        for fps in [0, MAX_FPS + 1, u32::MAX] {
            let result = AppConfig::from_toml(&format!("[render]\nfps = {fps}\n"));
            assert!(matches!(result, Err(AppError::Config(_))), "fps = {fps}");
        }

        let config = AppConfig::from_toml(&format!("[render]\nfps = {MAX_FPS}\n")).unwrap();
        assert_eq!(config.render.fps, MAX_FPS);

        // Ignored when rendering is off.
        assert!(AppConfig::from_toml("[render]\nenabled = false\nfps = 0\n").is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("/nonexistent/scada-monitor.toml").unwrap();
        assert_eq!(config.push.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("reconnect_delay_ms"));
    }
}
