//! Host configuration
//!
//! Loaded from `$XDG_CONFIG_HOME/proxi/host.toml`.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`PROXI_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [paths]
//! apps_dir = "/opt/proxi/apps"
//! cache_dir = "/var/cache/proxi/tts"
//! font_regular = "/opt/proxi/fonts/Regular.ttf"
//!
//! [display]
//! width = 128
//! height = 64
//! backend = "terminal"
//!
//! [speech]
//! binary = "/opt/piper/piper"
//! model = "/opt/piper/voice.onnx"
//! response_timeout_ms = 4000
//!
//! [speech.word_map]
//! proxi = "proxy"
//!
//! [input]
//! shift_key = "KEY_LEFTSHIFT"
//! max_retries = -1
//!
//! [apps]
//! launcher = "launcher"
//! tick_rate = 20.0
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::display::DisplayTiming;
use crate::input::{InputConfig, KeyId};
use crate::lifecycle::ManagerSettings;
use crate::speech::{Framing, SynthCommand, SynthTiming, WordMap};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Which display device the daemon drives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBackend {
    /// Half-block rendering in the controlling terminal
    #[default]
    Terminal,
    /// In-memory frames only
    Headless,
}

impl std::str::FromStr for DisplayBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "headless" => Ok(Self::Headless),
            other => Err(ConfigError::ValidationError(format!(
                "unknown display backend: {other}"
            ))),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[paths]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsToml {
    /// App directories
    pub apps_dir: Option<PathBuf>,
    /// Speech cache
    pub cache_dir: Option<PathBuf>,
    /// Per-app scratch space lives under `<data_dir>/apps`
    pub data_dir: Option<PathBuf>,
    /// Status icon overrides
    pub icon_dir: Option<PathBuf>,
    /// Regular weight font
    pub font_regular: Option<PathBuf>,
    /// Bold weight font
    pub font_bold: Option<PathBuf>,
    /// Small font for titles
    pub font_small: Option<PathBuf>,
}

/// `[display]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayToml {
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
    /// Periodic render interval in milliseconds
    pub render_interval_ms: Option<u64>,
    /// Cursor blink interval in milliseconds
    pub blink_interval_ms: Option<u64>,
    /// Contrast applied at boot
    pub contrast: Option<u8>,
    /// Device backend
    pub backend: Option<DisplayBackend>,
}

/// `[speech]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechToml {
    /// Synthesis binary
    pub binary: Option<PathBuf>,
    /// Voice model
    pub model: Option<PathBuf>,
    /// Extra synthesis arguments
    pub extra_args: Option<Vec<String>>,
    /// Per-request timeout in milliseconds
    pub response_timeout_ms: Option<u64>,
    /// Quiet window that ends a response, in milliseconds
    pub settle_ms: Option<u64>,
    /// Explicit end-of-response marker
    pub delimiter: Option<String>,
    /// PCM sample rate
    pub sample_rate: Option<u32>,
    /// Playback binary
    pub player: Option<String>,
    /// Pronunciation substitutions
    pub word_map: Option<HashMap<String, String>>,
}

/// `[input]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputToml {
    /// Shift modifier key
    pub shift_key: Option<String>,
    /// Delay between discovery attempts in milliseconds
    pub retry_delay_ms: Option<u64>,
    /// Discovery attempts before giving up; -1 retries forever
    pub max_retries: Option<i64>,
    /// Pause after a disconnect in milliseconds
    pub reconnect_delay_ms: Option<u64>,
    /// Pause after "No Keyboard Found" in milliseconds
    pub no_keyboard_delay_ms: Option<u64>,
}

/// `[apps]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsToml {
    /// App started at boot
    pub launcher: Option<String>,
    /// Default tick rate in Hz
    pub tick_rate: Option<f64>,
    /// Per-app stop timeout in milliseconds
    pub stop_timeout_ms: Option<u64>,
    /// Timeout applied to each app at shutdown, in milliseconds
    pub stop_all_timeout_ms: Option<u64>,
    /// Bounded wait for an instance lock during key fan-out, in milliseconds
    pub dispatch_timeout_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostToml {
    /// `[paths]`
    pub paths: PathsToml,
    /// `[display]`
    pub display: DisplayToml,
    /// `[speech]`
    pub speech: SpeechToml,
    /// `[input]`
    pub input: InputToml,
    /// `[apps]`
    pub apps: AppsToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Filesystem locations
#[derive(Clone, Debug, PartialEq)]
pub struct PathsConfig {
    /// App directories
    pub apps_dir: PathBuf,
    /// Speech cache
    pub cache_dir: PathBuf,
    /// Writable data root
    pub data_dir: PathBuf,
    /// Status icon overrides
    pub icon_dir: Option<PathBuf>,
    /// Regular weight font
    pub font_regular: PathBuf,
    /// Bold weight font
    pub font_bold: PathBuf,
    /// Small font
    pub font_small: PathBuf,
}

/// Display settings
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Periodic render interval
    pub render_interval: Duration,
    /// Cursor blink interval
    pub blink_interval: Duration,
    /// Contrast applied at boot
    pub contrast: Option<u8>,
    /// Device backend
    pub backend: DisplayBackend,
}

/// Speech settings
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechConfig {
    /// Synthesis binary
    pub binary: PathBuf,
    /// Voice model
    pub model: PathBuf,
    /// Extra synthesis arguments
    pub extra_args: Vec<String>,
    /// Per-request timeout
    pub response_timeout: Duration,
    /// Quiet window ending a response
    pub settle: Duration,
    /// Explicit end-of-response marker
    pub delimiter: Option<String>,
    /// PCM sample rate
    pub sample_rate: u32,
    /// Playback binary
    pub player: String,
    /// Pronunciation substitutions
    pub word_map: HashMap<String, String>,
}

/// Lifecycle settings
#[derive(Clone, Debug, PartialEq)]
pub struct AppsConfig {
    /// App started at boot
    pub launcher: String,
    /// Default tick rate in Hz
    pub tick_rate: f64,
    /// Per-app stop timeout
    pub stop_timeout: Duration,
    /// Timeout applied to each app at shutdown
    pub stop_all_timeout: Duration,
    /// Bounded wait for an instance lock during key fan-out
    pub dispatch_timeout: Duration,
}

/// Effective host configuration
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Filesystem locations
    pub paths: PathsConfig,
    /// Display settings
    pub display: DisplayConfig,
    /// Speech settings
    pub speech: SpeechConfig,
    /// Keyboard discovery policy
    pub input: InputConfig,
    /// Lifecycle settings
    pub apps: AppsConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for HostConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|p| p.join("proxi"))
            .unwrap_or_else(|| PathBuf::from("data"));
        Self {
            paths: PathsConfig {
                apps_dir: PathBuf::from("apps"),
                cache_dir: data_dir.join("tts_cache"),
                icon_dir: None,
                font_regular: PathBuf::from("fonts/Regular.ttf"),
                font_bold: PathBuf::from("fonts/Bold.ttf"),
                font_small: PathBuf::from("fonts/Small.ttf"),
                data_dir,
            },
            display: DisplayConfig {
                width: 128,
                height: 64,
                render_interval: DisplayTiming::default().render_interval,
                blink_interval: DisplayTiming::default().blink_interval,
                contrast: None,
                backend: DisplayBackend::default(),
            },
            speech: SpeechConfig {
                binary: PathBuf::from("piper/piper"),
                model: PathBuf::from("piper/voice.onnx"),
                extra_args: Vec::new(),
                response_timeout: SynthTiming::default().response_timeout,
                settle: SynthTiming::default().settle,
                delimiter: None,
                sample_rate: 22050,
                player: "aplay".to_string(),
                word_map: HashMap::new(),
            },
            input: InputConfig::default(),
            apps: AppsConfig {
                launcher: "launcher".to_string(),
                tick_rate: 20.0,
                stop_timeout: ManagerSettings::default().stop_timeout,
                stop_all_timeout: Duration::from_secs(2),
                dispatch_timeout: ManagerSettings::default().dispatch_timeout,
            },
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl HostConfig {
    /// Configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Compositor timers
    #[must_use]
    pub fn display_timing(&self) -> DisplayTiming {
        DisplayTiming {
            render_interval: self.display.render_interval,
            blink_interval: self.display.blink_interval,
        }
    }

    /// Command line for the synthesis process
    #[must_use]
    pub fn synth_command(&self) -> SynthCommand {
        SynthCommand::piper(
            self.speech.binary.clone(),
            &self.speech.model,
            &self.speech.extra_args,
        )
    }

    /// Response framing for the synthesis process
    #[must_use]
    pub fn synth_framing(&self) -> Framing {
        match &self.speech.delimiter {
            Some(marker) => Framing::Delimiter(marker.as_bytes().to_vec()),
            None => Framing::Quiescence,
        }
    }

    /// Synthesis timeouts
    #[must_use]
    pub fn synth_timing(&self) -> SynthTiming {
        SynthTiming {
            response_timeout: self.speech.response_timeout,
            settle: self.speech.settle,
        }
    }

    /// Pronunciation map
    #[must_use]
    pub fn word_map(&self) -> WordMap {
        WordMap::new(self.speech.word_map.clone())
    }

    /// Lifecycle manager tunables
    #[must_use]
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            dispatch_timeout: self.apps.dispatch_timeout,
            stop_timeout: self.apps.stop_timeout,
        }
    }

    /// Check invariants the rest of the host relies on
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::ValidationError(format!(
                "display size {}x{} is empty",
                self.display.width, self.display.height
            )));
        }
        if !self.apps.tick_rate.is_finite() || self.apps.tick_rate <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "tick rate {} must be positive",
                self.apps.tick_rate
            )));
        }
        if self.display.render_interval.is_zero() || self.display.blink_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "display intervals must be non-zero".to_string(),
            ));
        }
        if self.speech.delimiter.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(
                "speech delimiter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// `$XDG_CONFIG_HOME/proxi/host.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("proxi").join("host.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or the result fails validation.
pub fn load_config() -> Result<HostConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<HostConfig, ConfigError> {
    let mut config = load_file(path)?;
    apply_env_with(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn load_file(path: Option<PathBuf>) -> Result<HostConfig, ConfigError> {
    let mut config = HostConfig::default();
    let Some(config_path) = path else {
        return Ok(config);
    };
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "Config file not found, using defaults");
        return Ok(config);
    }

    let toml_content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
            path: config_path.clone(),
            source: e,
        })?;
    let toml_config: HostToml = toml::from_str(&toml_content)?;
    apply_toml_config(&mut config, toml_config);
    config.config_file_path = Some(config_path.clone());
    config.source = ConfigSource::File;

    tracing::info!(path = %config_path.display(), "Loaded configuration from file");
    Ok(config)
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn retries(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut HostConfig, toml: HostToml) {
    let HostToml {
        paths,
        display,
        speech,
        input,
        apps,
    } = toml;

    if let Some(dir) = paths.data_dir {
        config.paths.cache_dir = dir.join("tts_cache");
        config.paths.data_dir = dir;
    }
    if let Some(dir) = paths.apps_dir {
        config.paths.apps_dir = dir;
    }
    if let Some(dir) = paths.cache_dir {
        config.paths.cache_dir = dir;
    }
    if paths.icon_dir.is_some() {
        config.paths.icon_dir = paths.icon_dir;
    }
    if let Some(font) = paths.font_regular {
        config.paths.font_regular = font;
    }
    if let Some(font) = paths.font_bold {
        config.paths.font_bold = font;
    }
    if let Some(font) = paths.font_small {
        config.paths.font_small = font;
    }

    if let Some(width) = display.width {
        config.display.width = width;
    }
    if let Some(height) = display.height {
        config.display.height = height;
    }
    if let Some(ms) = display.render_interval_ms {
        config.display.render_interval = millis(ms);
    }
    if let Some(ms) = display.blink_interval_ms {
        config.display.blink_interval = millis(ms);
    }
    if display.contrast.is_some() {
        config.display.contrast = display.contrast;
    }
    if let Some(backend) = display.backend {
        config.display.backend = backend;
    }

    if let Some(binary) = speech.binary {
        config.speech.binary = binary;
    }
    if let Some(model) = speech.model {
        config.speech.model = model;
    }
    if let Some(args) = speech.extra_args {
        config.speech.extra_args = args;
    }
    if let Some(ms) = speech.response_timeout_ms {
        config.speech.response_timeout = millis(ms);
    }
    if let Some(ms) = speech.settle_ms {
        config.speech.settle = millis(ms);
    }
    if speech.delimiter.is_some() {
        config.speech.delimiter = speech.delimiter;
    }
    if let Some(rate) = speech.sample_rate {
        config.speech.sample_rate = rate;
    }
    if let Some(player) = speech.player {
        config.speech.player = player;
    }
    if let Some(words) = speech.word_map {
        config.speech.word_map = words;
    }

    if let Some(key) = input.shift_key {
        config.input.shift_key = KeyId::new(key);
    }
    if let Some(ms) = input.retry_delay_ms {
        config.input.retry_delay = millis(ms);
    }
    if let Some(max) = input.max_retries {
        config.input.max_retries = retries(max);
    }
    if let Some(ms) = input.reconnect_delay_ms {
        config.input.reconnect_delay = millis(ms);
    }
    if let Some(ms) = input.no_keyboard_delay_ms {
        config.input.no_keyboard_delay = millis(ms);
    }

    if let Some(launcher) = apps.launcher {
        config.apps.launcher = launcher;
    }
    if let Some(hz) = apps.tick_rate {
        config.apps.tick_rate = hz;
    }
    if let Some(ms) = apps.stop_timeout_ms {
        config.apps.stop_timeout = millis(ms);
    }
    if let Some(ms) = apps.stop_all_timeout_ms {
        config.apps.stop_all_timeout = millis(ms);
    }
    if let Some(ms) = apps.dispatch_timeout_ms {
        config.apps.dispatch_timeout = millis(ms);
    }
}

/// Apply `PROXI_*` overrides read through `lookup`
fn apply_env_with(config: &mut HostConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup("PROXI_APPS_DIR") {
        config.paths.apps_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = lookup("PROXI_CACHE_DIR") {
        config.paths.cache_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = lookup("PROXI_DATA_DIR") {
        config.paths.data_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(backend) = lookup("PROXI_DISPLAY") {
        match backend.parse() {
            Ok(backend) => {
                config.display.backend = backend;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring PROXI_DISPLAY"),
        }
    }
    if let Some(binary) = lookup("PROXI_PIPER_BIN") {
        config.speech.binary = PathBuf::from(binary);
        config.source = ConfigSource::Env;
    }
    if let Some(model) = lookup("PROXI_PIPER_MODEL") {
        config.speech.model = PathBuf::from(model);
        config.source = ConfigSource::Env;
    }
    if let Some(key) = lookup("PROXI_SHIFT_KEY") {
        config.input.shift_key = KeyId::new(key);
        config.source = ConfigSource::Env;
    }
    if let Some(rate) = lookup("PROXI_TICK_RATE") {
        if let Ok(hz) = rate.parse::<f64>() {
            config.apps.tick_rate = hz;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(launcher) = lookup("PROXI_LAUNCHER") {
        config.apps.launcher = launcher;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// CLI overrides applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Display backend override
    pub backend: Option<DisplayBackend>,
    /// Apps directory override
    pub apps_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set display backend override
    #[must_use]
    pub fn with_backend(mut self, backend: DisplayBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set apps directory override
    #[must_use]
    pub fn with_apps_dir(mut self, dir: PathBuf) -> Self {
        self.apps_dir = Some(dir);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut HostConfig) {
        if self.backend.is_some() || self.apps_dir.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(backend) = self.backend {
            config.display.backend = backend;
        }
        if let Some(ref dir) = self.apps_dir {
            config.paths.apps_dir = dir.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();

        assert_eq!(config.display.width, 128);
        assert_eq!(config.display.height, 64);
        assert_eq!(config.display.render_interval, Duration::from_millis(100));
        assert_eq!(config.display.blink_interval, Duration::from_millis(500));
        assert_eq!(config.speech.response_timeout, Duration::from_secs(4));
        assert_eq!(config.speech.sample_rate, 22050);
        assert_eq!(config.input.max_retries, Some(24));
        assert_eq!(config.apps.launcher, "launcher");
        assert_eq!(config.apps.tick_rate, 20.0);
        assert_eq!(config.synth_framing(), Framing::Quiescence);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_file(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    // =========================================================================
    // File Loading Tests
    // =========================================================================

    #[test]
    fn test_file_values_apply() {
        let file = write_config(
            r#"
            [paths]
            data_dir = "/srv/proxi"

            [display]
            width = 256
            backend = "headless"

            [speech]
            delimiter = "<<END>>"
            settle_ms = 50

            [speech.word_map]
            proxi = "proxy"

            [input]
            max_retries = -1
            shift_key = "KEY_RIGHTSHIFT"

            [apps]
            tick_rate = 30.0
            dispatch_timeout_ms = 100
            "#,
        );
        let config = load_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.paths.data_dir, PathBuf::from("/srv/proxi"));
        assert_eq!(config.paths.cache_dir, PathBuf::from("/srv/proxi/tts_cache"));
        assert_eq!(config.display.width, 256);
        assert_eq!(config.display.height, 64);
        assert_eq!(config.display.backend, DisplayBackend::Headless);
        assert_eq!(
            config.synth_framing(),
            Framing::Delimiter(b"<<END>>".to_vec())
        );
        assert_eq!(config.speech.settle, Duration::from_millis(50));
        assert_eq!(config.word_map().apply("hi proxi"), "hi proxy");
        assert_eq!(config.input.max_retries, None);
        assert_eq!(config.input.shift_key, KeyId::from("KEY_RIGHTSHIFT"));
        assert_eq!(config.manager_settings().dispatch_timeout, Duration::from_millis(100));
        assert_eq!(config.apps.tick_rate, 30.0);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let file = write_config("[display\nwidth = ");
        let err = load_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = HostConfig::default();
        config.apps.tick_rate = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = HostConfig::default();
        config.display.height = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Override Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[apps]\nlauncher = \"from-file\"\n");
        let mut config = load_file(Some(file.path().to_path_buf())).unwrap();

        let env: HashMap<&str, &str> = [
            ("PROXI_LAUNCHER", "from-env"),
            ("PROXI_DISPLAY", "headless"),
            ("PROXI_TICK_RATE", "not-a-number"),
        ]
        .into_iter()
        .collect();
        apply_env_with(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.apps.launcher, "from-env");
        assert_eq!(config.display.backend, DisplayBackend::Headless);
        assert_eq!(config.apps.tick_rate, 20.0);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = HostConfig::default();
        apply_env_with(&mut config, |key| {
            (key == "PROXI_APPS_DIR").then(|| "/env/apps".to_string())
        });
        ConfigOverrides::new()
            .with_apps_dir(PathBuf::from("/cli/apps"))
            .apply(&mut config);

        assert_eq!(config.paths.apps_dir, PathBuf::from("/cli/apps"));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!(
            "Terminal".parse::<DisplayBackend>().unwrap(),
            DisplayBackend::Terminal
        );
        assert!("vga".parse::<DisplayBackend>().is_err());
    }
}
