//! Package configuration module.
//!
//! Handles loading, validating, and merging `scorm.toml`. A config file is
//! sparse: stock defaults are the base layer and the file overrides only the
//! keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [course]
//! default_pass_mark = 80        # Used when the document carries no passMark
//!
//! [runtime]
//! navigation_mode = "linear"    # "linear" or "free"
//! allow_retake = true           # Assessment may be re-submitted
//! show_progress = true          # Progress bar in the launch page
//! show_outline = true           # Sidebar outline in the launch page
//! autoplay_audio = true         # Try narration playback on page entry
//! font_size = "medium"          # small | medium | large
//!
//! [package]
//! identifier_prefix = "course"  # Manifest identifier prefix
//! compress_media = false        # Deflate media entries too
//!
//! [colors]
//! primary = "#8fbb40"
//! secondary = "#241f20"
//! background = "#ffffff"
//! text = "#1a1a1a"
//! correct = "#2e7d32"
//! incorrect = "#c62828"
//!
//! [processing]
//! max_fetches = 4               # Max parallel asset loads (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Package configuration loaded from `scorm.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScormConfig {
    pub course: CourseConfig,
    /// Behavior of the emitted runtime and launch page.
    pub runtime: RuntimeConfig,
    pub package: PackageConfig,
    /// Colors emitted as CSS custom properties.
    pub colors: ColorConfig,
    /// Parallel asset loading settings.
    pub processing: ProcessingConfig,
}

impl ScormConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.course.default_pass_mark > 100 {
            return Err(ConfigError::Validation(
                "course.default_pass_mark must be 0-100".into(),
            ));
        }
        if crate::naming::slugify(&self.package.identifier_prefix).is_empty() {
            return Err(ConfigError::Validation(
                "package.identifier_prefix must contain at least one letter or digit".into(),
            ));
        }
        if self.processing.max_fetches == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_fetches must be at least 1".into(),
            ));
        }
        for (name, value) in self.colors.entries() {
            if !is_css_color(value) {
                return Err(ConfigError::Validation(format!(
                    "colors.{name} must be a hex color like #1a1a1a, got {value:?}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CourseConfig {
    /// Pass mark used when neither the course nor its assessment sets one.
    pub default_pass_mark: u8,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            default_pass_mark: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationMode {
    /// Next is blocked on a topic until its knowledge check is submitted.
    Linear,
    /// Next is never blocked.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

impl FontSize {
    pub fn to_css(self) -> &'static str {
        match self {
            FontSize::Small => "15px",
            FontSize::Medium => "17px",
            FontSize::Large => "20px",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub navigation_mode: NavigationMode,
    pub allow_retake: bool,
    pub show_progress: bool,
    pub show_outline: bool,
    pub autoplay_audio: bool,
    pub font_size: FontSize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            navigation_mode: NavigationMode::Linear,
            allow_retake: true,
            show_progress: true,
            show_outline: true,
            autoplay_audio: true,
            font_size: FontSize::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Prefix of the manifest identifier (`<prefix>-<slug>-<hash>`).
    pub identifier_prefix: String,
    /// Deflate media entries. Off by default since audio/video/images are
    /// already compressed.
    pub compress_media: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            identifier_prefix: "course".to_string(),
            compress_media: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Buttons, progress bar, active outline entry.
    pub primary: String,
    /// Header and footer background.
    pub secondary: String,
    pub background: String,
    pub text: String,
    /// Knowledge-check feedback for a right answer.
    pub correct: String,
    /// Knowledge-check feedback for a wrong answer.
    pub incorrect: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "#8fbb40".to_string(),
            secondary: "#241f20".to_string(),
            background: "#ffffff".to_string(),
            text: "#1a1a1a".to_string(),
            correct: "#2e7d32".to_string(),
            incorrect: "#c62828".to_string(),
        }
    }
}

impl ColorConfig {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("background", &self.background),
            ("text", &self.text),
            ("correct", &self.correct),
            ("incorrect", &self.incorrect),
        ]
    }
}

fn is_css_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of assets loaded in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_fetches: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_fetches
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ScormConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ScormConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ScormConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from an optional `scorm.toml` path.
///
/// `None` yields the validated stock defaults. A path that does not exist is
/// an IO error: the caller asked for that file explicitly.
pub fn load_config(path: Option<&Path>) -> Result<ScormConfig, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `scorm.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# scorm-forge configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Course defaults
# ---------------------------------------------------------------------------
[course]
# Pass mark (0-100) used when the course document does not set passMark.
default_pass_mark = 80

# ---------------------------------------------------------------------------
# Runtime behavior
# ---------------------------------------------------------------------------
[runtime]
# "linear": Next is blocked on a topic until its knowledge check is submitted.
# "free": learners may move freely between pages.
navigation_mode = "linear"

# Allow the assessment to be submitted again after a result is shown.
allow_retake = true

# Show a progress bar and a sidebar outline in the launch page.
show_progress = true
show_outline = true

# Try to start narration when a page is entered. Browsers may block this;
# the play control then simply stays paused.
autoplay_audio = true

# Base font size: small, medium or large.
font_size = "medium"

# ---------------------------------------------------------------------------
# Packaging
# ---------------------------------------------------------------------------
[package]
# Prefix of the manifest identifier.
identifier_prefix = "course"

# Deflate media entries as well as text. Media is normally stored as-is.
compress_media = false

# ---------------------------------------------------------------------------
# Colors (emitted as CSS custom properties in styles/main.css)
# ---------------------------------------------------------------------------
[colors]
primary = "#8fbb40"       # Buttons, progress bar, active outline entry
secondary = "#241f20"     # Header and footer
background = "#ffffff"
text = "#1a1a1a"
correct = "#2e7d32"       # Right-answer feedback
incorrect = "#c62828"     # Wrong-answer feedback

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel asset loads (local reads and remote fetches).
# Omit or comment out to auto-detect (= number of CPU cores).
# max_fetches = 4
"##
}

/// Generate CSS custom properties from color and font settings.
pub fn generate_color_css(colors: &ColorConfig, font_size: FontSize) -> String {
    format!(
        r#":root {{
    --color-primary: {primary};
    --color-secondary: {secondary};
    --color-bg: {background};
    --color-text: {text};
    --color-correct: {correct};
    --color-incorrect: {incorrect};
    --font-size-base: {font_size};
}}"#,
        primary = colors.primary,
        secondary = colors.secondary,
        background = colors.background,
        text = colors.text,
        correct = colors.correct,
        incorrect = colors.incorrect,
        font_size = font_size.to_css(),
    )
}
