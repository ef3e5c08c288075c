//! Layout configuration.
//!
//! [`LayoutConfig`] carries the knobs of the soft-wrap algorithm. It is plain data so
//! the editor can embed it in its own settings file:
//!
//! ```toml
//! char_width = 7.5
//! box_width = 640.0
//! prefer_wrap_by_words = true
//! wrap_indent = true
//! ```
//!
//! Omitted keys fall back to [`LayoutConfig::default`]. Omitting `box_width` disables
//! wrapping, so every hard line becomes exactly one visual line.

use crate::LayoutError;
use serde::Deserialize;

/// Soft-wrap configuration consumed by
/// [`FixedWidthSoftWrapBuilder`](crate::FixedWidthSoftWrapBuilder).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Advance width of a single-width character in pixels.
    #[serde(default = "default_char_width")]
    pub char_width: f32,

    /// Width lines are wrapped to. `None` means no wrapping.
    pub box_width: Option<f32>,

    /// Break at the last whitespace before the overflow instead of at the
    /// overflowing character.
    #[serde(default = "default_true")]
    pub prefer_wrap_by_words: bool,

    /// Indent continuation lines by the leading whitespace of their hard line.
    #[serde(default = "default_true")]
    pub wrap_indent: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            char_width: default_char_width(),
            box_width: None,
            prefer_wrap_by_words: true,
            wrap_indent: true,
        }
    }
}

fn default_char_width() -> f32 {
    7.0
}

fn default_true() -> bool {
    true
}

impl LayoutConfig {
    /// Parse a config from TOML source.
    pub fn from_toml(source: &str) -> Result<Self, LayoutError> {
        toml::from_str(source).map_err(|err| LayoutError::Config(err.to_string()))
    }

    /// Width budget used by the wrapper; `f32::INFINITY` when wrapping is disabled.
    pub fn wrap_width(&self) -> f32 {
        match self.box_width {
            Some(width) if width > 0.0 => width,
            _ => f32::INFINITY,
        }
    }

    pub fn with_box_width(mut self, box_width: Option<f32>) -> Self {
        self.box_width = box_width;
        self
    }
}
