//! Stylesheet generation for `styles/main.css`.
//!
//! The base rules are embedded at compile time; the color and font-size custom
//! properties from `[colors]` and `[runtime].font_size` are prepended.

use crate::config::{self, ScormConfig};

const BASE_CSS: &str = include_str!("../static/main.css");

pub fn generate_stylesheet(config: &ScormConfig) -> String {
    let vars = config::generate_color_css(&config.colors, config.runtime.font_size);
    format!("{vars}\n\n{BASE_CSS}")
}
