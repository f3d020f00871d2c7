//! CLI command implementations.

pub mod config;
pub mod demo;
pub mod info;

/// Render a section heading, colorized when the feature is enabled.
#[cfg(feature = "colorized_output")]
pub(crate) fn heading(text: &str) -> String {
    console::style(text).bold().cyan().to_string()
}

/// Render a section heading, colorized when the feature is enabled.
#[cfg(not(feature = "colorized_output"))]
pub(crate) fn heading(text: &str) -> String {
    text.to_string()
}
