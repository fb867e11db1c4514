//! # Output Configuration
//!
//! This module controls how the CLI presents itself: whether colors and
//! emojis are used, and how a failed command is reported.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Error report
//!
//! Whatever error reaches `main` is printed once, as a banner naming the
//! error kind, the summary, and the chain of causes:
//!
//! ```text
//! ⛔⛔ ERROR ⛔⛔
//!
//! ⛔ Error Type:
//!   GitStateError
//!
//! ⛔ Error Summary:
//!   Repository 'nav' has uncommitted changes.
//! ```

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `--color=always` forces colors on (overriding `NO_COLOR`),
    /// `--color=never` forces them off, and `--color=auto` detects support
    /// from the environment and the terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// A failed command, ready to be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: String,
    pub summary: String,
    /// Underlying causes, outermost first.
    pub causes: Vec<String>,
}

impl ErrorReport {
    pub fn new(kind: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            summary: summary.into(),
            causes: Vec::new(),
        }
    }

    pub fn render(&self, config: &OutputConfig) -> String {
        let marker = emoji(config, "⛔", "!!");
        let title = format!("{marker}{marker} ERROR {marker}{marker}");
        let title = if config.use_color {
            style(title).red().bold().to_string()
        } else {
            title
        };

        let indent = |text: &str| {
            text.trim_end()
                .lines()
                .map(|line| format!("  {}", line))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut out = format!(
            "\n{}\n\n{} Error Type:\n{}\n\n{} Error Summary:\n{}\n",
            title,
            marker,
            indent(&self.kind),
            marker,
            indent(&self.summary)
        );
        if !self.causes.is_empty() {
            out.push_str(&format!("\n{} Caused by:\n", marker));
            for cause in &self.causes {
                out.push_str(&indent(cause));
                out.push('\n');
            }
        }
        out
    }
}
