//! # Output Configuration
//!
//! Controls how command summaries look on the terminal: colored status
//! markers when the terminal supports them, bracketed plain-text markers
//! otherwise.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```
//! use bundle_reconcile::output::{emoji, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("never");
//! assert_eq!(emoji(&config, "✅", "[OK]"), "[OK]");
//! ```

use std::env;
use std::fmt::Write;
use std::str::FromStr;

use console::style;

use crate::catalog::CatalogReport;

/// The `--color` flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    Always,
    Never,
    #[default]
    Auto,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            "auto" => Ok(ColorChoice::Auto),
            other => Err(format!("unknown color choice '{}'", other)),
        }
    }
}

impl ColorChoice {
    /// Decide whether to color. `Auto` consults `lookup` for the color
    /// variables first and only asks `terminal` when none of them decides.
    pub fn resolve<L, T>(self, lookup: L, terminal: T) -> bool
    where
        L: Fn(&str) -> Option<String>,
        T: FnOnce() -> bool,
    {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => color_from_env(lookup).unwrap_or_else(terminal),
        }
    }
}

/// Applies the color variables in precedence order. `None` leaves the
/// decision to the terminal.
fn color_from_env<L>(lookup: L) -> Option<bool>
where
    L: Fn(&str) -> Option<String>,
{
    // NO_COLOR counts even when empty
    if lookup("NO_COLOR").is_some() {
        return Some(false);
    }
    if lookup("CLICOLOR").as_deref() == Some("0") {
        return Some(false);
    }
    if lookup("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return Some(true);
    }
    if lookup("TERM").as_deref() == Some("dumb") {
        return Some(false);
    }
    None
}

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from the process environment and the
    /// raw `--color` value. Unknown values behave like `auto`.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let choice = color_flag.parse().unwrap_or_default();
        Self::from_choice(choice)
    }

    pub fn from_choice(choice: ColorChoice) -> Self {
        let use_color = choice.resolve(
            |name| env::var_os(name).map(|v| v.to_string_lossy().into_owned()),
            || console::Term::stdout().features().colors_supported(),
        );
        Self { use_color }
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
        Self::from_choice(ColorChoice::Auto)
    }
}

/// Returns `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// One line per platform: every platform either passes or lists what is
/// missing and what is misplaced.
pub fn catalog_summary(config: &OutputConfig, report: &CatalogReport) -> String {
    let mut summary = String::new();

    for (platform, missing) in report.missing.iter() {
        let misplaced = report.misplaced.items(platform);
        if missing.is_empty() && misplaced.is_empty() {
            let _ = writeln!(
                summary,
                "{} {}: all expected bundles present",
                emoji(config, "✅", "[OK]"),
                platform
            );
            continue;
        }

        let marker = emoji(config, "❌", "[ERR]");
        let marker = if config.use_color {
            style(marker).red().to_string()
        } else {
            marker.to_string()
        };
        if !missing.is_empty() {
            let _ = writeln!(summary, "{} {}: missing {}", marker, platform, missing.join(", "));
        }
        if !misplaced.is_empty() {
            let _ = writeln!(
                summary,
                "{} {}: not supported on this platform {}",
                marker,
                platform,
                misplaced.join(", ")
            );
        }
    }

    summary
}
