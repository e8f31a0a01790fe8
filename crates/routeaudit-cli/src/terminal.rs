//! Terminal styling and color detection.
//!
//! Diagnostics are colored by severity when the terminal supports ANSI
//! escapes. The palette resolves to empty strings otherwise, so renderers
//! can interpolate it unconditionally.

use routeaudit_lib::Severity;

/// ANSI escape codes used by the renderers.
pub mod colors {
    /// Reset all styling.
    pub const RESET: &str = "\x1b[0m";
    /// Bold red for errors.
    pub const RED_BOLD: &str = "\x1b[1;31m";
    /// Yellow for warnings.
    pub const YELLOW: &str = "\x1b[33m";
    /// Cyan for informational records.
    pub const CYAN: &str = "\x1b[36m";
    /// Gray for the subject context.
    pub const GRAY: &str = "\x1b[90m";
    /// Bright bold white for the summary line.
    pub const WHITE_BOLD: &str = "\x1b[1;97m";
}

/// Resolved color codes, either ANSI sequences or empty strings.
#[derive(Debug, Clone, Copy)]
pub struct ColorPalette {
    pub reset: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
    pub gray: &'static str,
    pub white_bold: &'static str,
}

impl ColorPalette {
    /// Create a palette with actual ANSI color codes.
    #[must_use]
    pub const fn colored() -> Self {
        Self {
            reset: colors::RESET,
            error: colors::RED_BOLD,
            warning: colors::YELLOW,
            info: colors::CYAN,
            gray: colors::GRAY,
            white_bold: colors::WHITE_BOLD,
        }
    }

    /// Create a palette with no colors (empty strings).
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            reset: "",
            error: "",
            warning: "",
            info: "",
            gray: "",
            white_bold: "",
        }
    }

    /// `colored()` if the terminal supports ANSI colors, otherwise `plain()`.
    #[must_use]
    pub fn detect() -> Self {
        if supports_color() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn severity(&self, severity: Severity) -> &'static str {
        match severity {
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::detect()
    }
}

/// Check if the terminal supports ANSI color codes.
///
/// This function respects:
/// - The `NO_COLOR` environment variable (https://no-color.org/)
/// - The `TERM=dumb` convention for non-capable terminals
#[must_use]
pub fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if let Ok(term) = std::env::var("TERM") {
        if term.eq_ignore_ascii_case("dumb") {
            return false;
        }
    }
    true
}
