//! Status display and backlight port.

use thiserror::Error;

use crate::domain::Rgb;

/// Errors from the display driver.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display unavailable: {0}")]
    Unavailable(String),

    #[error("display write failed: {0}")]
    Write(String),
}

/// A small character display with an RGB backlight.
///
/// Calls are synchronous and cheap (a bus write). The feedback controller
/// treats every failure as best-effort.
pub trait DisplaySurface: Send + Sync {
    /// Set the backlight color.
    fn set_color(&self, color: Rgb) -> Result<(), DisplayError>;

    /// Replace the visible text. Callers pass at most 32 characters.
    fn write_text(&self, text: &str) -> Result<(), DisplayError>;

    /// Clear the text area.
    fn clear(&self) -> Result<(), DisplayError>;

    /// Turn the backlight off.
    fn off(&self) -> Result<(), DisplayError>;
}
