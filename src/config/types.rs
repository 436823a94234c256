//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Control surface and lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unix socket the control surface listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// User whose session hosts the overlay window
    #[serde(default)]
    pub primary_user: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            primary_user: 0,
        }
    }
}

/// Default socket location: `$XDG_RUNTIME_DIR/builtin-broker.sock`
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("builtin-broker.sock")
}

/// Virtual display device configuration
///
/// Resolution and density are fixed (see
/// [`vdisplay::DISPLAY_WIDTH`](crate::vdisplay::DISPLAY_WIDTH)); unknown keys
/// are rejected so a stale `width` or `density_dpi` entry fails loudly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Display name reported to the display manager
    pub name: String,

    /// Create the device as soon as the host surface is ready instead of
    /// waiting for an explicit CREATE
    pub auto_create: bool,

    /// Prevent the display from stealing top focus
    pub steal_top_focus_disabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            name: "virtual-display".to_string(),
            auto_create: false,
            steal_top_focus_disabled: false,
        }
    }
}

/// Overlay window placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,

    /// Horizontal offset from the trailing edge, in pixels. Negative values
    /// push the window off-screen.
    pub offset_x: i32,

    /// Keep the window visible in every user session
    pub show_for_all_users: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "display-container".to_string(),
            offset_x: -640,
            show_for_all_users: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("error", "warn", "info", "debug", "trace")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    pub format: String,

    /// Optional log file, written in addition to stdout
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}
