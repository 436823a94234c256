//! Host handle and parameter types
//!
//! Opaque handles the host hands out, plus the parameter records used to ask
//! the window system and display manager for resources.

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output buffer a virtual display renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Surface(pub u64);

/// Compositor layer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceControl(pub u64);

/// Window handle returned by the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

/// Logical display identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// The primary (built-in) display
    pub const DEFAULT: DisplayId = DisplayId(0);
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Surface#{}", self.0)
    }
}

impl fmt::Display for SurfaceControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceControl#{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Window#{}", self.0)
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drawable region backing an overlay window
///
/// Handed to the [`SurfaceListener`](super::SurfaceListener) when the window
/// system realizes the window. `control` is the layer that can be mirrored,
/// `surface` is the buffer a virtual display can render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSurface {
    /// Window the surface belongs to
    pub window: WindowId,
    /// Compositor layer of the window content
    pub control: SurfaceControl,
    /// Output buffer of the window content
    pub surface: Surface,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Density of the screen the window is shown on, in dots per inch
    pub density_dpi: u32,
}

/// Buffer pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit RGBA
    Rgba8888,
    /// 32-bit RGBX
    Rgbx8888,
    /// 16-bit RGB
    Rgb565,
}

/// Virtual display behaviour flags
#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VirtualDisplayFlag {
    /// Enumerable by other processes
    Public = 1 << 0,
    /// Shows only its own content, never mirrors another display
    OwnContentOnly = 1 << 3,
    /// Accepts touch input
    SupportsTouch = 1 << 6,
    /// Rotates with its content
    RotatesWithContent = 1 << 7,
    /// Shows system decorations (bars, launcher)
    ShouldShowSystemDecorations = 1 << 9,
    /// Trusted display, may host system windows
    Trusted = 1 << 10,
    /// Owns its own display group
    OwnDisplayGroup = 1 << 11,
    /// Never shows the lock screen
    AlwaysUnlocked = 1 << 12,
    /// Keeps its own input focus
    OwnFocus = 1 << 14,
    /// Cannot steal top focus from other displays
    StealTopFocusDisabled = 1 << 16,
}

/// Overlay window behaviour flags
#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WindowFlag {
    /// Window content extends behind system bars
    DrawsSystemBarBackgrounds = 1 << 0,
    /// Window never takes input focus
    NotFocusable = 1 << 1,
    /// Receives touches outside its bounds as outside events
    WatchOutsideTouch = 1 << 2,
    /// Positioned in screen coordinates
    LayoutInScreen = 1 << 3,
    /// May extend outside the screen
    LayoutNoLimits = 1 << 4,
    /// Touches may be split across windows
    SplitTouch = 1 << 5,
}

/// Window layer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowType {
    /// Always-on overlay layer above applications
    ApplicationOverlay,
}

/// Horizontal anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalGravity {
    /// Leading edge
    Start,
    /// Centered
    Center,
    /// Trailing edge
    End,
}

/// Vertical anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalGravity {
    /// Top edge
    Top,
    /// Centered
    Center,
    /// Bottom edge
    Bottom,
}

/// Placement request for an overlay window
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayWindowParams {
    /// Window title
    pub title: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Layer type
    pub window_type: WindowType,
    /// Behaviour flags
    pub flags: BitFlags<WindowFlag>,
    /// Buffer format
    pub format: PixelFormat,
    /// Visible in every user session
    pub show_for_all_users: bool,
    /// Horizontal offset from the anchor, in pixels
    pub x: i32,
    /// Vertical offset from the anchor, in pixels
    pub y: i32,
    /// Horizontal anchor
    pub horizontal: HorizontalGravity,
    /// Vertical anchor
    pub vertical: VerticalGravity,
}

/// Virtual display creation request
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDisplayConfig {
    /// Display name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Density in dots per inch
    pub density_dpi: u32,
    /// Behaviour flags
    pub flags: BitFlags<VirtualDisplayFlag>,
    /// Initial output surface
    pub surface: Option<Surface>,
}
