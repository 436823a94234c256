//! Window and device parameters derived from configuration

use enumflags2::BitFlags;

use crate::config::{DisplayConfig, WindowConfig};
use crate::host::{
    HorizontalGravity, OverlayWindowParams, PixelFormat, Surface, VerticalGravity,
    VirtualDisplayConfig, VirtualDisplayFlag, WindowFlag, WindowType,
};

/// Virtual display width in pixels
pub const DISPLAY_WIDTH: u32 = 840;

/// Virtual display height in pixels
pub const DISPLAY_HEIGHT: u32 = 1200;

/// Virtual display density in dots per inch (160 = 1:1 dp)
pub const DISPLAY_DENSITY_DPI: u32 = 420;

/// Overlay window hosting the backing surface
///
/// Sized to the display resolution, anchored bottom-trailing and pushed
/// off-screen by `offset_x` so only a mirror is ever visible.
pub fn overlay_window_params(window: &WindowConfig) -> OverlayWindowParams {
    OverlayWindowParams {
        title: window.title.clone(),
        width: DISPLAY_WIDTH,
        height: DISPLAY_HEIGHT,
        window_type: WindowType::ApplicationOverlay,
        flags: WindowFlag::NotFocusable
            | WindowFlag::SplitTouch
            | WindowFlag::WatchOutsideTouch
            | WindowFlag::DrawsSystemBarBackgrounds
            | WindowFlag::LayoutNoLimits
            | WindowFlag::LayoutInScreen,
        format: PixelFormat::Rgba8888,
        show_for_all_users: window.show_for_all_users,
        x: window.offset_x,
        y: 0,
        horizontal: HorizontalGravity::End,
        vertical: VerticalGravity::Bottom,
    }
}

/// Flag set for the virtual display device
pub fn display_flags(display: &DisplayConfig) -> BitFlags<VirtualDisplayFlag> {
    let mut flags = VirtualDisplayFlag::Public
        | VirtualDisplayFlag::OwnContentOnly
        | VirtualDisplayFlag::RotatesWithContent
        | VirtualDisplayFlag::Trusted
        | VirtualDisplayFlag::OwnDisplayGroup
        | VirtualDisplayFlag::SupportsTouch
        | VirtualDisplayFlag::AlwaysUnlocked
        | VirtualDisplayFlag::OwnFocus
        | VirtualDisplayFlag::ShouldShowSystemDecorations;
    if display.steal_top_focus_disabled {
        flags |= VirtualDisplayFlag::StealTopFocusDisabled;
    }
    flags
}

/// Device creation request bound to `surface`
pub fn virtual_display_config(display: &DisplayConfig, surface: Surface) -> VirtualDisplayConfig {
    VirtualDisplayConfig {
        name: display.name.clone(),
        width: DISPLAY_WIDTH,
        height: DISPLAY_HEIGHT,
        density_dpi: DISPLAY_DENSITY_DPI,
        flags: display_flags(display),
        surface: Some(surface),
    }
}
