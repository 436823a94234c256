//! Virtual display controller state

use serde::Serialize;
use std::fmt;

use crate::host::{DisplayId, HostSurface, Surface, SurfaceControl, VirtualDisplay, WindowId};

/// A live device and the surface it renders into
pub(crate) struct ActiveDisplay {
    pub(crate) device: Box<dyn VirtualDisplay>,
    pub(crate) id: DisplayId,
    pub(crate) bound: Option<Surface>,
}

/// Mirror of the host surface placed under a caller layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MirrorSurface {
    /// Mirror layer
    pub control: SurfaceControl,
    /// Caller layer the mirror is parented under
    pub parent: SurfaceControl,
    /// Display the parent layer lives on
    pub parent_display: DisplayId,
}

/// Everything the controller owns
///
/// Guarded by a single lock shared by caller actions, UI worker tasks and
/// surface callbacks.
#[derive(Default)]
pub(crate) struct DisplayState {
    pub(crate) window: Option<WindowId>,
    pub(crate) host: Option<HostSurface>,
    pub(crate) device: Option<ActiveDisplay>,
    pub(crate) mirror: Option<MirrorSurface>,
}

impl DisplayState {
    pub(crate) fn phase(&self) -> DisplayPhase {
        match (&self.host, &self.device, &self.mirror) {
            (None, _, _) => DisplayPhase::Uninitialized,
            (Some(_), None, _) => DisplayPhase::SurfaceBound,
            (Some(_), Some(_), None) => DisplayPhase::DeviceActive,
            (Some(_), Some(_), Some(_)) => DisplayPhase::MirrorAttached,
        }
    }

    pub(crate) fn status(&self) -> DisplayStatus {
        DisplayStatus {
            phase: self.phase(),
            window: self.window,
            host_surface: self.host.map(|h| h.surface),
            display_id: self.device.as_ref().map(|d| d.id),
            bound_surface: self.device.as_ref().and_then(|d| d.bound),
            mirror: self.mirror,
        }
    }
}

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPhase {
    /// No host surface yet
    Uninitialized,
    /// Host surface ready, no device
    SurfaceBound,
    /// Device live
    DeviceActive,
    /// Device live and mirrored into a caller layer
    MirrorAttached,
}

impl fmt::Display for DisplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayPhase::Uninitialized => "uninitialized",
            DisplayPhase::SurfaceBound => "surface-bound",
            DisplayPhase::DeviceActive => "device-active",
            DisplayPhase::MirrorAttached => "mirror-attached",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayStatus {
    /// Lifecycle phase
    pub phase: DisplayPhase,
    /// Overlay window handle
    pub window: Option<WindowId>,
    /// Host surface backing the window
    pub host_surface: Option<Surface>,
    /// Logical id of the live device
    pub display_id: Option<DisplayId>,
    /// Surface the device renders into
    pub bound_surface: Option<Surface>,
    /// Current mirror
    pub mirror: Option<MirrorSurface>,
}
