//! Host Platform Seams
//!
//! The broker never talks to a window system or compositor directly. Every
//! host resource goes through the traits in this module:
//!
//! ```text
//! VirtualDisplayController
//!   ├─> WindowSystem    (overlay window → HostSurface via SurfaceListener)
//!   ├─> DisplayManager  (VirtualDisplay devices, DisplayListener events)
//!   └─> Compositor      (mirror layers, atomic Transactions)
//! ```
//!
//! # Callback delivery
//!
//! Implementations deliver [`SurfaceListener`] and [`DisplayListener`]
//! callbacks on the UI worker, never synchronously from inside a trait call.
//! Callers are allowed to hold their own locks across any method here.
//!
//! [`HeadlessHost`] is an in-memory implementation used by the binary and
//! the test suites.

mod error;
mod headless;
mod transaction;
mod types;

pub use error::HostError;
pub use headless::{HeadlessHost, HostEvent, LayerInfo, SCREEN_DENSITY_DPI};
pub use transaction::{Transaction, TransactionOp};
pub use types::{
    DisplayId, HorizontalGravity, HostSurface, OverlayWindowParams, PixelFormat, Surface,
    SurfaceControl, VerticalGravity, VirtualDisplayConfig, VirtualDisplayFlag, WindowFlag,
    WindowId, WindowType,
};

use std::sync::Arc;

/// Receives lifecycle callbacks for an overlay window's surface
pub trait SurfaceListener: Send + Sync {
    /// Surface became drawable
    fn surface_created(&self, surface: HostSurface);

    /// Surface format or size changed
    fn surface_changed(&self, format: PixelFormat, width: u32, height: u32);

    /// Surface is about to go away
    ///
    /// The surface stays valid until this returns.
    fn surface_destroyed(&self);
}

/// Receives display topology notifications
pub trait DisplayListener: Send + Sync {
    /// A display appeared
    fn display_added(&self, display: DisplayId);

    /// A display went away
    fn display_removed(&self, display: DisplayId);

    /// A display changed (surface, size, state)
    fn display_changed(&self, display: DisplayId);
}

/// Places windows into the overlay layer
pub trait WindowSystem: Send + Sync {
    /// Add an overlay window; surface callbacks follow on the UI worker
    fn add_window(
        &self,
        params: &OverlayWindowParams,
        listener: Arc<dyn SurfaceListener>,
    ) -> Result<WindowId, HostError>;

    /// Tear a window down; `surface_destroyed` follows on the UI worker
    fn remove_window(&self, window: WindowId) -> Result<(), HostError>;
}

/// Creates virtual display devices
pub trait DisplayManager: Send + Sync {
    /// Create a device; `None` on compositor-level failure
    fn create_virtual_display(&self, config: &VirtualDisplayConfig)
        -> Option<Box<dyn VirtualDisplay>>;

    /// Subscribe to display topology changes
    fn register_display_listener(&self, listener: Arc<dyn DisplayListener>);
}

/// A live virtual display device
pub trait VirtualDisplay: Send {
    /// Logical identifier, stable for the device's lifetime
    fn display_id(&self) -> DisplayId;

    /// Rebind the output surface in place
    fn set_surface(&mut self, surface: Option<Surface>);

    /// Release the device
    fn release(self: Box<Self>);
}

/// Layer-level compositor operations
pub trait Compositor: Send + Sync {
    /// Create a layer duplicating `source`'s content
    fn mirror_surface(&self, source: SurfaceControl) -> Option<SurfaceControl>;

    /// True while the layer is alive
    fn is_valid(&self, sc: SurfaceControl) -> bool;

    /// Apply every op atomically
    fn apply(&self, transaction: Transaction) -> Result<(), HostError>;
}

/// Bundle of host seams handed to controllers
#[derive(Clone)]
pub struct HostServices {
    /// Window placement
    pub windows: Arc<dyn WindowSystem>,
    /// Display devices
    pub displays: Arc<dyn DisplayManager>,
    /// Layer operations
    pub compositor: Arc<dyn Compositor>,
}
