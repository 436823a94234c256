//! Virtual Display Lifecycle Controller
//!
//! Coordinates three independently-lifecycled resources:
//!
//! ```text
//!  overlay window ──surface_created──> HostSurface ──CREATE──> VirtualDisplay
//!        │                                 │                        │
//!        │                                 └──ATTACH──> MirrorSurface (under caller layer)
//!        │                                                          │
//!        └──surface_destroyed──> release device ──> remove mirror ──> clear host
//! ```
//!
//! # Phases
//!
//! `Uninitialized → SurfaceBound → DeviceActive → MirrorAttached`
//!
//! - **Uninitialized**: no host surface. CREATE/ATTACH/RESET fail.
//! - **SurfaceBound**: host surface recorded, no device.
//! - **DeviceActive**: device bound to the host surface (or to a caller
//!   surface after REPARENT).
//! - **MirrorAttached**: a mirror of the host surface lives under a caller
//!   layer.
//!
//! The logical display id never changes across ATTACH/DETACH/REPARENT/RESET;
//! only the bound surface or the presence of a mirror does.
//!
//! # Threading
//!
//! All state sits behind one lock. Caller actions validate and mutate under
//! it on the calling thread. Mirror transactions (ATTACH/DETACH) are posted
//! to the [`UiWorker`] so they are strictly ordered with each other and with
//! surface callbacks, which the host also delivers on that worker. Posted
//! tasks re-check the state they depend on when they run.

mod actions;
mod placement;
mod state;

pub use actions::{
    UnknownAction, VirtualDisplayAction, ARG_DISPLAY_ID, ARG_PARENT_SURFACE, CONTROLLER_ID,
};
pub use placement::{
    display_flags, overlay_window_params, virtual_display_config, DISPLAY_DENSITY_DPI,
    DISPLAY_HEIGHT, DISPLAY_WIDTH,
};
pub use state::{DisplayPhase, DisplayStatus, MirrorSurface};

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

use crate::config::{DisplayConfig, WindowConfig};
use crate::controller::{ActionArgs, Controller, UserId};
use crate::host::{
    DisplayId, DisplayListener, HostServices, HostSurface, PixelFormat, Surface, SurfaceControl,
    SurfaceListener, Transaction,
};
use crate::service::identity::calling_identity;
use crate::service::{CallbackList, ServiceEvent};
use crate::worker::UiWorker;
use state::{ActiveDisplay, DisplayState};

/// Controller settings taken from configuration
#[derive(Debug, Clone)]
pub struct VirtualDisplaySettings {
    /// Device parameters
    pub display: DisplayConfig,
    /// Overlay window placement
    pub window: WindowConfig,
    /// User whose session hosts the overlay window
    pub primary_user: UserId,
}

struct Inner {
    host: HostServices,
    worker: UiWorker,
    settings: VirtualDisplaySettings,
    events: Arc<CallbackList>,
    state: Mutex<DisplayState>,
}

/// Owns the host surface, the virtual display device and the mirror
pub struct VirtualDisplayController {
    inner: Arc<Inner>,
}

impl VirtualDisplayController {
    /// Create a controller; nothing is allocated until lifecycle signals arrive
    pub fn new(
        host: HostServices,
        worker: UiWorker,
        settings: VirtualDisplaySettings,
        events: Arc<CallbackList>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                worker,
                settings,
                events,
                state: Mutex::new(DisplayState::default()),
            }),
        }
    }

    /// Read-only snapshot of the current state
    pub fn snapshot(&self) -> DisplayStatus {
        self.inner.state.lock().status()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> DisplayPhase {
        self.inner.state.lock().phase()
    }

    /// Logical id of the live device
    pub fn display_id(&self) -> Option<DisplayId> {
        self.inner.state.lock().device.as_ref().map(|d| d.id)
    }

    /// Create the device on the host surface
    ///
    /// Fails if a device already exists or no host surface is bound.
    pub fn create(&self) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(active) = &state.device {
            warn!(display = %active.id, "Virtual display already exists");
            return false;
        }
        let Some(host) = state.host else {
            warn!("No host surface to create display");
            return false;
        };
        self.inner.create_device_locked(&mut state, host.surface)
    }

    /// Release the device; always succeeds
    pub fn destroy(&self) -> bool {
        let mut state = self.inner.state.lock();
        Inner::destroy_device_locked(&mut state);
        true
    }

    /// Schedule a mirror of the host surface under `parent`
    ///
    /// Returns once the transaction is queued; its outcome is only logged.
    pub fn attach(&self, parent: SurfaceControl, parent_display: DisplayId) -> bool {
        {
            let state = self.inner.state.lock();
            if state.host.is_none() {
                warn!("No surface view to create display");
                return false;
            }
            if state.device.is_none() {
                warn!("No virtual display to mirror");
                return false;
            }
        }

        let inner = Arc::clone(&self.inner);
        match self
            .inner
            .worker
            .post(move || inner.attach_mirror(parent, parent_display))
        {
            Ok(()) => {
                debug!(%parent, %parent_display, "Mirror attach scheduled");
                true
            }
            Err(e) => {
                error!("Failed to schedule mirror attach: {}", e);
                false
            }
        }
    }

    /// Schedule removal of the mirror; always succeeds
    pub fn detach(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        if let Err(e) = self.inner.worker.post(move || inner.detach_mirror()) {
            warn!("Failed to schedule mirror detach: {}", e);
        }
        true
    }

    /// Rebind the device output to `surface` in place
    pub fn reparent(&self, surface: Surface) -> bool {
        let mut state = self.inner.state.lock();
        Inner::reparent_locked(&mut state, surface)
    }

    /// Rebind the device output to the host surface
    pub fn reset(&self) -> bool {
        let mut state = self.inner.state.lock();
        let Some(host) = state.host else {
            warn!("No host surface to reset display onto");
            return false;
        };
        Inner::reparent_locked(&mut state, host.surface)
    }

    fn surface_hooks(&self) -> Arc<dyn SurfaceListener> {
        Arc::new(SurfaceHooks {
            inner: Arc::downgrade(&self.inner),
        })
    }

    fn add_window(&self) {
        let mut state = self.inner.state.lock();
        if let Some(window) = state.window {
            debug!(%window, "Overlay window already present");
            return;
        }

        let settings = &self.inner.settings;
        let params = overlay_window_params(&settings.window);
        match self.inner.host.windows.add_window(&params, self.surface_hooks()) {
            Ok(window) => {
                info!(%window, title = %params.title, x = params.x, "Overlay window added");
                state.window = Some(window);
            }
            Err(e) => error!("Failed to add overlay window: {}", e),
        }
    }

    fn remove_window(&self) {
        let Some(window) = self.inner.state.lock().window.take() else {
            return;
        };
        match self.inner.host.windows.remove_window(window) {
            Ok(()) => info!(%window, "Overlay window removed"),
            Err(e) => warn!(%window, "Failed to remove overlay window: {}", e),
        }
    }
}

impl Controller for VirtualDisplayController {
    fn supported_actions(&self) -> &'static [&'static str] {
        VirtualDisplayAction::NAMES
    }

    fn apply(&self, action: &str, args: &ActionArgs) -> bool {
        trace!(caller = %calling_identity(), action, "apply");
        let Ok(action) = action.parse::<VirtualDisplayAction>() else {
            debug!("Noop for action {}", action);
            return true;
        };

        match action {
            VirtualDisplayAction::Create => self.create(),
            VirtualDisplayAction::Destroy => self.destroy(),
            VirtualDisplayAction::Attach => {
                let Some(parent) = args.get_surface_control(ARG_PARENT_SURFACE) else {
                    warn!("ATTACH without a {} layer handle", ARG_PARENT_SURFACE);
                    return false;
                };
                let parent_display = match args.get_int(ARG_DISPLAY_ID) {
                    None => DisplayId::DEFAULT,
                    Some(id) => match u32::try_from(id) {
                        Ok(id) => DisplayId(id),
                        Err(_) => {
                            warn!(id, "ATTACH with an invalid {}", ARG_DISPLAY_ID);
                            return false;
                        }
                    },
                };
                self.attach(parent, parent_display)
            }
            VirtualDisplayAction::Detach => self.detach(),
            VirtualDisplayAction::Reparent => {
                let Some(surface) = args.get_surface(ARG_PARENT_SURFACE) else {
                    warn!("REPARENT without a {} surface", ARG_PARENT_SURFACE);
                    return false;
                };
                self.reparent(surface)
            }
            VirtualDisplayAction::Reset => self.reset(),
        }
    }

    fn on_start(&self) {
        let hooks = Arc::new(DisplayHooks {
            events: Arc::clone(&self.inner.events),
        });
        debug!("Registering display listener");
        self.inner.host.displays.register_display_listener(hooks);
    }

    fn on_user_started(&self, user: UserId) {
        if user == self.inner.settings.primary_user {
            self.add_window();
        } else {
            trace!(%user, "Ignoring user start");
        }
    }

    fn on_user_stopped(&self, user: UserId) {
        if user == self.inner.settings.primary_user {
            self.remove_window();
        } else {
            trace!(%user, "Ignoring user stop");
        }
    }
}

impl Inner {
    fn create_device_locked(&self, state: &mut DisplayState, surface: Surface) -> bool {
        let config = virtual_display_config(&self.settings.display, surface);
        debug!(name = %config.name, "Creating display");
        match self.host.displays.create_virtual_display(&config) {
            Some(device) => {
                let id = device.display_id();
                info!(display = %id, %surface, "Created display: {}", id);
                state.device = Some(ActiveDisplay {
                    device,
                    id,
                    bound: Some(surface),
                });
                true
            }
            None => {
                info!("Failed to create display");
                false
            }
        }
    }

    fn destroy_device_locked(state: &mut DisplayState) {
        let Some(mut active) = state.device.take() else {
            return;
        };
        active.device.set_surface(None);
        active.device.release();
        info!(display = %active.id, "Released display");
    }

    fn reparent_locked(state: &mut DisplayState, surface: Surface) -> bool {
        let Some(active) = state.device.as_mut() else {
            warn!(%surface, "No virtual display to reparent");
            return false;
        };
        active.device.set_surface(Some(surface));
        active.bound = Some(surface);
        debug!(display = %active.id, %surface, "Display output rebound");
        true
    }

    fn attach_mirror(&self, parent: SurfaceControl, parent_display: DisplayId) {
        let mut state = self.state.lock();
        let Some(host) = state.host else {
            warn!("Host surface gone before mirror attach ran");
            return;
        };
        if state.device.is_none() {
            warn!("Virtual display gone before mirror attach ran");
            return;
        }

        let compositor = &self.host.compositor;
        let mirror = compositor.mirror_surface(host.control);
        info!(source = %host.control, mirror = ?mirror, "Mirror of display surface");
        let Some(mirror) = mirror.filter(|m| compositor.is_valid(*m)) else {
            warn!("Mirror surface invalid, nothing attached");
            return;
        };

        let previous = state.mirror.take();
        let mut tx = Transaction::new();
        if let Some(previous) = &previous {
            tx = tx.remove(previous.control);
        }
        let tx = tx.show(mirror).reparent(mirror, parent);

        match compositor.apply(tx) {
            Ok(()) => {
                state.mirror = Some(MirrorSurface {
                    control: mirror,
                    parent,
                    parent_display,
                });
                debug!(%mirror, %parent, replaced = previous.is_some(), "Mirror attached");
            }
            Err(e) => {
                warn!(%mirror, %parent, "Mirror transaction failed: {}", e);
                state.mirror = previous;
                if let Err(e) = compositor.apply(Transaction::new().remove(mirror)) {
                    debug!(%mirror, "Discarding unused mirror failed: {}", e);
                }
            }
        }
    }

    fn detach_mirror(&self) {
        let mut state = self.state.lock();
        Self::remove_mirror_locked(&self.host, &mut state);
    }

    fn remove_mirror_locked(host: &HostServices, state: &mut DisplayState) {
        let Some(mirror) = state.mirror.take() else {
            return;
        };
        match host.compositor.apply(Transaction::new().remove(mirror.control)) {
            Ok(()) => debug!(mirror = %mirror.control, "Mirror detached"),
            Err(e) => warn!(mirror = %mirror.control, "Mirror removal failed: {}", e),
        }
    }

    fn on_surface_created(&self, surface: HostSurface) {
        info!(
            surface = %surface.surface,
            control = %surface.control,
            density_dpi = surface.density_dpi,
            "surfaceCreated"
        );
        let mut state = self.state.lock();
        if let Some(previous) = state.host.replace(surface) {
            debug!(previous = %previous.surface, "Host surface replaced");
        }

        if self.settings.display.auto_create && state.device.is_none() {
            self.create_device_locked(&mut state, surface.surface);
        }
    }

    fn on_surface_changed(&self, format: PixelFormat, width: u32, height: u32) {
        info!(?format, width, height, "surfaceChanged");
        if let Some(host) = self.state.lock().host.as_mut() {
            host.width = width;
            host.height = height;
        }
    }

    fn on_surface_destroyed(&self) {
        info!("surfaceDestroyed");
        let mut state = self.state.lock();
        // Device first: it must never outlive the surface it renders into
        Self::destroy_device_locked(&mut state);
        Self::remove_mirror_locked(&self.host, &mut state);
        state.host = None;
    }
}

struct SurfaceHooks {
    inner: Weak<Inner>,
}

impl SurfaceListener for SurfaceHooks {
    fn surface_created(&self, surface: HostSurface) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_surface_created(surface);
        }
    }

    fn surface_changed(&self, format: PixelFormat, width: u32, height: u32) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_surface_changed(format, width, height);
        }
    }

    fn surface_destroyed(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_surface_destroyed();
        }
    }
}

struct DisplayHooks {
    events: Arc<CallbackList>,
}

impl DisplayListener for DisplayHooks {
    fn display_added(&self, id: DisplayId) {
        debug!("onDisplayAdded({})", id);
        self.events.broadcast(&ServiceEvent::DisplayAdded { display_id: id });
    }

    fn display_removed(&self, id: DisplayId) {
        trace!("onDisplayRemoved({})", id);
        self.events.broadcast(&ServiceEvent::DisplayRemoved { display_id: id });
    }

    fn display_changed(&self, id: DisplayId) {
        trace!("onDisplayChanged({})", id);
        self.events.broadcast(&ServiceEvent::DisplayChanged { display_id: id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use crate::service::{ActionCallback, CallbackError};

    fn controller() -> (UiWorker, HeadlessHost, VirtualDisplayController) {
        let worker = UiWorker::spawn("test-vdisplay").unwrap();
        let host = HeadlessHost::new(worker.clone());
        let controller = VirtualDisplayController::new(
            host.services(),
            worker.clone(),
            VirtualDisplaySettings {
                display: DisplayConfig::default(),
                window: WindowConfig::default(),
                primary_user: UserId::SYSTEM,
            },
            Arc::new(CallbackList::new()),
        );
        (worker, host, controller)
    }

    #[test]
    fn test_supported_actions() {
        let (worker, _host, controller) = controller();
        for name in ["CREATE", "DESTROY", "ATTACH", "DETACH", "REPARENT", "RESET"] {
            assert!(controller.supports_action(name));
        }
        assert!(!controller.supports_action("create"));
        worker.shutdown();
    }

    #[test]
    fn test_phase_walk() {
        let (worker, host, controller) = controller();
        assert_eq!(controller.phase(), DisplayPhase::Uninitialized);

        controller.on_user_started(UserId::SYSTEM);
        worker.flush().unwrap();
        assert_eq!(controller.phase(), DisplayPhase::SurfaceBound);

        assert!(controller.create());
        assert_eq!(controller.phase(), DisplayPhase::DeviceActive);

        let parent = host.create_layer("caller");
        assert!(controller.attach(parent, DisplayId::DEFAULT));
        worker.flush().unwrap();
        assert_eq!(controller.phase(), DisplayPhase::MirrorAttached);

        assert!(controller.detach());
        worker.flush().unwrap();
        assert_eq!(controller.phase(), DisplayPhase::DeviceActive);

        assert!(controller.destroy());
        assert_eq!(controller.phase(), DisplayPhase::SurfaceBound);
        worker.shutdown();
    }

    #[test]
    fn test_surface_resize_tracked() {
        let (worker, _host, controller) = controller();
        controller.on_user_started(UserId::SYSTEM);
        worker.flush().unwrap();

        controller.inner.on_surface_changed(PixelFormat::Rgba8888, 420, 600);
        let host = controller.inner.state.lock().host.unwrap();
        assert_eq!((host.width, host.height), (420, 600));
        assert_eq!(host.density_dpi, crate::host::SCREEN_DENSITY_DPI);
        worker.shutdown();
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ServiceEvent>>);

    impl ActionCallback for Recorder {
        fn on_event(&self, event: &ServiceEvent) -> Result<(), CallbackError> {
            self.0.lock().push(*event);
            Ok(())
        }
    }

    #[test]
    fn test_display_hooks_forward_display_id() {
        let events = Arc::new(CallbackList::new());
        let recorder = Arc::new(Recorder::default());
        let callback: Arc<dyn ActionCallback> = recorder.clone();
        assert!(events.register(&callback));

        let hooks = DisplayHooks { events };
        hooks.display_added(DisplayId(7));
        hooks.display_changed(DisplayId(7));
        hooks.display_removed(DisplayId(7));

        let id = DisplayId(7);
        assert_eq!(
            *recorder.0.lock(),
            vec![
                ServiceEvent::DisplayAdded { display_id: id },
                ServiceEvent::DisplayChanged { display_id: id },
                ServiceEvent::DisplayRemoved { display_id: id },
            ]
        );
    }

    #[test]
    fn test_hooks_outlived_by_host() {
        let (worker, _host, controller) = controller();
        let hooks = controller.surface_hooks();
        drop(controller);

        // Late callbacks after the controller is gone are ignored
        hooks.surface_destroyed();
        worker.shutdown();
    }
}
