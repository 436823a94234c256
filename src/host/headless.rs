//! Headless host
//!
//! In-memory window system, display manager and compositor. Keeps a layer
//! tree, hands out monotonically increasing handles, delivers listener
//! callbacks through the [`UiWorker`] and records everything it does in an
//! ordered [`HostEvent`] journal.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::error::HostError;
use super::transaction::{Transaction, TransactionOp};
use super::types::{
    DisplayId, HostSurface, OverlayWindowParams, Surface, SurfaceControl, VirtualDisplayConfig,
    WindowId,
};
use super::{
    Compositor, DisplayListener, DisplayManager, HostServices, SurfaceListener, VirtualDisplay,
    WindowSystem,
};
use crate::worker::UiWorker;

/// Something the headless host did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Overlay window placed
    WindowAdded {
        /// Window handle
        window: WindowId,
        /// Backing surface
        surface: Surface,
    },
    /// Overlay window torn down
    WindowRemoved {
        /// Window handle
        window: WindowId,
    },
    /// Window surface released, after `surface_destroyed` returned
    SurfaceReleased {
        /// Released surface
        surface: Surface,
    },
    /// Virtual display created
    DisplayCreated {
        /// New display
        display: DisplayId,
        /// Initial output surface
        surface: Option<Surface>,
    },
    /// Virtual display output rebound
    DisplaySurfaceSet {
        /// Display
        display: DisplayId,
        /// New output surface
        surface: Option<Surface>,
    },
    /// Virtual display released
    DisplayReleased {
        /// Display
        display: DisplayId,
    },
    /// Mirror layer created
    MirrorCreated {
        /// New mirror layer
        mirror: SurfaceControl,
        /// Mirrored layer
        source: SurfaceControl,
    },
    /// Transaction applied
    TransactionApplied(Vec<TransactionOp>),
}

/// Snapshot of a layer in the headless tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    /// Debug name
    pub name: String,
    /// Parent layer
    pub parent: Option<SurfaceControl>,
    /// Shown
    pub visible: bool,
    /// Layer this one mirrors
    pub mirror_of: Option<SurfaceControl>,
}

struct WindowRecord {
    params: OverlayWindowParams,
    control: SurfaceControl,
    surface: Surface,
    listener: Arc<dyn SurfaceListener>,
}

#[derive(Debug, Clone)]
struct DisplayRecord {
    name: String,
    surface: Option<Surface>,
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u64,
    next_display: u32,
    windows: HashMap<WindowId, WindowRecord>,
    displays: HashMap<DisplayId, DisplayRecord>,
    layers: HashMap<SurfaceControl, LayerInfo>,
    display_listeners: Vec<Arc<dyn DisplayListener>>,
    fail_next_display: bool,
    journal: Vec<HostEvent>,
}

impl HeadlessState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn add_layer(&mut self, name: String, mirror_of: Option<SurfaceControl>) -> SurfaceControl {
        let sc = SurfaceControl(self.handle());
        self.layers.insert(
            sc,
            LayerInfo {
                name,
                parent: None,
                visible: false,
                mirror_of,
            },
        );
        sc
    }

    fn remove_layer(&mut self, sc: SurfaceControl) {
        self.layers.remove(&sc);
        for layer in self.layers.values_mut() {
            if layer.parent == Some(sc) {
                layer.parent = None;
            }
        }
    }
}

struct Shared {
    state: Mutex<HeadlessState>,
    worker: UiWorker,
}

impl Shared {
    fn notify_displays(self: &Arc<Self>, notify: fn(&dyn DisplayListener, DisplayId), id: DisplayId) {
        let listeners = self.state.lock().display_listeners.clone();
        if listeners.is_empty() {
            return;
        }
        let posted = self.worker.post(move || {
            for listener in &listeners {
                notify(listener.as_ref(), id);
            }
        });
        if posted.is_err() {
            warn!(display = %id, "Dropping display notification, UI worker stopped");
        }
    }
}

/// Density of the simulated physical screen
pub const SCREEN_DENSITY_DPI: u32 = 420;

/// In-memory host
///
/// Cloning yields another handle to the same host.
#[derive(Clone)]
pub struct HeadlessHost {
    shared: Arc<Shared>,
}

impl HeadlessHost {
    /// Create a host delivering callbacks on `worker`
    pub fn new(worker: UiWorker) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(HeadlessState {
                    // Display 0 and 1 are taken by physical outputs
                    next_display: 2,
                    ..HeadlessState::default()
                }),
                worker,
            }),
        }
    }

    /// Seams backed by this host
    pub fn services(&self) -> HostServices {
        HostServices {
            windows: Arc::new(self.clone()),
            displays: Arc::new(self.clone()),
            compositor: Arc::new(self.clone()),
        }
    }

    /// Create a standalone layer, standing in for another process's surface
    pub fn create_layer(&self, name: &str) -> SurfaceControl {
        self.shared.state.lock().add_layer(name.to_string(), None)
    }

    /// Allocate a standalone output surface
    pub fn create_surface(&self) -> Surface {
        Surface(self.shared.state.lock().handle())
    }

    /// Make the next `create_virtual_display` call fail
    pub fn fail_next_display_creation(&self) {
        self.shared.state.lock().fail_next_display = true;
    }

    /// Everything recorded so far
    pub fn journal(&self) -> Vec<HostEvent> {
        self.shared.state.lock().journal.clone()
    }

    /// Forget the recorded journal
    pub fn clear_journal(&self) {
        self.shared.state.lock().journal.clear();
    }

    /// Snapshot of a layer
    pub fn layer(&self, sc: SurfaceControl) -> Option<LayerInfo> {
        self.shared.state.lock().layers.get(&sc).cloned()
    }

    /// Layers currently parented under `parent`
    pub fn children_of(&self, parent: SurfaceControl) -> Vec<SurfaceControl> {
        let state = self.shared.state.lock();
        let mut children: Vec<_> = state
            .layers
            .iter()
            .filter(|(_, layer)| layer.parent == Some(parent))
            .map(|(sc, _)| *sc)
            .collect();
        children.sort();
        children
    }

    /// Live mirror layers
    pub fn mirrors(&self) -> Vec<SurfaceControl> {
        let state = self.shared.state.lock();
        let mut mirrors: Vec<_> = state
            .layers
            .iter()
            .filter(|(_, layer)| layer.mirror_of.is_some())
            .map(|(sc, _)| *sc)
            .collect();
        mirrors.sort();
        mirrors
    }

    /// Live overlay windows
    pub fn windows(&self) -> Vec<WindowId> {
        self.shared.state.lock().windows.keys().copied().collect()
    }

    /// Placement a window was added with
    pub fn window_params(&self, window: WindowId) -> Option<OverlayWindowParams> {
        self.shared
            .state
            .lock()
            .windows
            .get(&window)
            .map(|w| w.params.clone())
    }

    /// Live virtual displays
    pub fn displays(&self) -> Vec<DisplayId> {
        let mut ids: Vec<_> = self.shared.state.lock().displays.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Output surface a display is bound to
    pub fn display_surface(&self, display: DisplayId) -> Option<Surface> {
        self.shared
            .state
            .lock()
            .displays
            .get(&display)
            .and_then(|d| d.surface)
    }
}

impl WindowSystem for HeadlessHost {
    fn add_window(
        &self,
        params: &OverlayWindowParams,
        listener: Arc<dyn SurfaceListener>,
    ) -> Result<WindowId, HostError> {
        if params.width == 0 || params.height == 0 {
            return Err(HostError::WindowRejected(format!(
                "'{}' has an empty size",
                params.title
            )));
        }

        let host_surface = {
            let mut state = self.shared.state.lock();
            let window = WindowId(state.handle());
            let control = state.add_layer(params.title.clone(), None);
            let surface = Surface(state.handle());
            state.windows.insert(
                window,
                WindowRecord {
                    params: params.clone(),
                    control,
                    surface,
                    listener: Arc::clone(&listener),
                },
            );
            state
                .journal
                .push(HostEvent::WindowAdded { window, surface });
            HostSurface {
                window,
                control,
                surface,
                width: params.width,
                height: params.height,
                density_dpi: SCREEN_DENSITY_DPI,
            }
        };
        debug!(window = %host_surface.window, title = %params.title, "Overlay window added");

        let format = params.format;
        self.shared
            .worker
            .post(move || {
                listener.surface_created(host_surface);
                listener.surface_changed(format, host_surface.width, host_surface.height);
            })
            .map_err(|_| HostError::WorkerUnavailable)?;

        Ok(host_surface.window)
    }

    fn remove_window(&self, window: WindowId) -> Result<(), HostError> {
        let record = self
            .shared
            .state
            .lock()
            .windows
            .remove(&window)
            .ok_or(HostError::UnknownWindow(window))?;
        debug!(%window, "Overlay window removal scheduled");

        let shared = Arc::clone(&self.shared);
        self.shared
            .worker
            .post(move || {
                record.listener.surface_destroyed();

                let mut state = shared.state.lock();
                state.remove_layer(record.control);
                state.journal.push(HostEvent::SurfaceReleased {
                    surface: record.surface,
                });
                state.journal.push(HostEvent::WindowRemoved { window });
            })
            .map_err(|_| HostError::WorkerUnavailable)
    }
}

impl DisplayManager for HeadlessHost {
    fn create_virtual_display(
        &self,
        config: &VirtualDisplayConfig,
    ) -> Option<Box<dyn VirtualDisplay>> {
        let id = {
            let mut state = self.shared.state.lock();
            if std::mem::take(&mut state.fail_next_display) {
                warn!(name = %config.name, "Virtual display creation refused");
                return None;
            }
            let id = DisplayId(state.next_display);
            state.next_display += 1;
            state.displays.insert(
                id,
                DisplayRecord {
                    name: config.name.clone(),
                    surface: config.surface,
                },
            );
            state.journal.push(HostEvent::DisplayCreated {
                display: id,
                surface: config.surface,
            });
            id
        };
        debug!(
            display = %id,
            name = %config.name,
            width = config.width,
            height = config.height,
            dpi = config.density_dpi,
            flags = ?config.flags,
            "Virtual display created"
        );
        self.shared.notify_displays(|l, id| l.display_added(id), id);

        Some(Box::new(HeadlessVirtualDisplay {
            id,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn register_display_listener(&self, listener: Arc<dyn DisplayListener>) {
        self.shared.state.lock().display_listeners.push(listener);
    }
}

impl Compositor for HeadlessHost {
    fn mirror_surface(&self, source: SurfaceControl) -> Option<SurfaceControl> {
        let mut state = self.shared.state.lock();
        let name = format!("mirror of {}", state.layers.get(&source)?.name);
        let mirror = state.add_layer(name, Some(source));
        state
            .journal
            .push(HostEvent::MirrorCreated { mirror, source });
        Some(mirror)
    }

    fn is_valid(&self, sc: SurfaceControl) -> bool {
        self.shared.state.lock().layers.contains_key(&sc)
    }

    fn apply(&self, transaction: Transaction) -> Result<(), HostError> {
        let mut state = self.shared.state.lock();

        // Validate up front so a bad handle leaves the tree untouched
        let mut removed = Vec::new();
        for op in transaction.ops() {
            for sc in op.layers() {
                if !state.layers.contains_key(&sc) || removed.contains(&sc) {
                    return Err(HostError::InvalidSurface(sc));
                }
            }
            if let TransactionOp::Remove(sc) = op {
                removed.push(*sc);
            }
        }

        for op in transaction.ops() {
            match *op {
                TransactionOp::Show(sc) => {
                    if let Some(layer) = state.layers.get_mut(&sc) {
                        layer.visible = true;
                    }
                }
                TransactionOp::Reparent { child, parent } => {
                    if let Some(layer) = state.layers.get_mut(&child) {
                        layer.parent = Some(parent);
                    }
                }
                TransactionOp::Remove(sc) => state.remove_layer(sc),
            }
        }
        trace!(ops = ?transaction.ops(), "Transaction applied");
        state
            .journal
            .push(HostEvent::TransactionApplied(transaction.into_ops()));
        Ok(())
    }
}

struct HeadlessVirtualDisplay {
    id: DisplayId,
    shared: Arc<Shared>,
}

impl VirtualDisplay for HeadlessVirtualDisplay {
    fn display_id(&self) -> DisplayId {
        self.id
    }

    fn set_surface(&mut self, surface: Option<Surface>) {
        {
            let mut state = self.shared.state.lock();
            let Some(record) = state.displays.get_mut(&self.id) else {
                warn!(display = %self.id, "set_surface on a released display");
                return;
            };
            if record.surface == surface {
                return;
            }
            record.surface = surface;
            state.journal.push(HostEvent::DisplaySurfaceSet {
                display: self.id,
                surface,
            });
        }
        self.shared
            .notify_displays(|l, id| l.display_changed(id), self.id);
    }

    fn release(self: Box<Self>) {
        let record = {
            let mut state = self.shared.state.lock();
            let record = state.displays.remove(&self.id);
            if record.is_some() {
                state
                    .journal
                    .push(HostEvent::DisplayReleased { display: self.id });
            }
            record
        };
        if let Some(record) = record {
            debug!(display = %self.id, name = %record.name, "Virtual display released");
            self.shared
                .notify_displays(|l, id| l.display_removed(id), self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        HorizontalGravity, PixelFormat, VerticalGravity, VirtualDisplayFlag, WindowType,
    };
    use enumflags2::BitFlags;

    #[derive(Default)]
    struct RecordingListener {
        calls: Mutex<Vec<String>>,
    }

    impl SurfaceListener for RecordingListener {
        fn surface_created(&self, surface: HostSurface) {
            self.calls
                .lock()
                .push(format!("created {} @{}dpi", surface.surface, surface.density_dpi));
        }

        fn surface_changed(&self, _format: PixelFormat, width: u32, height: u32) {
            self.calls.lock().push(format!("changed {}x{}", width, height));
        }

        fn surface_destroyed(&self) {
            self.calls.lock().push("destroyed".to_string());
        }
    }

    impl DisplayListener for RecordingListener {
        fn display_added(&self, display: DisplayId) {
            self.calls.lock().push(format!("added {}", display));
        }

        fn display_removed(&self, display: DisplayId) {
            self.calls.lock().push(format!("removed {}", display));
        }

        fn display_changed(&self, display: DisplayId) {
            self.calls.lock().push(format!("changed {}", display));
        }
    }

    fn params() -> OverlayWindowParams {
        OverlayWindowParams {
            title: "test-window".to_string(),
            width: 840,
            height: 1200,
            window_type: WindowType::ApplicationOverlay,
            flags: BitFlags::empty(),
            format: PixelFormat::Rgba8888,
            show_for_all_users: true,
            x: -640,
            y: 0,
            horizontal: HorizontalGravity::End,
            vertical: VerticalGravity::Bottom,
        }
    }

    fn display_config(surface: Option<Surface>) -> VirtualDisplayConfig {
        VirtualDisplayConfig {
            name: "test-display".to_string(),
            width: 840,
            height: 1200,
            density_dpi: 420,
            flags: VirtualDisplayFlag::Public.into(),
            surface,
        }
    }

    fn host() -> (HeadlessHost, UiWorker) {
        let worker = UiWorker::spawn("headless-test").unwrap();
        (HeadlessHost::new(worker.clone()), worker)
    }

    #[test]
    fn test_add_window_delivers_created_then_changed() {
        let (host, worker) = host();
        let listener = Arc::new(RecordingListener::default());

        let window = host.add_window(&params(), listener.clone()).unwrap();
        worker.flush().unwrap();

        let calls = listener.calls.lock().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("created"));
        assert!(calls[0].ends_with("@420dpi"));
        assert_eq!(calls[1], "changed 840x1200");
        assert_eq!(host.windows(), vec![window]);
    }

    #[test]
    fn test_empty_window_rejected() {
        let (host, _worker) = host();
        let mut bad = params();
        bad.width = 0;

        let result = host.add_window(&bad, Arc::new(RecordingListener::default()));
        assert!(matches!(result, Err(HostError::WindowRejected(_))));
    }

    #[test]
    fn test_surface_released_after_destroyed_callback() {
        let (host, worker) = host();
        let listener = Arc::new(RecordingListener::default());
        let window = host.add_window(&params(), listener.clone()).unwrap();
        worker.flush().unwrap();

        host.remove_window(window).unwrap();
        worker.flush().unwrap();

        assert_eq!(listener.calls.lock().last().unwrap(), "destroyed");
        let journal = host.journal();
        assert!(matches!(
            journal[journal.len() - 2],
            HostEvent::SurfaceReleased { .. }
        ));
        assert_eq!(
            journal.last(),
            Some(&HostEvent::WindowRemoved { window })
        );
        assert_eq!(
            host.remove_window(window),
            Err(HostError::UnknownWindow(window))
        );
    }

    #[test]
    fn test_display_lifecycle_notifies_listeners() {
        let (host, worker) = host();
        let listener = Arc::new(RecordingListener::default());
        host.register_display_listener(listener.clone());
        let surface = host.create_surface();

        let mut display = host
            .create_virtual_display(&display_config(Some(surface)))
            .unwrap();
        let id = display.display_id();
        display.set_surface(None);
        display.release();
        worker.flush().unwrap();

        assert_eq!(
            *listener.calls.lock(),
            vec![
                format!("added {}", id),
                format!("changed {}", id),
                format!("removed {}", id),
            ]
        );
        assert!(host.displays().is_empty());
    }

    #[test]
    fn test_display_ids_skip_physical_outputs() {
        let (host, _worker) = host();
        let first = host.create_virtual_display(&display_config(None)).unwrap();
        let second = host.create_virtual_display(&display_config(None)).unwrap();

        assert_eq!(first.display_id(), DisplayId(2));
        assert_eq!(second.display_id(), DisplayId(3));
    }

    #[test]
    fn test_fail_next_display_creation_is_one_shot() {
        let (host, _worker) = host();
        host.fail_next_display_creation();

        assert!(host.create_virtual_display(&display_config(None)).is_none());
        assert!(host.create_virtual_display(&display_config(None)).is_some());
    }

    #[test]
    fn test_mirror_and_reparent() {
        let (host, _worker) = host();
        let source = host.create_layer("source");
        let parent = host.create_layer("parent");

        let mirror = host.mirror_surface(source).unwrap();
        host.apply(Transaction::new().show(mirror).reparent(mirror, parent))
            .unwrap();

        let layer = host.layer(mirror).unwrap();
        assert!(layer.visible);
        assert_eq!(layer.parent, Some(parent));
        assert_eq!(layer.mirror_of, Some(source));
        assert_eq!(host.children_of(parent), vec![mirror]);
    }

    #[test]
    fn test_mirror_of_unknown_layer_is_none() {
        let (host, _worker) = host();
        assert!(host.mirror_surface(SurfaceControl(999)).is_none());
    }

    #[test]
    fn test_transaction_with_invalid_layer_is_atomic() {
        let (host, _worker) = host();
        let source = host.create_layer("source");
        let mirror = host.mirror_surface(source).unwrap();

        let result = host.apply(
            Transaction::new()
                .show(mirror)
                .reparent(mirror, SurfaceControl(999)),
        );

        assert_eq!(result, Err(HostError::InvalidSurface(SurfaceControl(999))));
        assert!(!host.layer(mirror).unwrap().visible);
    }

    #[test]
    fn test_use_after_remove_in_same_transaction_rejected() {
        let (host, _worker) = host();
        let layer = host.create_layer("layer");

        let result = host.apply(Transaction::new().remove(layer).show(layer));

        assert_eq!(result, Err(HostError::InvalidSurface(layer)));
        assert!(host.is_valid(layer));
    }
}
