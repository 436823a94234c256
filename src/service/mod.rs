//! Built-in Action Broker
//!
//! Exposes privileged platform operations to trusted callers through a
//! single generic entry point:
//!
//! ```text
//! perform_action(controller, action, args)
//!   └─> ActionDispatcher
//!         ├─> clear caller identity
//!         ├─> look up controller by name   (UnknownController)
//!         ├─> check declared actions       (UnsupportedAction)
//!         └─> Controller::apply -> bool
//! ```
//!
//! [`BuiltInService`] owns the dispatcher and drives controller lifecycle
//! from boot and user-session signals. Asynchronous notifications reach
//! subscribers through the shared [`CallbackList`].

mod callbacks;
mod dispatcher;
mod error;
pub mod identity;

pub use callbacks::{ActionCallback, CallbackList, ServiceEvent};
pub use dispatcher::{ActionDispatcher, DispatcherBuilder};
pub use error::{ActionError, CallbackError, Result};
pub use identity::CallerIdentity;

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::controller::{ActionArgs, Controller, UserId};
use crate::host::HostServices;
use crate::vdisplay::{VirtualDisplayController, VirtualDisplaySettings, CONTROLLER_ID};
use crate::worker::UiWorker;

/// Name the broker publishes itself under
pub const SERVICE_NAME: &str = "builtin";

/// System boot progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootPhase {
    /// Core system services are up
    SystemServicesReady,
    /// Third-party apps may start
    ThirdPartyAppsCanStart,
    /// Boot finished
    BootCompleted,
}

/// The broker service
pub struct BuiltInService {
    dispatcher: ActionDispatcher,
    virtual_display: Arc<VirtualDisplayController>,
    primary_user: UserId,
}

impl BuiltInService {
    /// Build every controller and the dispatcher
    ///
    /// Controllers are not started until [`BootPhase::BootCompleted`].
    pub fn start(config: &Config, host: HostServices, worker: UiWorker) -> Self {
        let callbacks = Arc::new(CallbackList::new());
        let primary_user = UserId(config.service.primary_user);

        let virtual_display = Arc::new(VirtualDisplayController::new(
            host,
            worker,
            VirtualDisplaySettings {
                display: config.display.clone(),
                window: config.window.clone(),
                primary_user,
            },
            Arc::clone(&callbacks),
        ));

        let controller: Arc<dyn Controller> = virtual_display.clone();
        let dispatcher = DispatcherBuilder::new()
            .register(CONTROLLER_ID, controller)
            .build(callbacks);

        info!(
            service = SERVICE_NAME,
            controllers = ?dispatcher.controller_names(),
            %primary_user,
            "Service published"
        );

        Self {
            dispatcher,
            virtual_display,
            primary_user,
        }
    }

    /// The action dispatcher
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// The virtual display controller
    pub fn virtual_display(&self) -> &Arc<VirtualDisplayController> {
        &self.virtual_display
    }

    /// User whose session hosts per-user resources
    pub fn primary_user(&self) -> UserId {
        self.primary_user
    }

    /// Shorthand for [`ActionDispatcher::perform_action`]
    ///
    /// In-process callers must wait for [`BootPhase::BootCompleted`]: before
    /// that the display listener is not registered and no events reach
    /// subscribers. External callers are kept out until then because
    /// [`ControlServer::bind`](crate::server::ControlServer::bind) refuses to
    /// open the socket.
    pub fn perform_action(&self, controller: &str, action: &str, args: &ActionArgs) -> Result<bool> {
        self.dispatcher.perform_action(controller, action, args)
    }

    /// Boot progress signal; controllers start once boot completes
    pub fn on_boot_phase(&self, phase: BootPhase) {
        debug!(?phase, "Boot phase");
        if phase == BootPhase::BootCompleted && self.dispatcher.start() {
            info!("Controllers started");
        }
    }

    /// A user session was unlocked
    pub fn on_user_unlocked(&self, user: UserId) {
        info!(%user, "User unlocked");
        self.dispatcher.user_started(user);
    }

    /// A user session stopped
    pub fn on_user_stopped(&self, user: UserId) {
        info!(%user, "User stopped");
        self.dispatcher.user_stopped(user);
    }
}
