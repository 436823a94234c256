//! Action dispatcher
//!
//! Maps controller names to controllers. The map is built once by
//! [`DispatcherBuilder`] and frozen; the dispatcher itself has no insert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::callbacks::{ActionCallback, CallbackList};
use super::error::{ActionError, Result};
use super::identity::clear_calling_identity;
use crate::controller::{ActionArgs, Controller, UserId};

/// Collects controller registrations before the dispatcher goes live
#[derive(Default)]
pub struct DispatcherBuilder {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl DispatcherBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller; the last registration for a name wins
    pub fn register(mut self, name: impl Into<String>, controller: Arc<dyn Controller>) -> Self {
        let name = name.into();
        if self.controllers.insert(name.clone(), controller).is_some() {
            debug!(controller = %name, "Controller registration replaced");
        }
        self
    }

    /// Freeze the map
    pub fn build(self, callbacks: Arc<CallbackList>) -> ActionDispatcher {
        info!(
            controllers = self.controllers.len(),
            "Action dispatcher ready"
        );
        ActionDispatcher {
            controllers: self.controllers,
            callbacks,
            started: AtomicBool::new(false),
        }
    }
}

/// Routes actions to controllers and lifecycle signals to all of them
pub struct ActionDispatcher {
    controllers: HashMap<String, Arc<dyn Controller>>,
    callbacks: Arc<CallbackList>,
    started: AtomicBool,
}

impl ActionDispatcher {
    /// Perform `action` on the controller registered as `controller`
    ///
    /// The ambient caller identity is cleared for the duration of the call.
    pub fn perform_action(
        &self,
        controller: &str,
        action: &str,
        args: &ActionArgs,
    ) -> Result<bool> {
        let guard = clear_calling_identity();
        trace!(caller = %guard.previous(), controller, action, "perform_action");

        let target = self
            .controllers
            .get(controller)
            .ok_or_else(|| ActionError::UnknownController(controller.to_string()))?;

        if !target.supports_action(action) {
            return Err(ActionError::UnsupportedAction {
                controller: controller.to_string(),
                action: action.to_string(),
            });
        }

        let result = target.apply(action, args);
        debug!(controller, action, result, "Action applied");
        Ok(result)
    }

    /// Subscribe to asynchronous notifications
    pub fn add_callback(&self, callback: &Arc<dyn ActionCallback>) -> bool {
        self.callbacks.register(callback)
    }

    /// Unsubscribe
    pub fn remove_callback(&self, callback: &Arc<dyn ActionCallback>) -> bool {
        self.callbacks.unregister(callback)
    }

    /// Shared subscriber list
    pub fn callbacks(&self) -> &Arc<CallbackList> {
        &self.callbacks
    }

    /// Fan `on_start` out to every controller, once
    ///
    /// Returns false if the controllers were already started.
    pub fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Controllers already started");
            return false;
        }
        for (name, controller) in &self.controllers {
            debug!(controller = %name, "Starting controller");
            controller.on_start();
        }
        true
    }

    /// True once [`start`](Self::start) ran
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Fan a user-started signal out to every controller
    pub fn user_started(&self, user: UserId) {
        for controller in self.controllers.values() {
            controller.on_user_started(user);
        }
    }

    /// Fan a user-stopped signal out to every controller
    pub fn user_stopped(&self, user: UserId) {
        for controller in self.controllers.values() {
            controller.on_user_stopped(user);
        }
    }

    /// Registered controller names, sorted
    pub fn controller_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
