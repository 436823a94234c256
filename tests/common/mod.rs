//! Shared fixtures for the integration suites

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;

use builtin_broker::config::Config;
use builtin_broker::controller::{ActionArgs, UserId};
use builtin_broker::host::{DisplayId, HeadlessHost, HostEvent};
use builtin_broker::service::{
    ActionCallback, BootPhase, BuiltInService, CallbackError, ServiceEvent,
};
use builtin_broker::vdisplay::{DisplayPhase, CONTROLLER_ID};
use builtin_broker::worker::UiWorker;

/// A booted broker running on a headless host
pub struct Broker {
    pub worker: UiWorker,
    pub host: HeadlessHost,
    pub service: BuiltInService,
}

impl Broker {
    /// Broker with boot completed but no user session yet
    pub fn booted(config: Config) -> Self {
        let worker = UiWorker::spawn("test-ui").unwrap();
        let host = HeadlessHost::new(worker.clone());
        let service = BuiltInService::start(&config, host.services(), worker.clone());
        service.on_boot_phase(BootPhase::BootCompleted);
        Self {
            worker,
            host,
            service,
        }
    }

    /// Booted broker with the primary user's overlay surface ready
    pub fn with_surface(config: Config) -> Self {
        let broker = Self::booted(config);
        broker.service.on_user_unlocked(UserId::SYSTEM);
        broker.settle();
        broker
    }

    /// Wait for every posted task and host callback
    pub fn settle(&self) {
        self.worker.flush().unwrap();
    }

    /// Run a virtual display action through the dispatcher
    pub fn vdisplay(&self, action: &str, args: ActionArgs) -> bool {
        self.service
            .perform_action(CONTROLLER_ID, action, &args)
            .unwrap()
    }

    pub fn phase(&self) -> DisplayPhase {
        self.service.virtual_display().snapshot().phase
    }

    pub fn display_id(&self) -> Option<DisplayId> {
        self.service.virtual_display().snapshot().display_id
    }

    /// Position of the first journal entry matching `pred`
    pub fn journal_position(&self, pred: impl Fn(&HostEvent) -> bool) -> Option<usize> {
        self.host.journal().iter().position(pred)
    }

    pub fn transactions(&self) -> usize {
        self.host
            .journal()
            .iter()
            .filter(|e| matches!(e, HostEvent::TransactionApplied(_)))
            .count()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.worker.shutdown();
    }
}

/// Subscriber recording every event it receives
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<ServiceEvent>>,
}

impl Recorder {
    pub fn subscribe(broker: &Broker) -> (Arc<Recorder>, Arc<dyn ActionCallback>) {
        let recorder = Arc::new(Recorder::default());
        let callback: Arc<dyn ActionCallback> = recorder.clone();
        assert!(broker.service.dispatcher().add_callback(&callback));
        (recorder, callback)
    }

    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events.lock().clone()
    }
}

impl ActionCallback for Recorder {
    fn on_event(&self, event: &ServiceEvent) -> Result<(), CallbackError> {
        self.events.lock().push(*event);
        Ok(())
    }
}
