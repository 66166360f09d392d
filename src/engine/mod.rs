//! Input-translation engine
//!
//! Owns the two long-running tasks that turn controller input into host
//! output:
//!
//! - [`tick::TickLoop`] polls the latest stick samples at a fixed rate and
//!   produces pointer and scroll output
//! - [`router::EventRouter`] consumes the controller bus and routes button and
//!   stick-direction edges through the binding table to the dispatcher
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Stopped
//! ```
//!
//! Stopping cancels both tasks, force-releases everything the dispatcher
//! holds and returns the sticks to center.

pub mod router;
pub mod tick;

use statum::{machine, state};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bindings::{SharedBindings, Shortcut};
use crate::controller::{AxisSampleStore, ControllerButton, ControllerEventBus, DeviceInfo};
use crate::dispatch::{ActionDispatcher, SharedDispatcher};
use crate::host::PermissionGate;
use crate::persistence::Settings;

pub use router::EventRouter;
pub use tick::{SkipReason, TickLoop, TickOutcome};

const ENGINE_EVENT_CAPACITY: usize = 256;

/// Notification for whatever presents engine state to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ControllerConnected(DeviceInfo),
    ControllerDisconnected { id: usize },
    /// A physical input was seen for the first time and added to the
    /// binding table.
    InputDetected(ControllerButton),
    ShortcutPressed {
        button: ControllerButton,
        shortcut: Shortcut,
    },
    ShortcutReleased {
        button: ControllerButton,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine task failed: {0}")]
    TaskError(String),
}

/// Handles shared by the engine tasks.
#[derive(Clone)]
pub struct EngineContext {
    pub(crate) bindings: SharedBindings,
    pub(crate) settings: watch::Receiver<Settings>,
    pub(crate) dispatcher: SharedDispatcher,
    pub(crate) axis: AxisSampleStore,
    pub(crate) permission: Arc<dyn PermissionGate>,
    pub(crate) recording: watch::Receiver<bool>,
    events: broadcast::Sender<EngineEvent>,
    active: Arc<watch::Sender<BTreeSet<ControllerButton>>>,
}

impl EngineContext {
    pub fn new(
        bindings: SharedBindings,
        settings: watch::Receiver<Settings>,
        dispatcher: SharedDispatcher,
        axis: AxisSampleStore,
        permission: Arc<dyn PermissionGate>,
        recording: watch::Receiver<bool>,
    ) -> Self {
        let (events, _) = broadcast::channel(ENGINE_EVENT_CAPACITY);
        let (active, _) = watch::channel(BTreeSet::new());
        Self {
            bindings,
            settings,
            dispatcher,
            axis,
            permission,
            recording,
            events,
            active: Arc::new(active),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Controller inputs whose shortcut is currently held down.
    pub fn active_buttons(&self) -> watch::Receiver<BTreeSet<ControllerButton>> {
        self.active.subscribe()
    }

    pub fn bindings(&self) -> &SharedBindings {
        &self.bindings
    }

    pub fn dispatcher(&self) -> &SharedDispatcher {
        &self.dispatcher
    }

    pub fn axis(&self) -> &AxisSampleStore {
        &self.axis
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn sync_active(&self, dispatcher: &ActionDispatcher) {
        let held: BTreeSet<ControllerButton> = dispatcher.held_sources().cloned().collect();
        self.active.send_if_modified(|current| {
            if *current == held {
                return false;
            }
            *current = held;
            true
        });
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum EngineState {
    Configured,
    Running,
    Stopped,
}

#[machine]
pub struct InputEngine<S: EngineState> {
    ctx: EngineContext,
    bus: ControllerEventBus,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: EngineState> InputEngine<S> {
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }
}

impl InputEngine<Configured> {
    pub fn create(ctx: EngineContext, bus: ControllerEventBus) -> Self {
        info!("Creating input engine");
        Self::new(ctx, bus, CancellationToken::new(), Vec::new())
    }

    /// Spawn the tick loop and the event router.
    pub fn start(mut self) -> InputEngine<Running> {
        let rx = self.bus.subscribe();

        let tick = TickLoop::new(self.ctx.clone());
        self.tasks.push(tokio::spawn(tick.run(self.cancel.clone())));

        let router = EventRouter::new(self.ctx.clone());
        self.tasks.push(tokio::spawn(router.run(rx, self.cancel.clone())));

        info!("Input engine running");
        self.transition()
    }
}

impl InputEngine<Running> {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn stop(mut self) -> InputEngine<Stopped> {
        info!("Stopping input engine");
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                let err = EngineError::TaskError(e.to_string());
                error!("{}", err);
            }
        }

        {
            let mut dispatcher = self.ctx.dispatcher.lock().await;
            let released = dispatcher.release_all();
            debug!("Released {} held shortcuts on stop", released.len());
            self.ctx.sync_active(&dispatcher);
        }
        self.ctx.axis.reset();

        info!("Input engine stopped");
        self.transition()
    }
}

impl InputEngine<Stopped> {}
