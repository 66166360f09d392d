use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EngineContext, EngineEvent};
use crate::controller::{AxisSample, ControllerButton, ControllerEvent, DeviceInfo};
use crate::mapping::DirectionTracker;

/// Routes controller events: axis samples into the sample store, button and
/// stick-direction edges through the binding table to the dispatcher.
pub struct EventRouter {
    ctx: EngineContext,
    tracker: DirectionTracker,
    device: Option<DeviceInfo>,
}

impl EventRouter {
    pub fn new(ctx: EngineContext) -> Self {
        let threshold = ctx.settings.borrow().direction_threshold;
        Self {
            ctx,
            tracker: DirectionTracker::new(threshold),
            device: None,
        }
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub async fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Connected(info) => {
                info!("Controller connected: {} ({})", info.name, info.id);
                self.device = Some(info.clone());
                self.ctx.emit(EngineEvent::ControllerConnected(info));
            }
            ControllerEvent::Disconnected { id } => {
                info!("Controller disconnected: {}", id);
                self.end_session().await;
                self.device = None;
                self.ctx.emit(EngineEvent::ControllerDisconnected { id });
            }
            ControllerEvent::AxisChanged { stick, x, y } => {
                self.ctx.axis.write(stick, AxisSample::new(x, y));

                let threshold = self.ctx.settings.borrow().direction_threshold;
                self.tracker.set_threshold(threshold);
                for edge in self.tracker.update(stick, f64::from(x), f64::from(y)) {
                    self.route_edge(edge.button(), edge.is_press()).await;
                }
            }
            ControllerEvent::ButtonChanged { button, pressed } => {
                if pressed {
                    let created = self.ctx.bindings.write().await.ensure(&button);
                    if created {
                        debug!("New input detected: {}", button);
                        self.ctx.emit(EngineEvent::InputDetected(button.clone()));
                    }
                }
                self.route_edge(button, pressed).await;
            }
        }
    }

    /// Press or release whatever `button` is bound to.
    pub async fn route_edge(&mut self, button: ControllerButton, pressed: bool) {
        if *self.ctx.recording.borrow() {
            debug!("Capture active, ignoring {}", button);
            return;
        }
        if !self.ctx.settings.borrow().enabled {
            return;
        }

        if pressed {
            if !self.ctx.permission.is_authorized() {
                debug!("Not authorized, dropping press of {}", button);
                return;
            }
            let Some(shortcut) = self.ctx.bindings.read().await.get(&button).cloned() else {
                return;
            };

            let mut dispatcher = self.ctx.dispatcher.lock().await;
            dispatcher.press(&button, &shortcut);
            self.ctx.sync_active(&dispatcher);
            drop(dispatcher);

            self.ctx
                .emit(EngineEvent::ShortcutPressed { button, shortcut });
        } else {
            let mut dispatcher = self.ctx.dispatcher.lock().await;
            let released = dispatcher.release(&button);
            self.ctx.sync_active(&dispatcher);
            drop(dispatcher);

            if released {
                self.ctx.emit(EngineEvent::ShortcutReleased { button });
            }
        }
    }

    /// Drop all runtime session state: held output, active directions and
    /// stick samples.
    pub async fn end_session(&mut self) {
        self.suspend().await;
        self.ctx.axis.reset();
    }

    // Force-release held output and forget active directions
    async fn suspend(&mut self) {
        self.tracker.reset();
        let mut dispatcher = self.ctx.dispatcher.lock().await;
        let released = dispatcher.release_all();
        self.ctx.sync_active(&dispatcher);
        drop(dispatcher);

        for button in released {
            self.ctx.emit(EngineEvent::ShortcutReleased { button });
        }
    }

    pub async fn run(
        mut self,
        mut rx: broadcast::Receiver<ControllerEvent>,
        cancel: CancellationToken,
    ) {
        let mut settings = self.ctx.settings.clone();
        let mut recording = self.ctx.recording.clone();
        let mut settings_open = true;
        let mut recording_open = true;

        info!("Event router started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                changed = settings.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                    let enabled = settings.borrow_and_update().enabled;
                    if !enabled {
                        info!("Engine disabled, releasing held input");
                        self.suspend().await;
                    }
                }

                changed = recording.changed(), if recording_open => {
                    if changed.is_err() {
                        recording_open = false;
                        continue;
                    }
                    let active = *recording.borrow_and_update();
                    if active {
                        debug!("Capture started, releasing held input");
                        self.suspend().await;
                    }
                }

                received = rx.recv() => match received {
                    Ok(event) => self.handle(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        // Dropped events may include releases
                        warn!("Router lagged behind, {} controller events dropped; releasing held input", skipped);
                        self.suspend().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Controller bus closed");
                        break;
                    }
                },
            }
        }

        self.end_session().await;
        info!("Event router stopped");
    }
}
