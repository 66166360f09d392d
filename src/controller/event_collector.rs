use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::axis_store::AxisSample;
use super::bus::ControllerEventBus;
use super::types::{names, ControllerButton, ControllerEvent, DeviceInfo, Stick};

// How long a single poll waits for gilrs before checking for cancellation
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Collector task failed: {0}")]
    TaskError(String),
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Gamepad whose events are forwarded
    active_gamepad: Option<GamepadId>,

    // Where translated events go
    bus: ControllerEventBus,

    // Last seen stick positions; gilrs reports one axis at a time
    sticks: [AxisSample; 2],
}

impl<S: CollectionState> EventCollector<S> {
    pub fn active_gamepad(&self) -> Option<GamepadId> {
        self.active_gamepad
    }
}

impl EventCollector<Initializing> {
    pub fn create(bus: ControllerEventBus) -> Result<Self, CollectorError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, bus, [AxisSample::CENTER; 2]))
    }

    // Adopt the first connected gamepad and transition to Collecting state
    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one to appear");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, UUID: {:?}",
                    idx,
                    id,
                    gamepad.name(),
                    gamepad.uuid()
                );
            }
        }

        let first = gamepads
            .first()
            .map(|(id, gamepad)| (*id, gamepad.name().to_string()));
        if let Some((id, name)) = first {
            self.adopt(id, name);
        }

        debug!("Event Collector initialized, transitioning to Collecting state");
        self.transition()
    }
}

impl<S: CollectionState> EventCollector<S> {
    fn adopt(&mut self, id: GamepadId, name: String) {
        info!("Selected gamepad: {} ({})", name, id);
        self.active_gamepad = Some(id);
        self.sticks = [AxisSample::CENTER; 2];
        self.bus.publish(ControllerEvent::Connected(DeviceInfo {
            id: usize::from(id),
            name,
        }));
    }
}

impl EventCollector<Collecting> {
    /// Waits up to `timeout` for one gilrs event and publishes its translation.
    ///
    /// Returns `true` when an event was consumed.
    pub fn collect_next_event(&mut self, timeout: Duration) -> bool {
        let Some(Event { id, event, .. }) = self.gilrs.next_event_blocking(Some(timeout)) else {
            return false;
        };

        match event {
            EventType::Connected => {
                if self.active_gamepad.is_none() {
                    let name = self.gilrs.gamepad(id).name().to_string();
                    self.adopt(id, name);
                } else {
                    info!("Additional gamepad connected and ignored: {}", id);
                }
                return true;
            }
            EventType::Disconnected => {
                if self.active_gamepad == Some(id) {
                    warn!("Active gamepad disconnected: {}", id);
                    self.active_gamepad = None;
                    self.sticks = [AxisSample::CENTER; 2];
                    self.bus.publish(ControllerEvent::Disconnected {
                        id: usize::from(id),
                    });
                }
                return true;
            }
            _ => {}
        }

        if self.active_gamepad != Some(id) {
            debug!("Skipping event from non-active gamepad: {:?}", id);
            return true;
        }

        if let Some(translated) = self.convert_gilrs_event(event) {
            self.bus.publish(translated);
        }
        true
    }

    // Run the collector until cancelled
    pub fn run_collection_loop(&mut self, cancel: &CancellationToken) {
        info!("Starting Event Collector loop");

        let mut event_count: u64 = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(30);

        while !cancel.is_cancelled() {
            if self.collect_next_event(POLL_TIMEOUT) {
                event_count += 1;
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                debug!(
                    "Event Collector stats: {} events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }
        }

        info!("Event Collector loop stopped");
    }

    fn convert_gilrs_event(&mut self, event: EventType) -> Option<ControllerEvent> {
        match event {
            EventType::AxisChanged(axis, value, _) => {
                let (stick, horizontal) = match axis {
                    Axis::LeftStickX => (Stick::Left, true),
                    Axis::LeftStickY => (Stick::Left, false),
                    Axis::RightStickX => (Stick::Right, true),
                    Axis::RightStickY => (Stick::Right, false),
                    _ => {
                        debug!("Ignoring unsupported axis: {:?}", axis);
                        return None;
                    }
                };
                let sample = &mut self.sticks[stick.index()];
                if horizontal {
                    sample.x = value;
                } else {
                    sample.y = value;
                }
                Some(ControllerEvent::AxisChanged {
                    stick,
                    x: sample.x,
                    y: sample.y,
                })
            }
            EventType::ButtonPressed(button, _) => map_button(button).map(|name| {
                debug!("Button pressed: {:?} -> {}", button, name);
                ControllerEvent::ButtonChanged {
                    button: ControllerButton::new(name),
                    pressed: true,
                }
            }),
            EventType::ButtonReleased(button, _) => map_button(button).map(|name| {
                debug!("Button released: {:?} -> {}", button, name);
                ControllerEvent::ButtonChanged {
                    button: ControllerButton::new(name),
                    pressed: false,
                }
            }),
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
                None
            }
            _ => {
                debug!("Unhandled event type: {:?}", event);
                None
            }
        }
    }
}

/// Runs the gilrs collector on a blocking worker until `cancel` fires.
pub struct CollectorHandle {
    task: JoinHandle<()>,
}

impl CollectorHandle {
    pub fn spawn(bus: ControllerEventBus, cancel: CancellationToken) -> Self {
        info!("Spawning Event Collector");

        // gilrs polls synchronously, keep it off the async workers
        let task = tokio::task::spawn_blocking(move || match EventCollector::create(bus) {
            Ok(collector) => {
                let mut collecting = collector.initialize();
                collecting.run_collection_loop(&cancel);
            }
            Err(e) => {
                warn!("Continuing without controller input: {}", e);
            }
        });

        Self { task }
    }

    pub async fn join(self) -> Result<(), CollectorError> {
        self.task
            .await
            .map_err(|e| CollectorError::TaskError(e.to_string()))
    }
}

// Map gilrs buttons to the names bindings are keyed by
fn map_button(button: Button) -> Option<&'static str> {
    match button {
        Button::South => Some(names::BUTTON_A),
        Button::East => Some(names::BUTTON_B),
        Button::West => Some(names::BUTTON_X),
        Button::North => Some(names::BUTTON_Y),
        Button::LeftTrigger => Some(names::L1),
        Button::RightTrigger => Some(names::R1),
        Button::LeftTrigger2 => Some(names::L2),
        Button::RightTrigger2 => Some(names::R2),
        Button::LeftThumb => Some(names::L3),
        Button::RightThumb => Some(names::R3),
        Button::Start => Some(names::MENU),
        Button::Select => Some(names::OPTIONS),
        Button::Mode => Some(names::HOME),
        Button::DPadUp => Some(names::DPAD_UP),
        Button::DPadDown => Some(names::DPAD_DOWN),
        Button::DPadLeft => Some(names::DPAD_LEFT),
        Button::DPadRight => Some(names::DPAD_RIGHT),
        _ => None,
    }
}
