//! Controller subsystem for gamepad input handling
//!
//! Raw gamepad input is translated into [`ControllerEvent`]s and published on
//! a [`ControllerEventBus`]:
//!
//! 1. [`event_collector`] - gilrs polling on a blocking worker
//! 2. [`bus`] - subscriber registration for any number of consumers
//! 3. [`axis_store`] - latest sample per stick for the fixed-rate tick loop
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──► Bus ──► Router ──► AxisSampleStore ──► Tick Loop
//!                                     └──────► Discretizer / Dispatcher
//! ```

pub mod axis_store;
pub mod bus;
pub mod event_collector;
pub mod types;

pub use axis_store::{AxisSample, AxisSampleStore};
pub use bus::ControllerEventBus;
pub use event_collector::{CollectorError, CollectorHandle};
pub use types::{names, ControllerButton, ControllerEvent, DeviceInfo, Direction, Stick};
