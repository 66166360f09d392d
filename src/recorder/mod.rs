//! Shortcut capture: records the next keyboard, mouse or system-key chord
//! the user performs and binds it to a controller input.

pub mod capture;
pub mod listener;
pub mod machine;

pub use capture::{CaptureStatus, RecorderError, ShortcutCapture};
pub use listener::{DisableReason, ListenerError, RawEventSender, RawInputEvent, RawInputListener};
pub use machine::{RecorderState, ShortcutRecorder};
