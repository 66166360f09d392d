use tokio::sync::mpsc;

use crate::bindings::{KeyCode, ModifierSet, MouseButton, SystemKeyCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    /// The host judged the listener too slow.
    Timeout,
    /// The user turned input monitoring off.
    UserInput,
}

/// Event delivered by a system-wide input listener. `modifiers` is the mask
/// reported by the host after the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputEvent {
    KeyDown {
        code: KeyCode,
        modifiers: ModifierSet,
        is_repeat: bool,
    },
    KeyUp {
        code: KeyCode,
        modifiers: ModifierSet,
    },
    /// A modifier key went down or up; hosts do not say which.
    FlagsChanged {
        code: KeyCode,
        modifiers: ModifierSet,
    },
    SystemKey {
        code: SystemKeyCode,
        down: bool,
        is_repeat: bool,
        modifiers: ModifierSet,
    },
    MouseDown {
        button: MouseButton,
    },
    ListenerDisabled {
        reason: DisableReason,
    },
}

pub type RawEventSender = mpsc::UnboundedSender<RawInputEvent>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener could not be created: {0}")]
    CreationFailed(String),

    #[error("Listener could not be re-armed: {0}")]
    RearmFailed(String),
}

/// System-wide keyboard and mouse listener used while capturing a shortcut.
///
/// While installed, the listener swallows the events it reports so the
/// chord being recorded does not also reach the focused application.
/// Callbacks must only forward into the sender.
pub trait RawInputListener: Send + Sync {
    fn name(&self) -> &str;

    fn install(&self, events: RawEventSender) -> Result<(), ListenerError>;

    /// Re-enable after the host disabled the listener.
    fn rearm(&self) -> Result<(), ListenerError>;

    /// Tear down. Calling this on a listener that is not installed is a no-op.
    fn remove(&self);
}
