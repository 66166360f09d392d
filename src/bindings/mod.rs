//! Controller input to shortcut bindings.

pub mod shortcut;
pub mod store;

pub use shortcut::{
    keycodes, system_keys, KeyCode, Modifier, ModifierSet, MouseButton, Shortcut, SystemKeyCode,
};
pub use store::{BindingError, BindingStore, SharedBindings, BINDINGS_KEY};
