//! Shortcut capture state machine.
//!
//! ```text
//! Idle ──► Listening ──► KeyPending ─────────┐
//!              │    └──► SystemKeyPending ───┼──► Resolved
//!              └─────────────────────────────┘
//!                (mouse down, modifier-only chord)
//! ```
//!
//! A pending chord resolves only once every tracked key has been released
//! and the modifier mask is empty, so multi-modifier chords are captured as
//! one unit.

use std::collections::BTreeSet;
use tracing::debug;

use super::listener::RawInputEvent;
use crate::bindings::{KeyCode, Modifier, ModifierSet, Shortcut, SystemKeyCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Listening,
    KeyPending {
        key: KeyCode,
        modifiers: ModifierSet,
    },
    SystemKeyPending {
        code: SystemKeyCode,
        modifiers: ModifierSet,
    },
    Resolved(Shortcut),
}

// Modifiers pressed with nothing else pending
#[derive(Debug, Clone, Copy)]
struct ModifierCandidate {
    first: Modifier,
    all: ModifierSet,
}

#[derive(Debug)]
pub struct ShortcutRecorder {
    state: RecorderState,
    pressed_keys: BTreeSet<KeyCode>,
    pressed_modifier_keys: BTreeSet<KeyCode>,
    pressed_system_keys: BTreeSet<SystemKeyCode>,
    flags: ModifierSet,
    candidate: Option<ModifierCandidate>,
}

impl Default for ShortcutRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortcutRecorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            pressed_keys: BTreeSet::new(),
            pressed_modifier_keys: BTreeSet::new(),
            pressed_system_keys: BTreeSet::new(),
            flags: ModifierSet::EMPTY,
            candidate: None,
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn begin(&mut self) {
        self.clear();
        self.state = RecorderState::Listening;
    }

    pub fn cancel(&mut self) {
        self.clear();
        self.state = RecorderState::Idle;
    }

    fn clear(&mut self) {
        self.pressed_keys.clear();
        self.pressed_modifier_keys.clear();
        self.pressed_system_keys.clear();
        self.flags = ModifierSet::EMPTY;
        self.candidate = None;
    }

    fn is_open(&self) -> bool {
        !matches!(self.state, RecorderState::Idle | RecorderState::Resolved(_))
    }

    /// Feed one raw event. Returns the chord once it resolves.
    pub fn handle(&mut self, event: &RawInputEvent) -> Option<Shortcut> {
        if !self.is_open() {
            return None;
        }

        match *event {
            RawInputEvent::MouseDown { button } => {
                return Some(self.resolve(Shortcut::mouse(button)));
            }
            RawInputEvent::KeyDown {
                code,
                modifiers,
                is_repeat,
            } => {
                if is_repeat {
                    return None;
                }
                self.pressed_keys.insert(code);
                self.flags = modifiers;
                self.candidate = None;
                self.state = RecorderState::KeyPending {
                    key: code,
                    modifiers,
                };
            }
            RawInputEvent::KeyUp { code, modifiers } => {
                self.pressed_keys.remove(&code);
                self.flags = modifiers;
            }
            RawInputEvent::FlagsChanged { code, modifiers } => {
                self.flags = modifiers;
                // The reported mask is authoritative; an empty mask means no
                // modifier key is down, whatever was tracked before.
                if modifiers.is_empty() {
                    self.pressed_modifier_keys.clear();
                } else if let Some(modifier) = Modifier::from_key_code(code) {
                    if !modifiers.contains(modifier) {
                        self.pressed_modifier_keys.remove(&code);
                    } else if self.pressed_modifier_keys.insert(code)
                        && self.state == RecorderState::Listening
                    {
                        self.note_modifier(code, modifiers);
                    }
                }
            }
            RawInputEvent::SystemKey {
                code,
                down,
                is_repeat,
                modifiers,
            } => {
                if down {
                    if is_repeat {
                        return None;
                    }
                    self.pressed_system_keys.insert(code);
                    self.candidate = None;
                    self.state = RecorderState::SystemKeyPending { code, modifiers };
                } else {
                    self.pressed_system_keys.remove(&code);
                }
                self.flags = modifiers;
            }
            RawInputEvent::ListenerDisabled { .. } => return None,
        }

        self.try_finalize()
    }

    fn note_modifier(&mut self, code: KeyCode, modifiers: ModifierSet) {
        let Some(modifier) = Modifier::from_key_code(code) else {
            return;
        };
        let candidate = self.candidate.get_or_insert(ModifierCandidate {
            first: modifier,
            all: ModifierSet::EMPTY,
        });
        candidate.all = candidate.all.union(modifiers).with(modifier);
    }

    fn is_idle(&self) -> bool {
        self.pressed_keys.is_empty()
            && self.pressed_modifier_keys.is_empty()
            && self.pressed_system_keys.is_empty()
            && self.flags.is_empty()
    }

    fn try_finalize(&mut self) -> Option<Shortcut> {
        if !self.is_idle() {
            return None;
        }

        let shortcut = match self.state {
            RecorderState::KeyPending { key, modifiers } => Shortcut::keyboard(key, modifiers),
            RecorderState::SystemKeyPending { code, modifiers } => {
                Shortcut::system_key(code, modifiers)
            }
            RecorderState::Listening => {
                let candidate = self.candidate.take()?;
                // Left-hand key code stands in for either side
                Shortcut::keyboard(candidate.first.key_code(), candidate.all)
            }
            RecorderState::Idle | RecorderState::Resolved(_) => return None,
        };
        Some(self.resolve(shortcut))
    }

    fn resolve(&mut self, shortcut: Shortcut) -> Shortcut {
        debug!("Recorded {}", shortcut);
        self.clear();
        self.state = RecorderState::Resolved(shortcut.clone());
        shortcut
    }
}
