//! Shortcut data model: what a controller input can be bound to.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Host virtual key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

/// Virtual key codes the engine needs to know by name.
pub mod keycodes {
    use super::KeyCode;

    pub const A: KeyCode = KeyCode(0x00);
    pub const S: KeyCode = KeyCode(0x01);
    pub const C: KeyCode = KeyCode(0x08);
    pub const V: KeyCode = KeyCode(0x09);
    pub const TAB: KeyCode = KeyCode(0x30);
    pub const SPACE: KeyCode = KeyCode(0x31);
    pub const RETURN: KeyCode = KeyCode(0x24);
    pub const ESCAPE: KeyCode = KeyCode(0x35);

    pub const COMMAND: KeyCode = KeyCode(0x37);
    pub const RIGHT_COMMAND: KeyCode = KeyCode(0x36);
    pub const SHIFT: KeyCode = KeyCode(0x38);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0x3C);
    pub const OPTION: KeyCode = KeyCode(0x3A);
    pub const RIGHT_OPTION: KeyCode = KeyCode(0x3D);
    pub const CONTROL: KeyCode = KeyCode(0x3B);
    pub const RIGHT_CONTROL: KeyCode = KeyCode(0x3E);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
}

impl Modifier {
    /// Order in which modifiers go down (and, reversed, come up).
    pub const CANONICAL_ORDER: [Modifier; 4] = [
        Modifier::Command,
        Modifier::Shift,
        Modifier::Option,
        Modifier::Control,
    ];

    fn bit(self) -> u8 {
        match self {
            Modifier::Command => 1 << 0,
            Modifier::Shift => 1 << 1,
            Modifier::Option => 1 << 2,
            Modifier::Control => 1 << 3,
        }
    }

    /// Key code used when the engine synthesizes this modifier.
    ///
    /// Always the left-hand key; see [`Modifier::from_key_code`] for the
    /// reverse mapping that accepts both sides.
    pub fn key_code(self) -> KeyCode {
        match self {
            Modifier::Command => keycodes::COMMAND,
            Modifier::Shift => keycodes::SHIFT,
            Modifier::Option => keycodes::OPTION,
            Modifier::Control => keycodes::CONTROL,
        }
    }

    pub fn from_key_code(code: KeyCode) -> Option<Modifier> {
        match code {
            keycodes::COMMAND | keycodes::RIGHT_COMMAND => Some(Modifier::Command),
            keycodes::SHIFT | keycodes::RIGHT_SHIFT => Some(Modifier::Shift),
            keycodes::OPTION | keycodes::RIGHT_OPTION => Some(Modifier::Option),
            keycodes::CONTROL | keycodes::RIGHT_CONTROL => Some(Modifier::Control),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modifier::Command => "Command",
            Modifier::Shift => "Shift",
            Modifier::Option => "Option",
            Modifier::Control => "Control",
        };
        f.write_str(name)
    }
}

/// Set of held modifiers. Serialized as a list of names in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Modifier>", into = "Vec<Modifier>")]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub const EMPTY: ModifierSet = ModifierSet(0);

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.insert(modifier);
        self
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    pub fn remove(&mut self, modifier: Modifier) {
        self.0 &= !modifier.bit();
    }

    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn union(self, other: ModifierSet) -> ModifierSet {
        ModifierSet(self.0 | other.0)
    }

    pub fn intersects(self, other: ModifierSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in canonical order.
    pub fn iter(self) -> impl DoubleEndedIterator<Item = Modifier> {
        Modifier::CANONICAL_ORDER
            .into_iter()
            .filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModifierSet::EMPTY;
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

impl From<Vec<Modifier>> for ModifierSet {
    fn from(modifiers: Vec<Modifier>) -> Self {
        modifiers.into_iter().collect()
    }
}

impl From<ModifierSet> for Vec<Modifier> {
    fn from(set: ModifierSet) -> Self {
        set.iter().collect()
    }
}

/// Media, brightness and similar keys that hosts deliver as system-defined
/// events instead of ordinary key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemKeyCode(pub u16);

pub mod system_keys {
    use super::SystemKeyCode;

    pub const SOUND_UP: SystemKeyCode = SystemKeyCode(0);
    pub const SOUND_DOWN: SystemKeyCode = SystemKeyCode(1);
    pub const BRIGHTNESS_UP: SystemKeyCode = SystemKeyCode(2);
    pub const BRIGHTNESS_DOWN: SystemKeyCode = SystemKeyCode(3);
    pub const MUTE: SystemKeyCode = SystemKeyCode(7);
    pub const PLAY: SystemKeyCode = SystemKeyCode(16);
    pub const NEXT: SystemKeyCode = SystemKeyCode(17);
    pub const PREVIOUS: SystemKeyCode = SystemKeyCode(18);
}

const SYSTEM_KEY_STATE_DOWN: i64 = 0xA;
const SYSTEM_KEY_STATE_UP: i64 = 0xB;

impl SystemKeyCode {
    /// Event payload: key in the high half, down/up state in bits 8..16.
    pub fn packed(self, down: bool) -> i64 {
        let state = if down {
            SYSTEM_KEY_STATE_DOWN
        } else {
            SYSTEM_KEY_STATE_UP
        };
        (i64::from(self.0) << 16) | (state << 8)
    }

    /// Inverse of [`SystemKeyCode::packed`].
    pub fn unpack(data: i64) -> Option<(SystemKeyCode, bool)> {
        let code = u16::try_from((data >> 16) & 0xFFFF).ok()?;
        match (data >> 8) & 0xFF {
            SYSTEM_KEY_STATE_DOWN => Some((SystemKeyCode(code), true)),
            SYSTEM_KEY_STATE_UP => Some((SystemKeyCode(code), false)),
            _ => None,
        }
    }
}

/// Action a controller input can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shortcut {
    Mouse {
        button: MouseButton,
    },
    Keyboard {
        key_code: KeyCode,
        modifiers: ModifierSet,
    },
    SystemKey {
        code: SystemKeyCode,
        modifiers: ModifierSet,
    },
}

impl Shortcut {
    pub fn mouse(button: MouseButton) -> Self {
        Shortcut::Mouse { button }
    }

    pub fn keyboard(key_code: KeyCode, modifiers: ModifierSet) -> Self {
        Shortcut::Keyboard {
            key_code,
            modifiers,
        }
    }

    pub fn system_key(code: SystemKeyCode, modifiers: ModifierSet) -> Self {
        Shortcut::SystemKey { code, modifiers }
    }

    pub fn modifiers(&self) -> ModifierSet {
        match self {
            Shortcut::Mouse { .. } => ModifierSet::EMPTY,
            Shortcut::Keyboard { modifiers, .. } | Shortcut::SystemKey { modifiers, .. } => {
                *modifiers
            }
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortcut::Mouse { button } => write!(f, "{:?} click", button),
            Shortcut::Keyboard {
                key_code,
                modifiers,
            } => {
                for modifier in modifiers.iter() {
                    write!(f, "{}+", modifier)?;
                }
                write!(f, "key {:#04x}", key_code.0)
            }
            Shortcut::SystemKey { code, modifiers } => {
                for modifier in modifiers.iter() {
                    write!(f, "{}+", modifier)?;
                }
                write!(f, "system key {}", code.0)
            }
        }
    }
}
