//! Identifiers and events shared by every stage of the controller pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical analog stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    pub const ALL: [Stick; 2] = [Stick::Left, Stick::Right];

    /// The stick that is not `self`.
    pub fn other(self) -> Stick {
        match self {
            Stick::Left => Stick::Right,
            Stick::Right => Stick::Left,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Stick::Left => 0,
            Stick::Right => 1,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Stick::Left => "Left",
            Stick::Right => "Right",
        }
    }
}

impl fmt::Display for Stick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Four-way direction produced by the discretizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    fn label(self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
            Direction::Left => "Left",
            Direction::Right => "Right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Names of the physical inputs published by the gilrs collector.
pub mod names {
    pub const BUTTON_A: &str = "ButtonA";
    pub const BUTTON_B: &str = "ButtonB";
    pub const BUTTON_X: &str = "ButtonX";
    pub const BUTTON_Y: &str = "ButtonY";
    pub const L1: &str = "L1";
    pub const R1: &str = "R1";
    pub const L2: &str = "L2";
    pub const R2: &str = "R2";
    pub const L3: &str = "L3";
    pub const R3: &str = "R3";
    pub const MENU: &str = "Menu";
    pub const OPTIONS: &str = "Options";
    pub const HOME: &str = "Home";
    pub const DPAD_UP: &str = "DPadUp";
    pub const DPAD_DOWN: &str = "DPadDown";
    pub const DPAD_LEFT: &str = "DPadLeft";
    pub const DPAD_RIGHT: &str = "DPadRight";
}

const STICK_PREFIX: &str = "Joystick";

/// Bindable input identifier.
///
/// Either a physical input such as `"ButtonA"` or a stick-direction
/// pseudo-button such as `"JoystickLeftUp"`. Ordering is lexical so that
/// persisted tables come out in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerButton(String);

impl ControllerButton {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Pseudo-button for one direction of a stick.
    pub fn stick_direction(stick: Stick, direction: Direction) -> Self {
        Self(format!("{}{}{}", STICK_PREFIX, stick.label(), direction.label()))
    }

    /// All four pseudo-buttons of a stick, in [`Direction::ALL`] order.
    pub fn stick_cluster(stick: Stick) -> [ControllerButton; 4] {
        Direction::ALL.map(|direction| Self::stick_direction(stick, direction))
    }

    /// Splits a pseudo-button back into its stick and direction.
    pub fn stick_direction_parts(&self) -> Option<(Stick, Direction)> {
        let rest = self.0.strip_prefix(STICK_PREFIX)?;
        let (stick, rest) = Stick::ALL
            .iter()
            .find_map(|stick| rest.strip_prefix(stick.label()).map(|r| (*stick, r)))?;
        let direction = Direction::ALL
            .iter()
            .copied()
            .find(|direction| direction.label() == rest)?;
        Some((stick, direction))
    }

    pub fn is_stick_direction(&self) -> bool {
        self.stick_direction_parts().is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControllerButton {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identity of a connected controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: usize,
    pub name: String,
}

/// Event published by a controller input source.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Connected(DeviceInfo),
    Disconnected { id: usize },
    /// Latest position of both axes of a stick, each in `[-1, 1]`, y up.
    AxisChanged { stick: Stick, x: f32, y: f32 },
    ButtonChanged {
        button: ControllerButton,
        pressed: bool,
    },
}
