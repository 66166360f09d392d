//! Deadzone and acceleration curve for analog sticks.

use serde::{Deserialize, Serialize};

/// Parameters applied to one analog axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub deadzone: f64,
    pub speed: f64,
    pub acceleration: f64,
}

impl AxisMapping {
    pub fn new(deadzone: f64, speed: f64, acceleration: f64) -> Self {
        Self {
            deadzone,
            speed,
            acceleration,
        }
    }
}

/// Per-axis inversion flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Inversion {
    pub x: bool,
    pub y: bool,
}

/// Maps a raw axis value in `[-1, 1]` to an output delta.
///
/// Inside the deadzone the result is exactly zero. Outside it the value is
/// scaled linearly; there is no rescaling of the range past the deadzone edge.
pub fn map_axis(value: f64, mapping: &AxisMapping, invert: bool) -> f64 {
    let live = if value.abs() < mapping.deadzone {
        0.0
    } else {
        value
    };
    let effective = live * mapping.speed * mapping.acceleration;
    if invert {
        -effective
    } else {
        effective
    }
}

/// Pointer delta in screen coordinates: stick up moves the pointer up.
pub fn pointer_delta(x: f64, y: f64, mapping: &AxisMapping, inversion: Inversion) -> (f64, f64) {
    let dx = map_axis(x, mapping, inversion.x);
    let dy = map_axis(y, mapping, inversion.y);
    (dx, -dy)
}

/// Scroll delta; horizontal output stays zero unless enabled.
pub fn scroll_delta(
    x: f64,
    y: f64,
    mapping: &AxisMapping,
    inversion: Inversion,
    horizontal: bool,
) -> (f64, f64) {
    let dx = if horizontal {
        map_axis(x, mapping, inversion.x)
    } else {
        0.0
    };
    let dy = map_axis(y, mapping, inversion.y);
    (dx, dy)
}
