//! Host desktop interfaces.
//!
//! [`OutputSink`] receives every synthesized pointer, scroll and keyboard
//! event; [`PermissionGate`] answers whether synthesis is currently allowed.
//! Platform backends live outside this crate. [`log_backend`] provides a
//! backend that only traces what it would have posted.

pub mod log_backend;
#[cfg(test)]
pub(crate) mod testing;

use crate::bindings::{KeyCode, ModifierSet, MouseButton};

pub use log_backend::{LogOutputSink, StaticPermission};

/// Global desktop coordinate, origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned rectangle, usually the union of all displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            width,
            height,
        }
    }

    /// Nearest point inside the rectangle. The far edges are exclusive by one
    /// unit so a clamped pointer stays on a real pixel.
    pub fn clamp(&self, point: Point) -> Point {
        let max_x = self.origin.x + (self.width - 1.0).max(0.0);
        let max_y = self.origin.y + (self.height - 1.0).max(0.0);
        Point::new(
            point.x.clamp(self.origin.x, max_x),
            point.y.clamp(self.origin.y, max_y),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved { to: Point },
    Dragged { button: MouseButton, to: Point },
    ButtonDown { button: MouseButton, at: Point },
    ButtonUp { button: MouseButton, at: Point },
}

/// A single key transition with the modifier mask in effect after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub code: KeyCode,
    pub down: bool,
    pub flags: ModifierSet,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to create {0} event")]
    EventCreation(&'static str),

    #[error("Host rejected event: {0}")]
    Rejected(String),
}

/// Destination for synthesized input.
pub trait OutputSink: Send + Sync {
    fn pointer_location(&self) -> Point;

    /// Combined bounds of all displays.
    fn display_bounds(&self) -> Rect;

    fn post_pointer(&self, event: PointerEvent) -> Result<(), SinkError>;

    /// Positive `dy` scrolls content up.
    fn post_scroll(&self, dx: f64, dy: f64) -> Result<(), SinkError>;

    fn post_key(&self, stroke: KeyStroke) -> Result<(), SinkError>;

    /// Posts a system-defined event carrying the packed key payload.
    fn post_system_defined(&self, data: i64) -> Result<(), SinkError>;
}

/// Host authorization for posting synthetic input.
pub trait PermissionGate: Send + Sync {
    /// Cheap; polled once per tick.
    fn is_authorized(&self) -> bool;

    /// Ask the host to grant access. Returns the state right after asking.
    fn request_authorization(&self) -> bool;
}
