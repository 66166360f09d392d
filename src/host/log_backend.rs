use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{KeyStroke, OutputSink, PermissionGate, Point, PointerEvent, Rect, SinkError};
use crate::bindings::SystemKeyCode;

/// Output sink that keeps a virtual pointer and traces every event.
///
/// Used when no platform backend is linked in, e.g. on a headless device.
#[derive(Debug)]
pub struct LogOutputSink {
    bounds: Rect,
    location: Mutex<Point>,
}

impl LogOutputSink {
    pub fn new(bounds: Rect) -> Self {
        let center = Point::new(
            bounds.origin.x + bounds.width / 2.0,
            bounds.origin.y + bounds.height / 2.0,
        );
        Self {
            bounds,
            location: Mutex::new(center),
        }
    }

    fn set_location(&self, to: Point) -> Result<(), SinkError> {
        let mut location = self
            .location
            .lock()
            .map_err(|_| SinkError::Rejected("pointer state poisoned".to_string()))?;
        *location = to;
        Ok(())
    }
}

impl Default for LogOutputSink {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 1920.0, 1080.0))
    }
}

impl OutputSink for LogOutputSink {
    fn pointer_location(&self) -> Point {
        match self.location.lock() {
            Ok(location) => *location,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn display_bounds(&self) -> Rect {
        self.bounds
    }

    fn post_pointer(&self, event: PointerEvent) -> Result<(), SinkError> {
        match event {
            PointerEvent::Moved { to } => {
                self.set_location(to)?;
                debug!("pointer -> ({:.1}, {:.1})", to.x, to.y);
            }
            PointerEvent::Dragged { button, to } => {
                self.set_location(to)?;
                debug!("drag {:?} -> ({:.1}, {:.1})", button, to.x, to.y);
            }
            PointerEvent::ButtonDown { button, at } => {
                info!("{:?} down at ({:.1}, {:.1})", button, at.x, at.y);
            }
            PointerEvent::ButtonUp { button, at } => {
                info!("{:?} up at ({:.1}, {:.1})", button, at.x, at.y);
            }
        }
        Ok(())
    }

    fn post_scroll(&self, dx: f64, dy: f64) -> Result<(), SinkError> {
        debug!("scroll ({:.2}, {:.2})", dx, dy);
        Ok(())
    }

    fn post_key(&self, stroke: KeyStroke) -> Result<(), SinkError> {
        info!(
            "key {:#04x} {} flags={:?}",
            stroke.code.0,
            if stroke.down { "down" } else { "up" },
            stroke.flags
        );
        Ok(())
    }

    fn post_system_defined(&self, data: i64) -> Result<(), SinkError> {
        match SystemKeyCode::unpack(data) {
            Some((code, down)) => {
                info!(
                    "system key {} {}",
                    code.0,
                    if down { "down" } else { "up" }
                );
                Ok(())
            }
            None => {
                warn!("Unrecognized system-defined payload {:#x}", data);
                Err(SinkError::EventCreation("system-defined"))
            }
        }
    }
}

/// Permission gate backed by a flag, toggled by whoever owns the host
/// integration.
#[derive(Debug, Default)]
pub struct StaticPermission {
    granted: AtomicBool,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self {
            granted: AtomicBool::new(true),
        }
    }

    pub fn denied() -> Self {
        Self::default()
    }

    pub fn grant(&self) {
        self.granted.store(true, Ordering::Release);
    }

    pub fn revoke(&self) {
        self.granted.store(false, Ordering::Release);
    }
}

impl PermissionGate for StaticPermission {
    fn is_authorized(&self) -> bool {
        self.granted.load(Ordering::Acquire)
    }

    fn request_authorization(&self) -> bool {
        let authorized = self.is_authorized();
        if !authorized {
            warn!("Input synthesis not authorized; grant access in the host settings");
        }
        authorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::MouseButton;

    #[test]
    fn moves_update_virtual_location() {
        let sink = LogOutputSink::new(Rect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(sink.pointer_location(), Point::new(400.0, 300.0));

        sink.post_pointer(PointerEvent::Dragged {
            button: MouseButton::Left,
            to: Point::new(10.0, 20.0),
        })
        .unwrap();
        assert_eq!(sink.pointer_location(), Point::new(10.0, 20.0));
    }

    #[test]
    fn garbage_system_payload_is_rejected() {
        let sink = LogOutputSink::default();
        assert!(sink.post_system_defined(0x1234).is_err());
    }

    #[test]
    fn permission_can_be_toggled() {
        let gate = StaticPermission::denied();
        assert!(!gate.request_authorization());
        gate.grant();
        assert!(gate.is_authorized());
        gate.revoke();
        assert!(!gate.is_authorized());
    }
}
