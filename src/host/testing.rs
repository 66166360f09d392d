//! Recording output sink for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{KeyStroke, OutputSink, Point, PointerEvent, Rect, SinkError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkRecord {
    Pointer(PointerEvent),
    Scroll(f64, f64),
    Key(KeyStroke),
    System(i64),
}

#[derive(Debug)]
pub(crate) struct RecordingSink {
    bounds: Rect,
    location: Mutex<Point>,
    records: Mutex<Vec<SinkRecord>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::at(Point::new(100.0, 100.0))
    }

    pub(crate) fn at(location: Point) -> Self {
        Self {
            bounds: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            location: Mutex::new(location),
            records: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Every subsequent post fails with `EventCreation`.
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn keys(&self) -> Vec<KeyStroke> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Key(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    fn record(&self, record: SinkRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::EventCreation("test"));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

impl OutputSink for RecordingSink {
    fn pointer_location(&self) -> Point {
        *self.location.lock().unwrap()
    }

    fn display_bounds(&self) -> Rect {
        self.bounds
    }

    fn post_pointer(&self, event: PointerEvent) -> Result<(), SinkError> {
        self.record(SinkRecord::Pointer(event))?;
        if let PointerEvent::Moved { to } | PointerEvent::Dragged { to, .. } = event {
            *self.location.lock().unwrap() = to;
        }
        Ok(())
    }

    fn post_scroll(&self, dx: f64, dy: f64) -> Result<(), SinkError> {
        self.record(SinkRecord::Scroll(dx, dy))
    }

    fn post_key(&self, stroke: KeyStroke) -> Result<(), SinkError> {
        self.record(SinkRecord::Key(stroke))
    }

    fn post_system_defined(&self, data: i64) -> Result<(), SinkError> {
        self.record(SinkRecord::System(data))
    }
}
