//! Latest raw axis sample per stick.
//!
//! Each stick owns a watch cell: writers overwrite, readers always see the
//! most recent complete `(x, y)` pair and never a half-updated one.

use std::sync::Arc;
use tokio::sync::watch;

use super::types::Stick;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisSample {
    pub x: f32,
    pub y: f32,
}

impl AxisSample {
    pub const CENTER: AxisSample = AxisSample { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug)]
struct StickCells {
    cells: [watch::Sender<AxisSample>; 2],
}

#[derive(Debug, Clone)]
pub struct AxisSampleStore {
    inner: Arc<StickCells>,
}

impl AxisSampleStore {
    pub fn new() -> Self {
        let cells = [
            watch::Sender::new(AxisSample::CENTER),
            watch::Sender::new(AxisSample::CENTER),
        ];
        Self {
            inner: Arc::new(StickCells { cells }),
        }
    }

    pub fn write(&self, stick: Stick, sample: AxisSample) {
        self.inner.cells[stick.index()].send_replace(sample);
    }

    pub fn latest(&self, stick: Stick) -> AxisSample {
        *self.inner.cells[stick.index()].borrow()
    }

    /// Returns both sticks to center.
    pub fn reset(&self) {
        for cell in &self.inner.cells {
            cell.send_replace(AxisSample::CENTER);
        }
    }

    pub fn subscribe(&self, stick: Stick) -> watch::Receiver<AxisSample> {
        self.inner.cells[stick.index()].subscribe()
    }
}

impl Default for AxisSampleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_overwritten_not_queued() {
        let store = AxisSampleStore::new();
        store.write(Stick::Left, AxisSample::new(0.1, 0.2));
        store.write(Stick::Left, AxisSample::new(0.9, -0.4));

        assert_eq!(store.latest(Stick::Left), AxisSample::new(0.9, -0.4));
        assert_eq!(store.latest(Stick::Right), AxisSample::CENTER);
    }

    #[test]
    fn reset_centers_both_sticks() {
        let store = AxisSampleStore::new();
        store.write(Stick::Left, AxisSample::new(1.0, 1.0));
        store.write(Stick::Right, AxisSample::new(-1.0, 0.3));
        store.reset();

        assert_eq!(store.latest(Stick::Left), AxisSample::CENTER);
        assert_eq!(store.latest(Stick::Right), AxisSample::CENTER);
    }

    #[tokio::test]
    async fn subscribers_observe_updates() {
        let store = AxisSampleStore::new();
        let mut rx = store.subscribe(Stick::Right);
        let clone = store.clone();
        clone.write(Stick::Right, AxisSample::new(0.5, 0.5));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AxisSample::new(0.5, 0.5));
    }
}
