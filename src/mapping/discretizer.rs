//! Turns continuous stick vectors into edge-triggered virtual direction
//! buttons.

use crate::controller::{ControllerButton, Direction, Stick};

pub const DEFAULT_ACTIVATION_THRESHOLD: f64 = 0.7;

/// Dominant direction of a stick vector, or `None` below `threshold`.
///
/// Ties between the axes resolve to the vertical direction.
pub fn discretize(x: f64, y: f64, threshold: f64) -> Option<Direction> {
    let magnitude = x.abs().max(y.abs());
    if magnitude < threshold {
        return None;
    }

    if x.abs() > y.abs() {
        Some(if x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        })
    } else if y > 0.0 {
        Some(Direction::Up)
    } else {
        Some(Direction::Down)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionEdge {
    Released(Stick, Direction),
    Activated(Stick, Direction),
}

impl DirectionEdge {
    /// Pseudo-button this edge presses or releases.
    pub fn button(&self) -> ControllerButton {
        match *self {
            DirectionEdge::Released(stick, dir) | DirectionEdge::Activated(stick, dir) => {
                ControllerButton::stick_direction(stick, dir)
            }
        }
    }

    pub fn is_press(&self) -> bool {
        matches!(self, DirectionEdge::Activated(..))
    }
}

/// Last emitted direction per stick.
#[derive(Debug, Clone)]
pub struct DirectionTracker {
    threshold: f64,
    last: [Option<Direction>; 2],
}

impl Default for DirectionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_THRESHOLD)
    }
}

impl DirectionTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last: [None, None],
        }
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn current(&self, stick: Stick) -> Option<Direction> {
        self.last[stick.index()]
    }

    /// Feed a new sample. Returns the edges to route, a release always
    /// preceding the activation that replaces it.
    pub fn update(&mut self, stick: Stick, x: f64, y: f64) -> Vec<DirectionEdge> {
        let next = discretize(x, y, self.threshold);
        let slot = &mut self.last[stick.index()];
        if *slot == next {
            return Vec::new();
        }

        let mut edges = Vec::with_capacity(2);
        if let Some(prev) = slot.take() {
            edges.push(DirectionEdge::Released(stick, prev));
        }
        if let Some(dir) = next {
            edges.push(DirectionEdge::Activated(stick, dir));
        }
        *slot = next;
        edges
    }

    /// Release whatever is active on either stick.
    pub fn reset(&mut self) -> Vec<DirectionEdge> {
        Stick::ALL
            .into_iter()
            .filter_map(|stick| {
                self.last[stick.index()]
                    .take()
                    .map(|dir| DirectionEdge::Released(stick, dir))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dominant_axis_wins() {
        assert_eq!(discretize(0.8, 0.1, 0.7), Some(Direction::Right));
        assert_eq!(discretize(-0.9, 0.3, 0.7), Some(Direction::Left));
        assert_eq!(discretize(0.2, -0.75, 0.7), Some(Direction::Down));
        assert_eq!(discretize(0.2, 0.2, 0.7), None);
    }

    #[test]
    fn ties_go_vertical() {
        assert_eq!(discretize(0.8, 0.8, 0.7), Some(Direction::Up));
        assert_eq!(discretize(-0.8, -0.8, 0.7), Some(Direction::Down));
    }

    #[test]
    fn same_direction_twice_activates_once() {
        let mut tracker = DirectionTracker::default();
        assert_eq!(
            tracker.update(Stick::Left, 0.9, 0.0),
            vec![DirectionEdge::Activated(Stick::Left, Direction::Right)]
        );
        assert!(tracker.update(Stick::Left, 0.95, 0.1).is_empty());
    }

    #[test]
    fn switching_releases_before_activating() {
        let mut tracker = DirectionTracker::default();
        tracker.update(Stick::Right, 0.0, 0.9);
        let edges = tracker.update(Stick::Right, -0.9, 0.0);
        assert_eq!(
            edges,
            vec![
                DirectionEdge::Released(Stick::Right, Direction::Up),
                DirectionEdge::Activated(Stick::Right, Direction::Left),
            ]
        );
        assert_eq!(edges[1].button().as_str(), "JoystickRightLeft");
    }

    #[test]
    fn sticks_are_tracked_independently() {
        let mut tracker = DirectionTracker::default();
        tracker.update(Stick::Left, 0.9, 0.0);
        tracker.update(Stick::Right, 0.0, -0.9);
        assert_eq!(tracker.current(Stick::Left), Some(Direction::Right));
        assert_eq!(tracker.current(Stick::Right), Some(Direction::Down));

        let released = tracker.reset();
        assert_eq!(released.len(), 2);
        assert!(released.iter().all(|e| !e.is_press()));
        assert!(tracker.reset().is_empty());
    }

    proptest! {
        #[test]
        fn below_threshold_is_none(x in -0.699f64..0.699, y in -0.699f64..0.699) {
            prop_assert_eq!(discretize(x, y, DEFAULT_ACTIVATION_THRESHOLD), None);
        }

        #[test]
        fn at_most_one_active_per_stick(
            samples in prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), 1..50)
        ) {
            let mut tracker = DirectionTracker::default();
            let mut active: Option<Direction> = None;
            for (x, y) in samples {
                for edge in tracker.update(Stick::Left, x, y) {
                    match edge {
                        DirectionEdge::Released(_, dir) => {
                            prop_assert_eq!(active, Some(dir));
                            active = None;
                        }
                        DirectionEdge::Activated(_, dir) => {
                            prop_assert_eq!(active, None);
                            active = Some(dir);
                        }
                    }
                }
                prop_assert_eq!(active, tracker.current(Stick::Left));
            }
        }
    }
}
