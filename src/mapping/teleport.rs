//! Absolute pointer mode: the stick position selects a point within a radius
//! around an anchor, and the pointer glides there over a few ticks.

use std::collections::VecDeque;

use crate::host::Point;

/// Frames per glide, one per tick.
pub const STEPS: usize = 8;
/// Largest overshoot past the target, as a fraction of the travel.
pub const MAX_OVERSHOOT: f64 = 0.12;

const BACK_FACTOR: f64 = 1.70158;
// Retargets closer than this keep the running glide.
const RETARGET_EPSILON: f64 = 0.5;

/// Ease-out-back curve: overshoots slightly and settles at 1.
pub fn ease_out_back(t: f64) -> f64 {
    let u = t - 1.0;
    1.0 + u * u * ((BACK_FACTOR + 1.0) * u + BACK_FACTOR)
}

#[derive(Debug, Clone)]
pub struct TeleportAnimator {
    radius: f64,
    anchor: Option<Point>,
    target: Option<Point>,
    frames: VecDeque<Point>,
}

impl TeleportAnimator {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            anchor: None,
            target: None,
            frames: VecDeque::with_capacity(STEPS),
        }
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    /// Advance one tick. `offset` is the stick deflection in screen
    /// convention, each axis in `[-1, 1]`; zero on both axes means rest.
    ///
    /// Returns the point the pointer should move to this tick, if any.
    pub fn step(&mut self, current: Point, offset: (f64, f64)) -> Option<Point> {
        if offset == (0.0, 0.0) {
            self.reset();
            return None;
        }

        let anchor = *self.anchor.get_or_insert(current);
        let target = anchor.offset(offset.0 * self.radius, offset.1 * self.radius);

        let retarget = match self.target {
            Some(prev) => {
                (prev.x - target.x).abs() > RETARGET_EPSILON
                    || (prev.y - target.y).abs() > RETARGET_EPSILON
            }
            None => true,
        };
        if retarget {
            self.target = Some(target);
            self.plan(current, target);
        }

        self.frames.pop_front()
    }

    /// Drop the anchor so the next deflection starts from wherever the
    /// pointer is.
    pub fn reset(&mut self) {
        self.anchor = None;
        self.target = None;
        self.frames.clear();
    }

    fn plan(&mut self, from: Point, to: Point) {
        self.frames.clear();
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        for i in 1..STEPS {
            let t = i as f64 / STEPS as f64;
            let eased = ease_out_back(t).min(1.0 + MAX_OVERSHOOT);
            self.frames
                .push_back(Point::new(from.x + dx * eased, from.y + dy * eased));
        }
        self.frames.push_back(to);
    }
}
