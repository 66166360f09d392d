use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::EngineContext;
use crate::host::Point;
use crate::mapping::{pointer_delta, scroll_delta, AxisMapping, TeleportAnimator};
use crate::persistence::{PointerMode, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Unauthorized,
    /// A shared lock was held elsewhere.
    Busy,
}

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    pub skipped: Option<SkipReason>,
    pub pointer: Option<Point>,
    pub scroll: Option<(f64, f64)>,
}

impl TickOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

/// Fixed-rate conversion of stick positions into pointer and scroll output.
pub struct TickLoop {
    ctx: EngineContext,
    teleport: TeleportAnimator,
}

impl TickLoop {
    pub fn new(ctx: EngineContext) -> Self {
        let radius = ctx.settings.borrow().teleport_radius;
        Self {
            ctx,
            teleport: TeleportAnimator::new(radius),
        }
    }

    /// Run one tick. Never waits on a lock.
    pub fn tick(&mut self) -> TickOutcome {
        let settings = self.ctx.settings.borrow().clone();

        if !settings.enabled {
            self.teleport.reset();
            return TickOutcome::skipped(SkipReason::Disabled);
        }
        if !self.ctx.permission.is_authorized() {
            self.teleport.reset();
            return TickOutcome::skipped(SkipReason::Unauthorized);
        }

        let roles = settings.stick_roles();
        let (pointer_bound, scroll_bound) = match self.ctx.bindings.try_read() {
            Ok(bindings) => (
                bindings.has_stick_binding(roles.pointer),
                bindings.has_stick_binding(roles.scroll),
            ),
            Err(_) => return TickOutcome::skipped(SkipReason::Busy),
        };

        let Ok(mut dispatcher) = self.ctx.dispatcher.try_lock() else {
            return TickOutcome::skipped(SkipReason::Busy);
        };

        let mut outcome = TickOutcome::default();

        let sample = self.ctx.axis.latest(roles.pointer);
        let (x, y) = (f64::from(sample.x), f64::from(sample.y));
        if pointer_bound || settings.pointer_mode != PointerMode::Teleport {
            self.teleport.reset();
        }
        if !pointer_bound {
            outcome.pointer = match settings.pointer_mode {
                PointerMode::Relative => {
                    let (dx, dy) =
                        pointer_delta(x, y, &settings.pointer_mapping(), settings.pointer_inversion);
                    (dx != 0.0 || dy != 0.0).then(|| dispatcher.move_relative(dx, dy))
                }
                PointerMode::Teleport => {
                    let offset = Self::teleport_offset(&settings, x, y);
                    self.teleport.set_radius(settings.teleport_radius);
                    let current = dispatcher.sink().pointer_location();
                    self.teleport
                        .step(current, offset)
                        .map(|target| dispatcher.move_absolute(target))
                }
            };
        }

        if !scroll_bound {
            let sample = self.ctx.axis.latest(roles.scroll);
            let (dx, dy) = scroll_delta(
                f64::from(sample.x),
                f64::from(sample.y),
                &settings.scroll_mapping(),
                settings.scroll_inversion,
                settings.horizontal_scroll,
            );
            if dx != 0.0 || dy != 0.0 {
                dispatcher.scroll(dx, dy);
                outcome.scroll = Some((dx, dy));
            }
        }

        outcome
    }

    // Deflection in [-1, 1] per axis, deadzone and inversion applied
    fn teleport_offset(settings: &Settings, x: f64, y: f64) -> (f64, f64) {
        let unit = AxisMapping::new(settings.deadzone, 1.0, 1.0);
        pointer_delta(x, y, &unit, settings.pointer_inversion)
    }

    fn period(hz: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(hz.max(1)))
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut rate = self.ctx.settings.borrow().tick_rate_hz;
        let mut interval = tokio::time::interval(Self::period(rate));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Tick loop started at {} Hz", rate);

        let mut busy_skips: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let outcome = self.tick();
                    if outcome.skipped == Some(SkipReason::Busy) {
                        busy_skips += 1;
                    }

                    let wanted = self.ctx.settings.borrow().tick_rate_hz;
                    if wanted != rate {
                        debug!("Tick rate changed {} -> {} Hz", rate, wanted);
                        rate = wanted;
                        interval = tokio::time::interval(Self::period(rate));
                        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
            }
        }

        info!("Tick loop stopped ({} ticks skipped on contention)", busy_skips);
    }
}
