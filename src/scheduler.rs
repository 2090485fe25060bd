use std::time::{Duration, Instant};

/// Accumulator state carried between ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last: Option<Instant>,
    accumulator: Duration,
}

impl FrameClock {
    pub fn last_tick(&self) -> Option<Instant> {
        self.last
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }
}

/// Fixed-timestep pacer. The host calls [`FrameScheduler::tick`] whenever it
/// gets a chance to draw; the return value is how many logical frames to
/// render now. It never sleeps.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    max_catch_up: u32,
    clock: FrameClock,
    frames: u64,
    dropped: Duration,
}

impl FrameScheduler {
    pub fn new(fps: u32, max_catch_up: u32) -> Self {
        let fps = fps.max(1);
        Self {
            interval: Duration::from_nanos(1_000_000_000 / u64::from(fps)),
            max_catch_up: max_catch_up.max(1),
            clock: FrameClock::default(),
            frames: 0,
            dropped: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_catch_up(&self) -> u32 {
        self.max_catch_up
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Logical frames scheduled so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Total time discarded by catch-up clamping.
    pub fn dropped(&self) -> Duration {
        self.dropped
    }

    /// Frames due at `now`, at most `max_catch_up`. The first tick always
    /// yields one frame and starts the clock.
    pub fn tick(&mut self, now: Instant) -> u32 {
        let Some(last) = self.clock.last else {
            self.clock.last = Some(now);
            self.frames += 1;
            return 1;
        };
        self.clock.last = Some(now);
        self.clock.accumulator += now.saturating_duration_since(last);

        let mut due = 0;
        while self.clock.accumulator >= self.interval && due < self.max_catch_up {
            self.clock.accumulator -= self.interval;
            due += 1;
        }
        if self.clock.accumulator >= self.interval {
            let step = self.interval.as_nanos();
            let rem = self.clock.accumulator.as_nanos() % step;
            let drop = self.clock.accumulator - Duration::from_nanos(rem as u64);
            log::debug!(
                "scheduler behind by {:.1} ms; dropping {} frame(s)",
                self.clock.accumulator.as_secs_f64() * 1000.0,
                drop.as_nanos() / step
            );
            self.dropped += drop;
            self.clock.accumulator = Duration::from_nanos(rem as u64);
        }
        self.frames += u64::from(due);
        due
    }

    /// Time left until the next frame is due, measured from `now`.
    pub fn time_until_next(&self, now: Instant) -> Duration {
        let Some(last) = self.clock.last else {
            return Duration::ZERO;
        };
        let pending = self.clock.accumulator + now.saturating_duration_since(last);
        self.interval.saturating_sub(pending)
    }

    /// Forgets accumulated time, e.g. after the host was suspended.
    pub fn reset(&mut self) {
        self.clock = FrameClock::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_fps() {
        let s = FrameScheduler::new(50, 4);
        assert_eq!(s.interval(), Duration::from_millis(20));
    }

    #[test]
    fn leftover_is_kept_below_one_interval() {
        let mut s = FrameScheduler::new(50, 2);
        let t0 = Instant::now();
        s.tick(t0);
        assert_eq!(s.tick(t0 + Duration::from_millis(1_005)), 2);
        assert_eq!(s.clock().accumulator(), Duration::from_millis(5));
    }
}
