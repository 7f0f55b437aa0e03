/// Fixed-timestep accumulator.
///
/// Wall-clock time is accumulated as it arrives; [`drain`](Self::drain) then
/// runs one simulation tick per whole interval contained in the accumulator
/// and keeps the remainder for the next frame. The accumulator is `f64` so
/// long sessions do not drift.
///
/// Without a cap, a long stall produces one large burst of ticks on the next
/// frame (every missed interval is caught up). A cap bounds the burst and
/// drops the excess whole intervals instead.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    interval: f64,
    accumulator: f64,
    max_ticks: Option<u32>,
}

impl FixedTimestep {
    /// # Panics
    /// Panics if `interval` is not a positive, finite number of seconds.
    pub fn new(interval: f64) -> Self {
        assert!(
            interval.is_finite() && interval > 0.0,
            "tick interval must be positive, got {interval}"
        );
        Self {
            interval,
            accumulator: 0.0,
            max_ticks: None,
        }
    }

    /// Cap the number of ticks a single [`drain`](Self::drain) may run.
    pub fn with_max_ticks(mut self, max_ticks: Option<u32>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Add elapsed seconds. Negative or non-finite values are ignored.
    pub fn accumulate(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.accumulator += seconds;
        }
    }

    /// Run `tick(interval)` once per whole interval in the accumulator.
    /// Returns the number of ticks run. Afterwards the accumulator is in
    /// `[0, interval)`.
    pub fn drain(&mut self, mut tick: impl FnMut(f32)) -> u32 {
        let mut ticks = 0u32;
        while self.accumulator >= self.interval {
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                let backlog = (self.accumulator / self.interval).floor();
                self.accumulator -= backlog * self.interval;
                tracing::warn!(
                    ran = ticks,
                    dropped = backlog as u64,
                    "catch-up cap reached, dropping simulation backlog"
                );
                break;
            }
            tick(self.interval as f32);
            self.accumulator -= self.interval;
            ticks += 1;
        }
        if self.accumulator < 0.0 {
            self.accumulator = 0.0;
        }
        ticks
    }
}
