use std::time::Instant;

/// Anything that can report elapsed seconds since it was last asked.
///
/// The loop pulls one delta per iteration from a source. [`Timer`] is the
/// wall-clock implementation; tests substitute scripted sources.
pub trait DeltaSource {
    fn delta(&mut self) -> f64;
}

/// Wall-clock delta accumulator.
///
/// Created once when the loop starts and polled every frame. There is no
/// reset: the baseline only ever moves forward.
#[derive(Debug, Clone)]
pub struct Timer {
    last_sample: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            last_sample: Instant::now(),
        }
    }

    /// Seconds elapsed since the previous call (or since construction), and
    /// advance the sample point. Never negative.
    pub fn delta(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_sample);
        // `Instant` is monotonic, but keep the baseline from ever moving back.
        if now > self.last_sample {
            self.last_sample = now;
        }
        elapsed.as_secs_f64()
    }

    /// Timestamp of the most recent sample.
    pub fn last_sample(&self) -> Instant {
        self.last_sample
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaSource for Timer {
    fn delta(&mut self) -> f64 {
        Timer::delta(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn delta_tracks_sleep() {
        let mut timer = Timer::new();
        let _ = timer.delta();
        std::thread::sleep(Duration::from_millis(50));
        let dt = timer.delta();
        assert!(dt >= 0.05, "dt {dt} shorter than the sleep");
        assert!(dt < 0.5, "dt {dt} far beyond the sleep");
    }

    #[test]
    fn first_delta_measures_from_construction() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.delta() >= 0.01);
    }

    #[test]
    fn samples_are_monotonic_and_non_negative() {
        let mut timer = Timer::new();
        let mut previous = timer.last_sample();
        for _ in 0..1000 {
            let dt = timer.delta();
            assert!(dt >= 0.0);
            let sample = timer.last_sample();
            assert!(sample >= previous);
            previous = sample;
        }
    }

    #[test]
    fn usable_as_delta_source() {
        let mut source: Box<dyn DeltaSource> = Box::new(Timer::new());
        assert!(source.delta() >= 0.0);
    }
}
