//! CPU Clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::conf::Hz;

/// Below this, sleeping overshoots the deadline, so the clock yields instead.
const SLEEP_THRESHOLD: Duration = Duration::from_millis(2);

/// Timer to synchronize a thread with a fixed frequency.
///
/// Used by both driver loops: the CPU loop at the configured instruction
/// rate, and the presentation loop at 60Hz.
pub struct Clock {
    start: Instant,
    interval: Duration,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    ///
    /// A frequency of zero never waits.
    pub fn new(frequency: Hz) -> Self {
        Self {
            start: Instant::now(),
            interval: frequency.into(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.start = Instant::now()
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        loop {
            let elapsed = self.start.elapsed();
            if elapsed < self.interval {
                let remaining = self.interval - elapsed;
                if remaining > SLEEP_THRESHOLD {
                    thread::sleep(remaining - SLEEP_THRESHOLD);
                } else {
                    // Spinning a loop causes high CPU usage and fan madness.
                    thread::yield_now();
                }
            } else {
                // Reset back to zero, rather than trying to catch up.
                //
                // If the VM was paused for debugging, and a large
                // amount of time has elapsed until it is resumed,
                // it should simply continue at the next cycle running
                // at its usual speed.
                self.reset();
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wait_interval() {
        let mut clock = Clock::new(Hz(100));
        assert_eq!(clock.interval(), Duration::from_millis(10));

        let start = Instant::now();
        clock.wait();
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_frequency_does_not_wait() {
        let mut clock = Clock::new(Hz(0));
        let start = Instant::now();
        for _ in 0..1000 {
            clock.wait();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
