use core::time::Duration;
use std::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

/// Per-second byte budget derived from an hourly data rate.
///
/// Bytes are counted into a one second window. Once the window holds more
/// than the budget, the next line has to wait for the rest of the window
/// before a fresh window starts. Lines are only ever delayed.
#[derive(Debug, Clone)]
pub struct Throttle {
    budget: Option<f64>,
    window_start: Instant,
    window_bytes: u64,
}

impl Throttle {
    /// `0` disables throttling.
    pub fn per_hour(bytes_per_hour: u64) -> Self {
        Self::starting_at(bytes_per_hour, Instant::now())
    }

    pub fn starting_at(bytes_per_hour: u64, now: Instant) -> Self {
        Self {
            budget: (bytes_per_hour != 0).then(|| bytes_per_hour as f64 / 3600.0),
            window_start: now,
            window_bytes: 0,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.budget.is_some()
    }

    /// Counts `len` bytes about to be written and returns how long to pause
    /// before writing them.
    pub fn admit(&mut self, len: usize) -> Option<Duration> {
        self.admit_at(len, Instant::now())
    }

    pub fn admit_at(&mut self, len: usize, now: Instant) -> Option<Duration> {
        let budget = self.budget?;
        let mut pause = None;
        if self.window_bytes as f64 > budget {
            let wait = WINDOW.saturating_sub(now.saturating_duration_since(self.window_start));
            if !wait.is_zero() {
                pause = Some(wait);
            }
            self.window_start = now + wait;
            self.window_bytes = 0;
        }
        self.window_bytes += len as u64;
        pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_never_pauses() {
        let now = Instant::now();
        let mut throttle = Throttle::starting_at(0, now);
        assert!(!throttle.is_enabled());
        for _ in 0..1000 {
            assert_eq!(throttle.admit_at(1 << 20, now), None);
        }
    }

    #[test]
    fn pauses_for_rest_of_window_once_budget_exceeded() {
        let start = Instant::now();
        // 100 bytes per second
        let mut throttle = Throttle::starting_at(360_000, start);

        assert_eq!(throttle.admit_at(60, start), None);
        assert_eq!(throttle.admit_at(60, start), None);
        // 120 > 100: the third line waits out the window
        let later = start + Duration::from_millis(250);
        assert_eq!(
            throttle.admit_at(60, later),
            Some(Duration::from_millis(750))
        );
    }

    #[test]
    fn window_resets_after_pause() {
        let start = Instant::now();
        let mut throttle = Throttle::starting_at(360_000, start);
        throttle.admit_at(150, start);
        assert!(throttle.admit_at(10, start).is_some());
        // the new window starts at `start + 1s` and holds 10 bytes
        let next = start + Duration::from_secs(1);
        assert_eq!(throttle.admit_at(80, next), None);
        assert_eq!(throttle.admit_at(20, next), None);
        assert_eq!(throttle.admit_at(10, next), Some(Duration::from_secs(1)));
    }

    #[test]
    fn late_window_does_not_pause() {
        let start = Instant::now();
        let mut throttle = Throttle::starting_at(360_000, start);
        throttle.admit_at(500, start);
        assert_eq!(throttle.admit_at(10, start + Duration::from_secs(3)), None);
    }
}
