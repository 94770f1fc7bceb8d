use std::fmt;
use std::time::Duration;

use instant::Instant;

/// Wall-clock time spent in one phase of a step.
///
/// A timer accumulates across `resume`/`pause` pairs until `reset`, so the same
/// phase entered once per island or per sub-step adds up over the step.
#[derive(Copy, Clone, Debug, Default)]
pub struct Timer {
    elapsed: Duration,
    running_since: Option<Instant>,
}

impl Timer {
    /// A stopped timer with nothing accumulated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the accumulated time and start measuring.
    pub fn start(&mut self) {
        self.reset();
        self.resume();
    }

    /// Start measuring without forgetting the accumulated time.
    pub fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Stop measuring and add the time since the last `resume` or `start`.
    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.elapsed += since.elapsed();
        }
    }

    /// Drop the accumulated time and stop the timer.
    pub fn reset(&mut self) {
        self.elapsed = Duration::default();
        self.running_since = None;
    }

    /// Whether the timer is currently measuring.
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Accumulated time, in seconds. A running timer only counts completed spans.
    pub fn time(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}ms", self.time() * 1000.0)
    }
}

#[cfg(test)]
mod test {
    use super::Timer;

    #[test]
    fn pause_accumulates_and_reset_clears() {
        let mut timer = Timer::new();
        assert!(!timer.is_running());
        timer.start();
        assert!(timer.is_running());
        timer.pause();
        let first = timer.time();
        assert!(first >= 0.0);

        timer.resume();
        timer.pause();
        assert!(timer.time() >= first);

        timer.reset();
        assert_eq!(timer.time(), 0.0);
        assert!(!timer.is_running());
    }
}
