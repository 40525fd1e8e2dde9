//! Wall-clock progress gating for long per-section loops

use std::time::{Duration, Instant};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Interval gate for periodic progress logging.
///
/// `has_interval_passed` returns true at most once per interval, so callers
/// can log inside tight loops without flooding the output.
#[derive(Debug)]
pub struct ProcessTimer {
    start: Instant,
    last_report: Instant,
    interval: Duration,
}

impl ProcessTimer {
    pub fn new() -> ProcessTimer {
        ProcessTimer::with_interval(DEFAULT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> ProcessTimer {
        let now = Instant::now();
        ProcessTimer {
            start: now,
            last_report: now,
            interval,
        }
    }

    pub fn has_interval_passed(&mut self) -> bool {
        if self.last_report.elapsed() >= self.interval {
            self.last_report = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl Default for ProcessTimer {
    fn default() -> Self {
        ProcessTimer::new()
    }
}
