//! Fixed-delay scheduling between update cycles

use std::time::Duration;

use chrono::{DateTime, Local};

/// Fixed-delay timer between update cycles
///
/// The delay is measured from the end of one cycle to the start of the next,
/// so cycles never overlap. Waiting goes through `tokio::time`, which lets
/// tests drive the schedule with a paused clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wall-clock time of the next cycle if the timer were armed now
    pub fn next_run_at(&self) -> DateTime<Local> {
        let now = Local::now();
        chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(now)
    }

    /// Arm the timer and wait for it to fire
    pub async fn wait(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_run_is_one_interval_ahead() {
        let scheduler = Scheduler::new(Duration::from_secs(300));
        let before = Local::now();
        let next = scheduler.next_run_at();
        let ahead = next.signed_duration_since(before);

        assert!(ahead >= chrono::Duration::seconds(299));
        assert!(ahead <= chrono::Duration::seconds(301));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_the_interval() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let start = tokio::time::Instant::now();
        scheduler.wait().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }
}
