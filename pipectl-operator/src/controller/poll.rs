use std::time::Duration;

use tokio::time::{sleep, Instant};

/// A fixed interval poller bounded by a client side deadline.
///
/// The first poll is immediate. Each subsequent poll happens one interval later, and no poll is
/// made once the deadline has been reached. A deadline beyond the range of `Instant` is never reached.
pub struct Poller {
    interval: Duration,
    timeout: Duration,
    started: Instant,
    deadline: Option<Instant>,
    polls: u32,
}

impl Poller {
    /// Create a new instance, starting its clock now.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            interval,
            timeout,
            started,
            deadline: started.checked_add(timeout),
            polls: 0,
        }
    }

    /// Wait until the next poll is due, returning `false` if the deadline has been reached.
    pub async fn tick(&mut self) -> bool {
        if self.polls > 0 {
            sleep(self.interval).await;
            if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
                return false;
            }
        }
        self.polls += 1;
        true
    }

    /// The time elapsed since this poller was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The timeout of this poller.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The number of polls made so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }
}
