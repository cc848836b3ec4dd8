use std::time::{Duration, Instant};

/// Limits on how long the driver waits for a conversion to complete.
///
/// The default waits forever and never sleeps, so a stuck device blocks the caller
/// until the bus itself reports an error. Set a limit for unattended loggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollPolicy {
    /// Give up after this many reads.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since the first read.
    pub timeout: Option<Duration>,
    /// Sleep between consecutive reads.
    pub interval: Option<Duration>,
}

impl PollPolicy {
    /// Polls until ready or until the bus fails.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Polls at most `attempts` times.
    pub fn attempts(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
            ..Self::default()
        }
    }

    /// Polls for at most `timeout`.
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub(crate) fn start(&self) -> PollState {
        PollState {
            policy: *self,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// Book-keeping for one poll loop.
pub(crate) struct PollState {
    policy: PollPolicy,
    started: Instant,
    attempts: u32,
}

impl PollState {
    pub(crate) fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` if another read is allowed, sleeping for the configured interval first.
    pub(crate) fn wait_for_next(&self) -> bool {
        if self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return false;
        }

        if self
            .policy
            .timeout
            .is_some_and(|timeout| self.started.elapsed() >= timeout)
        {
            return false;
        }

        if let Some(interval) = self.policy.interval {
            std::thread::sleep(interval);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_gives_up() {
        let mut state = PollPolicy::unbounded().start();
        for _ in 0..10_000 {
            state.record_attempt();
            assert!(state.wait_for_next());
        }
    }

    #[test]
    fn attempt_cap() {
        let mut state = PollPolicy::attempts(3).start();
        state.record_attempt();
        assert!(state.wait_for_next());
        state.record_attempt();
        assert!(state.wait_for_next());
        state.record_attempt();
        assert!(!state.wait_for_next());
        assert_eq!(state.attempts(), 3);
    }

    #[test]
    fn zero_timeout_stops_immediately() {
        let mut state = PollPolicy::timeout(Duration::ZERO).start();
        state.record_attempt();
        assert!(!state.wait_for_next());
    }
}
