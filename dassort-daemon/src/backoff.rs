use std::time::Duration;

/// Poll interval that doubles while nothing is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// `max` below `base` is raised to `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a poll and return the wait before the next one: back to
    /// `base` after work, doubled (capped at `max`) after an idle poll.
    pub fn advance(&mut self, processed: usize) -> Duration {
        self.current = if processed > 0 {
            self.base
        } else {
            self.current.saturating_mul(2).min(self.max)
        };
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn idle_polls_double_up_to_the_cap() {
        let mut b = Backoff::new(s(2), s(10));
        assert_eq!(b.current(), s(2));
        let waits: Vec<_> = (0..5).map(|_| b.advance(0)).collect();
        assert_eq!(waits, vec![s(4), s(8), s(10), s(10), s(10)]);
    }

    #[test]
    fn work_resets_to_base() {
        let mut b = Backoff::new(s(2), s(600));
        b.advance(0);
        b.advance(0);
        assert_eq!(b.advance(3), s(2));
        assert_eq!(b.advance(0), s(4));
    }

    #[test]
    fn cap_below_base_is_raised() {
        let mut b = Backoff::new(s(5), s(1));
        assert_eq!(b.advance(0), s(5));
    }
}
