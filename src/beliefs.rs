/// Per-user belief state a learning bidder accumulates from the rounds it won.
/// The feedback is censored: a bidder only observes a click outcome for
/// impressions it actually bought, so these counters grow one win at a time.

/// Running click statistics for one user
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickStat {
    pub successes: u64,
    pub attempts: u64,
}

/// Dense belief table keyed by the contiguous user id range fixed at construction
#[derive(Debug, Clone)]
pub struct ClickEstimates {
    stats: Vec<ClickStat>,
}

impl ClickEstimates {
    pub fn new(num_users: usize) -> Self {
        Self {
            stats: vec![ClickStat::default(); num_users],
        }
    }

    /// Record one observed impression outcome for a user
    pub fn record(&mut self, user_id: usize, clicked: bool) {
        let stat = &mut self.stats[user_id];
        stat.attempts += 1;
        if clicked {
            stat.successes += 1;
        }
    }

    /// Maximum-likelihood click rate observed for a user.
    /// A user with no observed attempts yet estimates to 0.0 rather than
    /// dividing by zero.
    pub fn estimate(&self, user_id: usize) -> f64 {
        let stat = &self.stats[user_id];
        if stat.attempts == 0 {
            return 0.0;
        }
        stat.successes as f64 / stat.attempts as f64
    }

    pub fn attempts(&self, user_id: usize) -> u64 {
        self.stats[user_id].attempts
    }

    /// Total attempts observed across all users
    pub fn total_attempts(&self) -> u64 {
        self.stats.iter().map(|stat| stat.attempts).sum()
    }

    /// Number of users with at least one observed attempt
    pub fn users_observed(&self) -> usize {
        self.stats.iter().filter(|stat| stat.attempts > 0).count()
    }

    pub fn num_users(&self) -> usize {
        self.stats.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_defaults_to_zero_without_attempts() {
        let estimates = ClickEstimates::new(3);
        assert_eq!(estimates.estimate(0), 0.0);
        assert_eq!(estimates.attempts(0), 0);
    }

    #[test]
    fn test_estimate_is_successes_over_attempts() {
        let mut estimates = ClickEstimates::new(2);
        estimates.record(1, true);
        estimates.record(1, false);
        estimates.record(1, true);
        estimates.record(1, true);
        assert_eq!(estimates.estimate(1), 0.75);
        assert_eq!(estimates.attempts(1), 4);
        // user 0 untouched
        assert_eq!(estimates.estimate(0), 0.0);
    }

    #[test]
    fn test_coverage_counters() {
        let mut estimates = ClickEstimates::new(4);
        estimates.record(0, false);
        estimates.record(2, true);
        estimates.record(2, true);
        assert_eq!(estimates.total_attempts(), 3);
        assert_eq!(estimates.users_observed(), 2);
        assert_eq!(estimates.num_users(), 4);
    }
}
