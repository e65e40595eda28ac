/// Consecutive transport failures tolerated before giving up.
pub const SOCKET_RETRY: u32 = 100;

/// Counts down consecutive failures across calls, refilled by any success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
    remaining: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Spends one retry. Returns true once nothing is left.
    pub fn record_failure(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.is_exhausted()
    }

    pub fn reset(&mut self) {
        self.remaining = self.limit;
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(SOCKET_RETRY)
    }
}
