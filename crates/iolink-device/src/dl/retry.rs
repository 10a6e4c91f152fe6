use crate::hal::IoLinkError;

/// Counts consecutive recoverable failures of the current frame.
///
/// Failures up to `limit` are retried; the next one escalates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    count: u8,
    limit: u8,
}

impl RetryCounter {
    pub fn new(limit: u8) -> Self {
        Self { count: 0, limit }
    }

    /// Records a failure. Returns true while the frame may still be retried.
    ///
    /// The budget is checked before counting, so a limit of `u8::MAX` still
    /// escalates once the counter saturates.
    pub fn record_failure(&mut self) -> bool {
        let retry = self.count < self.limit;
        self.count = self.count.saturating_add(1);
        retry
    }

    /// Called after every successful exchange.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn limit(&self) -> u8 {
        self.limit
    }
}

/// Cumulative link diagnostics. These never reset while the device lives.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkErrorCounters {
    pub checksum_errors: u32,
    pub frame_errors: u32,
    pub transfer_timeouts: u32,
    /// Frames re-sent after a recoverable error.
    pub retries: u32,
    /// Entries into the fault state.
    pub faults: u32,
}

impl LinkErrorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts a recoverable error by cause.
    pub fn record(&mut self, error: IoLinkError) {
        match error {
            IoLinkError::ChecksumError => {
                self.checksum_errors = self.checksum_errors.saturating_add(1)
            }
            IoLinkError::FrameError => self.frame_errors = self.frame_errors.saturating_add(1),
            IoLinkError::Timeout => {
                self.transfer_timeouts = self.transfer_timeouts.saturating_add(1)
            }
            _ => {}
        }
    }

    pub fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    pub fn record_fault(&mut self) {
        self.faults = self.faults.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_three_escalates_on_fourth() {
        let mut retry = RetryCounter::new(3);
        assert!(retry.record_failure());
        assert!(retry.record_failure());
        assert!(retry.record_failure());
        assert!(!retry.record_failure());
        assert_eq!(retry.count(), 4);
    }

    #[test]
    fn test_reset_after_success() {
        let mut retry = RetryCounter::new(1);
        assert!(retry.record_failure());
        retry.reset();
        assert!(retry.record_failure());
    }

    #[test]
    fn test_zero_limit_never_retries() {
        let mut retry = RetryCounter::new(0);
        assert!(!retry.record_failure());
    }

    #[test]
    fn test_largest_limit_still_escalates() {
        let mut retry = RetryCounter::new(u8::MAX);
        for _ in 0..u8::MAX {
            assert!(retry.record_failure());
        }
        assert_eq!(retry.count(), u8::MAX);
        assert!(!retry.record_failure());
        assert!(!retry.record_failure());
    }

    #[test]
    fn test_counters_by_cause() {
        let mut counters = LinkErrorCounters::new();
        counters.record(IoLinkError::ChecksumError);
        counters.record(IoLinkError::ChecksumError);
        counters.record(IoLinkError::Timeout);
        counters.record(IoLinkError::HardwareError);
        assert_eq!(counters.checksum_errors, 2);
        assert_eq!(counters.transfer_timeouts, 1);
        assert_eq!(counters.frame_errors, 0);
    }
}
