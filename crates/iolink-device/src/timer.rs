//! Per-device protocol timers.
//!
//! Timers are deadline entries evaluated against the host clock passed into
//! every tick; nothing here sleeps or spawns.

use core::fmt;

/// Protocol timers owned by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Supervises a mode switch until the transceiver confirms it.
    ModeSwitch,
    /// Supervises one frame exchange.
    Transfer,
    /// MaxCycleTime: supervises the interval between successful cycles.
    MaxCycle,
}

impl TimerKind {
    fn slot(self) -> usize {
        match self {
            TimerKind::ModeSwitch => 0,
            TimerKind::Transfer => 1,
            TimerKind::MaxCycle => 2,
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::ModeSwitch => write!(f, "ModeSwitch"),
            TimerKind::Transfer => write!(f, "Transfer"),
            TimerKind::MaxCycle => write!(f, "MaxCycle"),
        }
    }
}

/// A running timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub started_us: u64,
    pub duration_us: u32,
}

impl Timer {
    pub fn deadline_us(&self) -> u64 {
        self.started_us + self.duration_us as u64
    }
}

/// Holds at most one live timer per kind.
#[derive(Debug, Default)]
pub struct TimerService {
    slots: [Option<Timer>; 3],
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind`, replacing a running instance of the same kind.
    pub fn start(&mut self, kind: TimerKind, duration_us: u32, now_us: u64) {
        self.slots[kind.slot()] = Some(Timer {
            kind,
            started_us: now_us,
            duration_us,
        });
    }

    /// Start-if-absent, replace-if-present.
    pub fn restart(&mut self, kind: TimerKind, duration_us: u32, now_us: u64) {
        self.start(kind, duration_us, now_us);
    }

    /// Disarms `kind`. Stopping an idle timer is a no-op.
    pub fn stop(&mut self, kind: TimerKind) {
        self.slots[kind.slot()] = None;
    }

    pub fn stop_all(&mut self) {
        self.slots = [None; 3];
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    pub fn get(&self, kind: TimerKind) -> Option<&Timer> {
        self.slots[kind.slot()].as_ref()
    }

    /// Removes and returns the earliest timer whose deadline has passed.
    ///
    /// An expired instance is handed out exactly once.
    pub fn next_expired(&mut self, now_us: u64) -> Option<TimerKind> {
        let kind = self
            .slots
            .iter()
            .flatten()
            .filter(|timer| now_us >= timer.deadline_us())
            .min_by_key(|timer| timer.deadline_us())
            .map(|timer| timer.kind)?;
        self.stop(kind);
        Some(kind)
    }

    /// The earliest pending deadline, for hosts that schedule their ticks.
    pub fn next_deadline(&self) -> Option<u64> {
        self.slots.iter().flatten().map(Timer::deadline_us).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_expires_before_deadline() {
        let mut timers = TimerService::new();
        timers.start(TimerKind::ModeSwitch, 400_000, 1_000);
        assert_eq!(timers.next_expired(400_999), None);
        assert_eq!(timers.next_expired(401_000), Some(TimerKind::ModeSwitch));
    }

    #[test]
    fn test_expiry_is_delivered_once() {
        let mut timers = TimerService::new();
        timers.start(TimerKind::Transfer, 100, 0);
        assert_eq!(timers.next_expired(500), Some(TimerKind::Transfer));
        assert_eq!(timers.next_expired(600), None);
        assert!(!timers.is_running(TimerKind::Transfer));
    }

    #[test]
    fn test_restart_twice_behaves_like_once() {
        let mut timers = TimerService::new();
        timers.restart(TimerKind::MaxCycle, 1_000, 0);
        timers.restart(TimerKind::MaxCycle, 1_000, 0);
        assert_eq!(timers.next_deadline(), Some(1_000));
        assert_eq!(timers.next_expired(2_000), Some(TimerKind::MaxCycle));
        assert_eq!(timers.next_expired(3_000), None);
    }

    #[test]
    fn test_start_replaces_running_instance() {
        let mut timers = TimerService::new();
        timers.start(TimerKind::Transfer, 100, 0);
        timers.start(TimerKind::Transfer, 100, 80);
        assert_eq!(timers.next_expired(150), None);
        assert_eq!(timers.get(TimerKind::Transfer).map(Timer::deadline_us), Some(180));
    }

    #[test]
    fn test_stop_idle_timer_is_noop() {
        let mut timers = TimerService::new();
        timers.stop(TimerKind::ModeSwitch);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_earliest_deadline_first() {
        let mut timers = TimerService::new();
        timers.start(TimerKind::MaxCycle, 50, 0);
        timers.start(TimerKind::Transfer, 10, 0);
        assert_eq!(timers.next_expired(100), Some(TimerKind::Transfer));
        assert_eq!(timers.next_expired(100), Some(TimerKind::MaxCycle));
    }
}
