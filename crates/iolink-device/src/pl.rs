//! Physical Layer controller.
//!
//! Owns the wire mode and the device timers and forwards frames to the
//! transceiver. It never retries; that decision belongs to the data link
//! layer.

use crate::hal::{PlIndication, Transceiver};
use crate::log::{LinkContext, link_debug, link_trace, link_warn};
use crate::timer::{TimerKind, TimerService};
use crate::types::{DeviceId, Mode};

pub struct PhysicalLayer<T: Transceiver> {
    ctx: LinkContext,
    transceiver: T,
    /// Mode confirmed by the transceiver.
    mode: Mode,
    /// Mode of an accepted but not yet confirmed switch.
    requested: Option<Mode>,
    timers: TimerService,
}

impl<T: Transceiver> PhysicalLayer<T> {
    pub fn new(device: DeviceId, transceiver: T) -> Self {
        Self {
            ctx: LinkContext::new(device, "PL"),
            transceiver,
            mode: Mode::Inactive,
            requested: None,
            timers: TimerService::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Asks the transceiver to switch the line. `true` means the
    /// confirmation will arrive as `PlIndication::ModeSwitched`.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if self.transceiver.set_mode(mode) {
            link_debug!(self.ctx, "Mode switch to {} accepted", mode);
            self.requested = Some(mode);
            true
        } else {
            link_warn!(self.ctx, "Transceiver refused mode {}", mode);
            false
        }
    }

    /// Hands one frame to the wire.
    pub fn transfer(&mut self, frame: &[u8]) -> bool {
        let accepted = self.transceiver.transfer(frame);
        link_trace!(self.ctx, "TX {:02X?} accepted={}", frame, accepted);
        accepted
    }

    /// Retrieves the next transceiver indication.
    pub fn poll_indication(&mut self) -> Option<PlIndication> {
        let indication = self.transceiver.poll_indication()?;
        link_trace!(self.ctx, "Indication {:?}", indication);
        Some(indication)
    }

    /// Adopts `mode` once the data link layer has accepted its confirmation.
    ///
    /// Only the mode of the outstanding switch can be committed; anything
    /// else leaves the current mode untouched and returns false.
    pub fn commit_mode(&mut self, mode: Mode) -> bool {
        if self.requested != Some(mode) {
            link_warn!(self.ctx, "Mode {} confirmed but {:?} was requested", mode, self.requested);
            return false;
        }
        self.mode = mode;
        self.requested = None;
        true
    }

    pub fn start_timer(&mut self, kind: TimerKind, duration_us: u32, now_us: u64) {
        link_trace!(self.ctx, "Timer {} started ({} us)", kind, duration_us);
        self.timers.start(kind, duration_us, now_us);
    }

    pub fn restart_timer(&mut self, kind: TimerKind, duration_us: u32, now_us: u64) {
        self.timers.restart(kind, duration_us, now_us);
    }

    pub fn stop_timer(&mut self, kind: TimerKind) {
        self.timers.stop(kind);
    }

    pub fn stop_all_timers(&mut self) {
        self.timers.stop_all();
    }

    pub fn timer_running(&self, kind: TimerKind) -> bool {
        self.timers.is_running(kind)
    }

    pub fn next_expired(&mut self, now_us: u64) -> Option<TimerKind> {
        self.timers.next_expired(now_us)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    pub fn transceiver_mut(&mut self) -> &mut T {
        &mut self.transceiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Loopback {
        accept: bool,
        sent: Vec<Vec<u8>>,
        queue: VecDeque<PlIndication>,
    }

    impl Transceiver for Loopback {
        fn set_mode(&mut self, mode: Mode) -> bool {
            if self.accept {
                self.queue.push_back(PlIndication::ModeSwitched(mode));
            }
            self.accept
        }
        fn transfer(&mut self, frame: &[u8]) -> bool {
            self.sent.push(frame.to_vec());
            self.accept
        }
        fn poll_indication(&mut self) -> Option<PlIndication> {
            self.queue.pop_front()
        }
    }

    #[test]
    fn test_mode_changes_only_on_commit() {
        let mut pl = PhysicalLayer::new(DeviceId(0), Loopback { accept: true, ..Default::default() });
        assert!(pl.set_mode(Mode::Com3));
        assert_eq!(pl.poll_indication(), Some(PlIndication::ModeSwitched(Mode::Com3)));
        assert_eq!(pl.mode(), Mode::Inactive);

        assert!(pl.commit_mode(Mode::Com3));
        assert_eq!(pl.mode(), Mode::Com3);
        // The switch is closed; a repeated confirmation is not adopted.
        assert!(!pl.commit_mode(Mode::Com3));
    }

    #[test]
    fn test_unrequested_mode_is_not_committed() {
        let mut pl = PhysicalLayer::new(DeviceId(0), Loopback { accept: true, ..Default::default() });
        assert!(!pl.commit_mode(Mode::Com2));
        assert!(pl.set_mode(Mode::Com1));
        assert!(!pl.commit_mode(Mode::Com2));
        assert_eq!(pl.mode(), Mode::Inactive);
    }

    #[test]
    fn test_refused_requests() {
        let mut pl = PhysicalLayer::new(DeviceId(0), Loopback::default());
        assert!(!pl.set_mode(Mode::Com1));
        assert!(!pl.commit_mode(Mode::Com1));
        assert!(!pl.transfer(&[0x00, 0x2D]));
        assert_eq!(pl.transceiver().sent.len(), 1);
    }

    #[test]
    fn test_timer_passthrough() {
        let mut pl = PhysicalLayer::new(DeviceId(0), Loopback::default());
        pl.start_timer(TimerKind::Transfer, 10, 0);
        assert!(pl.timer_running(TimerKind::Transfer));
        pl.stop_all_timers();
        assert_eq!(pl.next_deadline(), None);
    }
}
