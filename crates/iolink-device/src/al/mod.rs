//! Application Layer: cyclic process data images, control codes, device
//! events and indexed parameter access towards the hosting application.

pub mod isdu;
pub mod process_data;

pub use isdu::{IsduRequest, IsduResponse, MAX_ISDU_DATA_LEN};
pub use process_data::ProcessDataBuffer;

use crate::frame::ControlCode;
use crate::hal::IoLinkError;
use crate::log::{LinkContext, link_debug, link_info, link_warn};
use crate::service::{ServiceKind, ServiceResult};
use crate::types::DeviceId;
use alloc::vec::Vec;

/// Indications and confirmations the hosting application must provide.
///
/// All methods run inside the device tick and must return promptly.
pub trait AlServices {
    /// Called once per completed cyclic exchange, successful or not.
    fn al_cycle_ind(&mut self);

    /// Freshly received output process data. Return `false` to reject it;
    /// the previously applied value then stays in effect.
    fn al_new_output_ind(&mut self, pd_out: &[u8]) -> bool;

    /// A control code arrived. Return `false` to have it offered again on a
    /// later cycle.
    fn al_control_ind(&mut self, code: ControlCode) -> bool;

    /// A device event transmission finished. The return value only
    /// acknowledges receipt.
    fn al_event_cnf(&mut self, result: ServiceResult) -> bool;

    /// A process data (PD in) update requested via `set_input` finished.
    fn al_transfer_cnf(&mut self, result: ServiceResult);

    /// The master reads the parameter at `index`/`subindex`.
    fn al_read_ind(&mut self, index: u16, subindex: u8) -> Result<Vec<u8>, IoLinkError>;

    /// The master writes `data` to the parameter at `index`/`subindex`.
    fn al_write_ind(&mut self, index: u16, subindex: u8, data: &[u8]) -> Result<(), IoLinkError>;

    /// The answer to a parameter access reached the master, or the link was
    /// lost before it could be sent.
    fn al_isdu_cnf(&mut self, result: ServiceResult);
}

/// What happened to a received output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDisposition {
    /// Same as the applied value; the application was not bothered.
    Unchanged,
    Applied,
    Rejected,
}

/// Application layer state for one device.
#[derive(Debug)]
pub struct ApplicationLayer {
    ctx: LinkContext,
    /// Input image (device to master).
    pub pd_in: ProcessDataBuffer,
    /// Output image (master to device) as last applied by the application.
    pub pd_out: ProcessDataBuffer,
    /// Last output image the application refused.
    unconsumed_out: Option<Vec<u8>>,
    pending_control: Option<ControlCode>,
}

impl ApplicationLayer {
    pub fn new(device: DeviceId, pd_in_max: usize, pd_out_max: usize) -> Self {
        Self {
            ctx: LinkContext::new(device, "AL"),
            pd_in: ProcessDataBuffer::new(pd_in_max),
            pd_out: ProcessDataBuffer::new(pd_out_max),
            unconsumed_out: None,
            pending_control: None,
        }
    }

    pub fn unconsumed_output(&self) -> Option<&[u8]> {
        self.unconsumed_out.as_deref()
    }

    pub fn pending_control(&self) -> Option<ControlCode> {
        self.pending_control
    }

    /// Applies new negotiated maxima after a mode change.
    pub fn set_limits(&mut self, pd_in_max: usize, pd_out_max: usize) {
        self.pd_in.set_max_len(pd_in_max);
        self.pd_out.set_max_len(pd_out_max);
    }

    /// Both images become invalid until the next successful exchange.
    pub fn invalidate(&mut self) {
        self.pd_in.set_valid(false);
        self.pd_out.set_valid(false);
        self.pending_control = None;
    }

    /// Offers a received output image to the application if it is fresh.
    pub fn deliver_output<A: AlServices + ?Sized>(
        &mut self,
        host: &mut A,
        data: &[u8],
    ) -> OutputDisposition {
        if self.pd_out.is_valid() && self.pd_out.data() == data {
            self.unconsumed_out = None;
            return OutputDisposition::Unchanged;
        }
        if !host.al_new_output_ind(data) {
            link_debug!(self.ctx, "Application rejected output image {:02X?}", data);
            self.unconsumed_out = Some(data.to_vec());
            return OutputDisposition::Rejected;
        }
        match self.pd_out.store(data) {
            Ok(()) => {
                self.unconsumed_out = None;
                OutputDisposition::Applied
            }
            Err(e) => {
                // Length was checked against the same limit before delivery.
                link_warn!(self.ctx, "Could not store output image: {:?}", e);
                self.unconsumed_out = Some(data.to_vec());
                OutputDisposition::Rejected
            }
        }
    }

    /// Runs a parameter access against the application and builds the answer.
    pub fn serve_isdu<A: AlServices + ?Sized>(
        &self,
        host: &mut A,
        request: &IsduRequest,
    ) -> IsduResponse {
        let outcome = match request {
            IsduRequest::Read { index, subindex } => {
                host.al_read_ind(*index, *subindex).and_then(|data| {
                    if data.len() > MAX_ISDU_DATA_LEN {
                        Err(IoLinkError::BufferOverflow)
                    } else {
                        Ok(data)
                    }
                })
            }
            IsduRequest::Write { index, subindex, data } => {
                host.al_write_ind(*index, *subindex, data).map(|()| Vec::new())
            }
        };
        if let Err(e) = &outcome {
            link_debug!(
                self.ctx,
                "Parameter {:#06X}.{} access failed: {:?}",
                request.index(),
                request.subindex(),
                e
            );
        }
        IsduResponse {
            index: request.index(),
            subindex: request.subindex(),
            outcome,
        }
    }

    /// Records a newly received control code; a still-pending one is replaced.
    pub fn receive_control(&mut self, code: ControlCode) {
        if let Some(previous) = self.pending_control.replace(code) {
            if previous != code {
                link_warn!(self.ctx, "Control code {:?} superseded by {:?} before acknowledgement", previous, code);
            }
        }
    }

    /// Offers the pending control code, if any. Returns true if acknowledged.
    pub fn offer_control<A: AlServices + ?Sized>(&mut self, host: &mut A) -> bool {
        let Some(code) = self.pending_control else {
            return false;
        };
        if host.al_control_ind(code) {
            link_info!(self.ctx, "Control code {:?} acknowledged", code);
            self.pending_control = None;
            true
        } else {
            link_debug!(self.ctx, "Control code {:?} not accepted, offering again next cycle", code);
            false
        }
    }
}

/// Routes a confirmation to the matching `AlServices` method.
///
/// Returns the result back if `kind` is not an AL service.
pub(crate) fn confirm<A: AlServices + ?Sized>(
    host: &mut A,
    kind: ServiceKind,
    result: ServiceResult,
    ctx: LinkContext,
) -> Option<ServiceResult> {
    match kind {
        ServiceKind::Transfer => host.al_transfer_cnf(result),
        ServiceKind::Isdu => host.al_isdu_cnf(result),
        ServiceKind::Event => {
            if !host.al_event_cnf(result) {
                link_debug!(ctx, "Event confirmation not acknowledged by the application");
            }
        }
        _ => return Some(result),
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Host {
        accept_output: bool,
        accept_control: bool,
        outputs: Vec<Vec<u8>>,
        controls: Vec<ControlCode>,
    }

    impl AlServices for Host {
        fn al_cycle_ind(&mut self) {}
        fn al_new_output_ind(&mut self, pd_out: &[u8]) -> bool {
            self.outputs.push(pd_out.to_vec());
            self.accept_output
        }
        fn al_control_ind(&mut self, code: ControlCode) -> bool {
            self.controls.push(code);
            self.accept_control
        }
        fn al_event_cnf(&mut self, _result: ServiceResult) -> bool {
            true
        }
        fn al_transfer_cnf(&mut self, _result: ServiceResult) {}
        fn al_read_ind(&mut self, index: u16, _subindex: u8) -> Result<Vec<u8>, IoLinkError> {
            match index {
                0x0010 => Ok(vec![0x55; MAX_ISDU_DATA_LEN + 1]),
                _ => Err(IoLinkError::InvalidParameter),
            }
        }
        fn al_write_ind(&mut self, _index: u16, _subindex: u8, data: &[u8]) -> Result<(), IoLinkError> {
            self.outputs.push(data.to_vec());
            Ok(())
        }
        fn al_isdu_cnf(&mut self, _result: ServiceResult) {}
    }

    #[test]
    fn test_rejected_output_keeps_previous_value() {
        let mut al = ApplicationLayer::new(DeviceId(1), 8, 8);
        let mut host = Host { accept_output: true, ..Default::default() };
        assert_eq!(al.deliver_output(&mut host, &[0x01]), OutputDisposition::Applied);

        host.accept_output = false;
        assert_eq!(
            al.deliver_output(&mut host, &[0xAA, 0xBB, 0xCC, 0xDD]),
            OutputDisposition::Rejected
        );
        assert_eq!(al.pd_out.data(), &[0x01]);
        assert_eq!(al.unconsumed_output(), Some(&[0xAA, 0xBB, 0xCC, 0xDD][..]));
    }

    #[test]
    fn test_unchanged_output_is_not_offered_again() {
        let mut al = ApplicationLayer::new(DeviceId(1), 8, 8);
        let mut host = Host { accept_output: true, ..Default::default() };
        al.deliver_output(&mut host, &[0x05]);
        assert_eq!(al.deliver_output(&mut host, &[0x05]), OutputDisposition::Unchanged);
        assert_eq!(host.outputs, vec![vec![0x05]]);
    }

    #[test]
    fn test_refused_control_is_offered_again() {
        let mut al = ApplicationLayer::new(DeviceId(1), 8, 8);
        let mut host = Host::default();
        al.receive_control(ControlCode::ApplicationReset);

        assert!(!al.offer_control(&mut host));
        assert_eq!(al.pending_control(), Some(ControlCode::ApplicationReset));

        host.accept_control = true;
        assert!(al.offer_control(&mut host));
        assert_eq!(al.pending_control(), None);
        assert_eq!(host.controls.len(), 2);
    }

    #[test]
    fn test_isdu_answers() {
        let al = ApplicationLayer::new(DeviceId(1), 8, 8);
        let mut host = Host::default();

        let oversized = al.serve_isdu(&mut host, &IsduRequest::Read { index: 0x0010, subindex: 0 });
        assert_eq!(oversized.outcome, Err(IoLinkError::BufferOverflow));

        let unknown = al.serve_isdu(&mut host, &IsduRequest::Read { index: 0x0099, subindex: 3 });
        assert_eq!(unknown.outcome, Err(IoLinkError::InvalidParameter));
        assert_eq!((unknown.index, unknown.subindex), (0x0099, 3));

        let write = IsduRequest::Write { index: 0x0020, subindex: 0, data: vec![1, 2] };
        assert_eq!(al.serve_isdu(&mut host, &write).outcome, Ok(Vec::new()));
        assert_eq!(host.outputs, vec![vec![1, 2]]);
    }

    #[test]
    fn test_invalidate_clears_validity() {
        let mut al = ApplicationLayer::new(DeviceId(1), 8, 8);
        al.pd_in.store(&[1]).unwrap();
        al.invalidate();
        assert!(!al.pd_in.is_valid());
        assert_eq!(al.pd_in.data(), &[1]);
    }
}
