use super::state::{CycleSnapshot, DeviceContext, deliver};
use super::{Application, cycle, events};
use crate::al::ProcessDataBuffer;
use crate::config::DeviceConfig;
use crate::dl::{DlState, LinkErrorCounters};
use crate::hal::{IoLinkError, Transceiver};
use crate::log::{LogMetadata, link_debug, link_info, link_warn};
use crate::service::{ServiceKind, ServiceRequest, ServiceResult};
use crate::sm::{DeviceCom, DeviceIdent, SystemManagement};
use crate::types::{DeviceId, Mode};
use alloc::vec::Vec;

/// A complete IO-Link device: protocol layers plus the hosting application.
/// This struct is a thin wrapper around a context object that holds all
/// protocol state.
pub struct Device<T: Transceiver, A: Application> {
    context: DeviceContext<T>,
    app: A,
}

impl<T: Transceiver, A: Application> Device<T, A> {
    /// Creates a device in `Inactive` (SIO) state.
    pub fn new(
        id: DeviceId,
        config: DeviceConfig,
        transceiver: T,
        app: A,
    ) -> Result<Self, IoLinkError> {
        config.validate()?;
        let context = DeviceContext::new(id, config, transceiver);
        link_info!(context, "Device created");
        Ok(Self { context, app })
    }

    /// Advances the device by one step.
    ///
    /// Handles at most one transceiver indication, then every timer that is
    /// due at `now_us`, then the dispatch work of the resulting state.
    pub fn tick(&mut self, now_us: u64) -> DlState {
        let context = &mut self.context;
        context.last_tick_us = now_us;

        if let Some(indication) = context.pl.poll_indication() {
            events::process_indication(context, &mut self.app, indication, now_us);
        }
        while let Some(kind) = context.pl.next_expired(now_us) {
            events::process_timer(context, &mut self.app, kind);
        }
        cycle::dispatch(context, &mut self.app, now_us);
        context.state
    }

    // --- System Management requests ---

    pub fn sm_set_device_ident_req(&mut self, ident: DeviceIdent) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::SetIdent(ident))
    }

    pub fn sm_get_device_ident_req(&mut self) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::GetIdent)
    }

    pub fn sm_set_device_com_req(&mut self, com: DeviceCom) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::SetCom(com))
    }

    pub fn sm_get_device_com_req(&mut self) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::GetCom)
    }

    /// Requests a switch of the wire mode. Accepted in every state; the
    /// switch starts on the next tick that finds the link idle.
    pub fn sm_set_device_mode_req(&mut self, mode: Mode) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::SetMode(mode))
    }

    pub fn sm_get_device_mode_req(&mut self) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::GetMode)
    }

    // --- Application Layer requests ---

    /// Queues an update of the input process data image.
    pub fn set_input(&mut self, data: &[u8]) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::Transfer(data.to_vec()))
    }

    /// Queues a device event for transmission to the master.
    pub fn event_req(&mut self, code: u16) -> Result<(), IoLinkError> {
        self.submit(ServiceRequest::Event(code))
    }

    /// Opens a transaction, or confirms the rejection right away.
    fn submit(&mut self, request: ServiceRequest) -> Result<(), IoLinkError> {
        let kind = request.kind();
        let opened = self.check_request(&request).and_then(|()| {
            self.context
                .transactions
                .open(request, self.context.last_tick_us)
        });
        match opened {
            Ok(()) => {
                link_debug!(self.context, "{} request accepted in {}", kind, self.context.state);
                Ok(())
            }
            Err(e) => {
                link_warn!(self.context, "{} request rejected: {}", kind, e);
                deliver(&mut self.app, kind, ServiceResult::failure(e), self.context.meta());
                Err(e)
            }
        }
    }

    fn check_request(&self, request: &ServiceRequest) -> Result<(), IoLinkError> {
        let context = &self.context;
        let kind = request.kind();
        if context.transactions.is_open(kind) {
            return Err(IoLinkError::DeviceNotReady);
        }
        match request {
            ServiceRequest::SetMode(_) | ServiceRequest::GetMode => Ok(()),
            ServiceRequest::Transfer(data) => {
                if !context.state.has_link() {
                    return Err(IoLinkError::DeviceNotReady);
                }
                let (pd_in_max, _) = context.pd_limits(context.effective_mode());
                if data.len() > pd_in_max {
                    return Err(IoLinkError::BufferOverflow);
                }
                Ok(())
            }
            ServiceRequest::Event(_) => {
                if context.state.has_link() {
                    Ok(())
                } else {
                    Err(IoLinkError::DeviceNotReady)
                }
            }
            _ => {
                if context.state == DlState::Fault {
                    return Err(IoLinkError::DeviceNotReady);
                }
                SystemManagement::validate(request)
            }
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> DeviceId {
        self.context.id
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.context.config
    }

    pub fn state(&self) -> DlState {
        self.context.state
    }

    /// Wire mode of the last switch the data link layer accepted.
    pub fn mode(&self) -> Mode {
        self.context.pl.mode()
    }

    pub fn ident(&self) -> &DeviceIdent {
        self.context.sm.ident()
    }

    pub fn com(&self) -> &DeviceCom {
        self.context.sm.com()
    }

    pub fn pd_in(&self) -> &ProcessDataBuffer {
        &self.context.al.pd_in
    }

    pub fn pd_out(&self) -> &ProcessDataBuffer {
        &self.context.al.pd_out
    }

    /// Last output image the application refused, if it was not replaced
    /// by a later accepted one.
    pub fn unconsumed_output(&self) -> Option<&[u8]> {
        self.context.al.unconsumed_output()
    }

    pub fn is_outstanding(&self, kind: ServiceKind) -> bool {
        self.context.transactions.is_open(kind)
    }

    /// Kinds of all transactions currently awaiting confirmation.
    pub fn outstanding(&self) -> Vec<ServiceKind> {
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| self.context.transactions.is_open(*kind))
            .collect()
    }

    pub fn snapshot(&self) -> &CycleSnapshot {
        &self.context.snapshot
    }

    pub fn counters(&self) -> &LinkErrorCounters {
        &self.context.counters
    }

    /// Earliest timer deadline, so hosts can schedule the next tick.
    pub fn next_deadline(&self) -> Option<u64> {
        self.context.pl.next_deadline()
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn transceiver(&self) -> &T {
        self.context.pl.transceiver()
    }

    pub fn transceiver_mut(&mut self) -> &mut T {
        self.context.pl.transceiver_mut()
    }
}
