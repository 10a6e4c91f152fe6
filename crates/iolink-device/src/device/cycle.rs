//! Per-tick dispatch work: mode switches, locally served requests and the
//! outbound half of the cyclic exchange.

use super::Application;
use super::state::{DeviceContext, InFlight, fail_where, finish};
use crate::dl::{DlEvent, DlState};
use crate::frame::DeviceFrame;
use crate::hal::{IoLinkError, Transceiver};
use crate::log::{link_debug, link_info, link_trace, link_warn};
use crate::service::{ServiceKind, ServiceRequest, ServiceResult};
use crate::timer::TimerKind;
use alloc::vec;
use alloc::vec::Vec;

/// Runs the dispatch work of the current state.
pub(super) fn dispatch<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    now_us: u64,
) {
    serve_get_mode(context, app);

    match context.state {
        DlState::Inactive => {
            if !start_mode_switch(context, app, now_us) {
                serve_parameters_locally(context, app);
            }
        }
        DlState::Fault => {
            start_mode_switch(context, app, now_us);
        }
        DlState::Active(_) => {
            if !start_mode_switch(context, app, now_us) {
                run_exchange(context, app, now_us);
            }
        }
        // Requests are held until the pending confirmation arrives.
        DlState::ModeSwitching { .. } | DlState::Transferring { .. } => {}
    }
}

/// Get-mode never touches the wire.
fn serve_get_mode<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
) {
    if context.transactions.pending(ServiceKind::GetMode).is_some() {
        let mode = context.pl.mode();
        finish(
            context,
            app,
            ServiceKind::GetMode,
            ServiceResult::success(Some(vec![u8::from(mode)])),
        );
    }
}

/// Ident and com requests are answered from the parameter store while no
/// link exists.
fn serve_parameters_locally<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
) {
    while let Some(transaction) = context.transactions.next_out_of_cycle() {
        let kind = transaction.kind();
        let result = match &transaction.request {
            // Not reachable without a link; cleared on the way to SIO.
            ServiceRequest::Event(_) | ServiceRequest::Isdu(_) => {
                ServiceResult::failure(IoLinkError::DeviceNotReady)
            }
            request => context.sm.complete(request),
        };
        link_debug!(context, "{} served locally", kind);
        finish(context, app, kind, result);
    }
}

/// Starts a pending mode-set. Returns true if the request was consumed,
/// whether the transceiver accepted it or not.
fn start_mode_switch<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    now_us: u64,
) -> bool {
    let Some(ServiceRequest::SetMode(target)) = context
        .transactions
        .pending(ServiceKind::SetMode)
        .map(|transaction| transaction.request.clone())
    else {
        return false;
    };

    if context.state == DlState::Fault {
        // Leftovers must not survive into the new link.
        fail_where(context, app, IoLinkError::DeviceNotReady, |kind| {
            !matches!(kind, ServiceKind::SetMode | ServiceKind::GetMode)
        });
    }

    if !context.pl.set_mode(target) {
        finish(
            context,
            app,
            ServiceKind::SetMode,
            ServiceResult::failure(IoLinkError::InvalidParameter),
        );
        return true;
    }

    link_info!(context, "Switching to {}", target);
    context.pl.stop_all_timers();
    context.in_flight = None;
    context.retry.reset();
    context.al.invalidate();
    context.transactions.requeue_dispatched();
    context.transactions.mark_dispatched(ServiceKind::SetMode, true);
    context.transition(DlEvent::ModeSetAccepted(target));
    context
        .pl
        .start_timer(TimerKind::ModeSwitch, context.config.mode_switch_timeout_us, now_us);
    true
}

/// Sends the next frame of the cycle, or re-sends the one awaiting retry.
fn run_exchange<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    now_us: u64,
) {
    let is_retry = context.in_flight.is_some();
    let in_flight = match context.in_flight.take() {
        Some(retry) => {
            let attempt = u16::from(context.retry.count()) + 1;
            link_debug!(context, "Re-sending frame (attempt {})", attempt);
            retry
        }
        None => match next_frame(context, app) {
            Some(next) => next,
            None => return,
        },
    };

    if !context.pl.transfer(&in_flight.frame) {
        link_trace!(context, "Transceiver busy, frame deferred to the next tick");
        // A deferred retry keeps its frame; a fresh one is rebuilt next time.
        if is_retry {
            context.in_flight = Some(in_flight);
        }
        return;
    }

    if let Some(kind) = in_flight.carries {
        context.transactions.mark_dispatched(kind, true);
    }
    if let Some(pd) = &in_flight.pd {
        context.snapshot.last_tx.clone_from(pd);
    }
    context.in_flight = Some(in_flight);
    context.transition(DlEvent::TransferAccepted);
    context
        .pl
        .start_timer(TimerKind::Transfer, context.config.transfer_timeout_us, now_us);
}

/// Picks the frame for this cycle: a pending PD in update first, then one
/// out-of-cycle service, otherwise the current PD in.
fn next_frame<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
) -> Option<InFlight> {
    if let Some(ServiceRequest::Transfer(data)) = context
        .transactions
        .pending(ServiceKind::Transfer)
        .map(|transaction| transaction.request.clone())
    {
        if let Err(e) = context.al.pd_in.check_len(data.len()) {
            // The negotiated length shrank since the request was accepted.
            link_warn!(context, "PD in update of {} octets no longer fits", data.len());
            finish(context, app, ServiceKind::Transfer, ServiceResult::failure(e));
            return None;
        }
        return Some(process_data_frame(context, data, Some(ServiceKind::Transfer)));
    }

    if let Some(transaction) = context.transactions.next_out_of_cycle() {
        let kind = transaction.kind();
        let payload = match &transaction.request {
            ServiceRequest::Event(code) => code.to_be_bytes().to_vec(),
            ServiceRequest::Isdu(response) => response.to_bytes(),
            request => context.sm.frame_payload(request),
        };
        let frame = DeviceFrame::Service { kind, payload }.encode();
        return Some(InFlight { frame, carries: Some(kind), pd: None });
    }

    let data = context.al.pd_in.data().to_vec();
    Some(process_data_frame(context, data, None))
}

fn process_data_frame<T: Transceiver>(
    context: &DeviceContext<T>,
    data: Vec<u8>,
    carries: Option<ServiceKind>,
) -> InFlight {
    let valid = carries.is_some() || context.al.pd_in.is_valid();
    let frame = DeviceFrame::ProcessData { valid, data: data.clone() }.encode();
    InFlight { frame, carries, pd: Some(data) }
}
