//! Handling of transceiver indications and timer expiries.

use super::Application;
use super::state::{DeviceContext, fail_where, finish};
use crate::al::{AlServices, IsduRequest};
use crate::dl::{DlEvent, DlState};
use crate::frame::MasterFrame;
use crate::hal::{IoLinkError, PlIndication, Transceiver};
use crate::log::{link_debug, link_error, link_info, link_trace, link_warn};
use crate::service::{ServiceKind, ServiceRequest, ServiceResult};
use crate::timer::TimerKind;
use crate::types::Mode;
use alloc::vec;

/// Processes one indication retrieved from the transceiver.
pub(super) fn process_indication<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    indication: PlIndication,
    now_us: u64,
) {
    match indication {
        PlIndication::ModeSwitched(mode) => on_mode_switched(context, app, mode, now_us),
        PlIndication::TransferComplete(frame) => {
            if !matches!(context.state, DlState::Transferring { .. }) {
                link_warn!(context, "Ignoring transfer completion in state {}", context.state);
                return;
            }
            context.pl.stop_timer(TimerKind::Transfer);
            link_trace!(context, "RX {:02X?}", frame);
            match MasterFrame::decode(&frame) {
                Ok(master) => on_master_frame(context, app, master, now_us),
                Err(e) if e.is_recoverable() => on_recoverable_error(context, app, e),
                Err(e) => enter_fault(context, app, e),
            }
        }
        PlIndication::TransferFailed(fault) => {
            if !matches!(context.state, DlState::Transferring { .. }) {
                link_warn!(context, "Ignoring transfer failure ({:?}) in state {}", fault, context.state);
                return;
            }
            context.pl.stop_timer(TimerKind::Transfer);
            on_recoverable_error(context, app, fault.into());
        }
        PlIndication::HardwareFault => enter_fault(context, app, IoLinkError::HardwareError),
    }
}

/// Processes one expired timer.
pub(super) fn process_timer<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    kind: TimerKind,
) {
    match (kind, context.state) {
        (TimerKind::ModeSwitch, DlState::ModeSwitching { target }) => {
            link_warn!(context, "No confirmation of mode {} before the switch timer expired", target);
            enter_fault(context, app, IoLinkError::Timeout);
        }
        (TimerKind::Transfer, DlState::Transferring { .. }) => {
            on_recoverable_error(context, app, IoLinkError::Timeout);
        }
        (TimerKind::MaxCycle, DlState::Active(_) | DlState::Transferring { .. }) => {
            link_warn!(context, "MaxCycleTime exceeded without a successful exchange");
            enter_fault(context, app, IoLinkError::Timeout);
        }
        (kind, state) => {
            link_warn!(context, "Ignoring stale {} timer in state {}", kind, state);
        }
    }
}

fn on_mode_switched<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    mode: Mode,
    now_us: u64,
) {
    let DlState::ModeSwitching { target } = context.state else {
        link_warn!(context, "Ignoring mode confirmation {} in state {}", mode, context.state);
        return;
    };
    context.pl.stop_timer(TimerKind::ModeSwitch);
    if mode != target || !context.pl.commit_mode(mode) {
        link_error!(context, "Transceiver confirmed mode {} while {} was requested", mode, target);
        enter_fault(context, app, IoLinkError::ProtocolError);
        return;
    }

    context.transition(DlEvent::ModeConfirmed(mode));
    let (pd_in_max, pd_out_max) = context.pd_limits(mode);
    context.al.set_limits(pd_in_max, pd_out_max);
    context.retry.reset();

    if mode.is_active() {
        if context.config.max_cycle_time_us > 0 {
            context.pl.start_timer(TimerKind::MaxCycle, context.config.max_cycle_time_us, now_us);
        }
        link_info!(context, "Link established in {} (PD in {} / out {} octets)", mode, pd_in_max, pd_out_max);
    } else {
        fail_where(context, app, IoLinkError::DeviceNotReady, ServiceKind::needs_link);
    }
    finish(
        context,
        app,
        ServiceKind::SetMode,
        ServiceResult::success(Some(vec![u8::from(mode)])),
    );
}

/// Handles a valid master frame closing the current exchange.
fn on_master_frame<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    master: MasterFrame,
    now_us: u64,
) {
    if context.al.pd_out.check_len(master.pd_out.len()).is_err() {
        link_error!(
            context,
            "Master sent {} output octets, {} negotiated",
            master.pd_out.len(),
            context.al.pd_out.max_len()
        );
        enter_fault(context, app, IoLinkError::BufferOverflow);
        return;
    }

    context.retry.reset();
    if context.config.max_cycle_time_us > 0 {
        context.pl.restart_timer(TimerKind::MaxCycle, context.config.max_cycle_time_us, now_us);
    }
    context.transition(DlEvent::TransferSucceeded);
    context.al.pd_in.set_valid(true);
    context.snapshot.cycles = context.snapshot.cycles.saturating_add(1);
    context.snapshot.last_rx.clone_from(&master.pd_out);

    let carried = context.in_flight.take().and_then(|in_flight| in_flight.carries);
    if let Some(kind) = carried {
        complete_transaction(context, app, kind);
    }

    if !master.pd_out.is_empty() {
        context.al.deliver_output(app, &master.pd_out);
    }
    if let Some(code) = master.control {
        context.al.receive_control(code);
    }
    context.al.offer_control(app);
    if let Some(request) = master.isdu {
        accept_isdu(context, app, request, now_us);
    }
    app.al_cycle_ind();
}

/// Answers a parameter access through the application and queues the answer
/// for the next service frame.
fn accept_isdu<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    request: IsduRequest,
    now_us: u64,
) {
    if context.transactions.is_open(ServiceKind::Isdu) {
        link_warn!(
            context,
            "Parameter request {:#06X}.{} ignored, previous answer not yet sent",
            request.index(),
            request.subindex()
        );
        return;
    }
    let response = context.al.serve_isdu(app, &request);
    if let Err(e) = context.transactions.open(ServiceRequest::Isdu(response), now_us) {
        link_warn!(context, "Could not queue parameter answer: {}", e);
    }
}

/// Confirms the transaction that rode on the completed frame.
fn complete_transaction<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    kind: ServiceKind,
) {
    let Some(transaction) = context.transactions.get(kind) else {
        return;
    };
    let result = match &transaction.request {
        ServiceRequest::Transfer(data) => match context.al.pd_in.store(data) {
            Ok(()) => ServiceResult::success(None),
            Err(e) => ServiceResult::failure(e),
        },
        ServiceRequest::Event(code) => {
            link_debug!(context, "Event {:#06X} delivered", code);
            ServiceResult::success(None)
        }
        ServiceRequest::Isdu(response) => response.to_result(),
        request => context.sm.complete(request),
    };
    finish(context, app, kind, result);
}

/// Counts a recoverable failure and either keeps the frame for a retry or
/// escalates once the retry budget is spent.
fn on_recoverable_error<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    error: IoLinkError,
) {
    context.counters.record(error);
    context.transition(DlEvent::RecoverableError);
    app.al_cycle_ind();

    if context.retry.record_failure() {
        context.counters.record_retry();
        link_warn!(
            context,
            "{:?}, retry {}/{}",
            error,
            context.retry.count(),
            context.retry.limit()
        );
    } else {
        link_error!(context, "Retries exhausted after {:?}", error);
        enter_fault(context, app, error);
    }
}

/// Stops communication and fails every open transaction with `cause`.
pub(super) fn enter_fault<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    cause: IoLinkError,
) {
    link_error!(context, "Entering fault from {}: {}", context.state, cause);
    context.pl.stop_all_timers();
    context.in_flight = None;
    context.retry.reset();
    context.al.invalidate();
    context.counters.record_fault();
    context.transition(DlEvent::FatalError);
    fail_where(context, app, cause, |_| true);
}
