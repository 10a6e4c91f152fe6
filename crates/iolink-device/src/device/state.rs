use super::Application;
use crate::al::{self, ApplicationLayer};
use crate::config::DeviceConfig;
use crate::dl::{self, DlEvent, DlState, LinkErrorCounters, RetryCounter};
use crate::hal::{IoLinkError, Transceiver};
use crate::log::{LinkContext, LogMetadata, link_info};
use crate::pl::PhysicalLayer;
use crate::service::{ServiceKind, ServiceResult, TransactionTable};
use crate::sm::{self, SystemManagement};
use crate::types::{DeviceId, Mode};
use alloc::vec::Vec;

/// Diagnostics of the most recent exchanges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleSnapshot {
    /// Process data carried by the last transmitted process data frame.
    pub last_tx: Vec<u8>,
    /// Output process data of the last valid master frame.
    pub last_rx: Vec<u8>,
    /// Successfully completed exchanges.
    pub cycles: u64,
}

/// The frame currently on the wire, kept for re-sending after a
/// recoverable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub frame: Vec<u8>,
    /// Transaction completed by this frame, if any.
    pub carries: Option<ServiceKind>,
    /// Process data carried, for the diagnostics snapshot.
    pub pd: Option<Vec<u8>>,
}

/// Holds the complete protocol state of one device.
pub struct DeviceContext<T: Transceiver> {
    pub id: DeviceId,
    pub config: DeviceConfig,
    pub state: DlState,
    pub pl: PhysicalLayer<T>,
    pub al: ApplicationLayer,
    pub sm: SystemManagement,
    pub transactions: TransactionTable,
    pub retry: RetryCounter,
    pub counters: LinkErrorCounters,
    pub snapshot: CycleSnapshot,
    pub(crate) in_flight: Option<InFlight>,
    /// Host time passed to the most recent tick.
    pub last_tick_us: u64,
}

impl<T: Transceiver> LogMetadata for DeviceContext<T> {
    fn meta(&self) -> LinkContext {
        LinkContext::new(self.id, "DL")
    }
}

impl<T: Transceiver> DeviceContext<T> {
    pub fn new(id: DeviceId, config: DeviceConfig, transceiver: T) -> Self {
        Self {
            id,
            state: DlState::Inactive,
            pl: PhysicalLayer::new(id, transceiver),
            al: ApplicationLayer::new(id, 0, 0),
            sm: SystemManagement::new(config.ident, config.com),
            transactions: TransactionTable::new(),
            retry: RetryCounter::new(config.max_retries),
            counters: LinkErrorCounters::new(),
            snapshot: CycleSnapshot::default(),
            in_flight: None,
            last_tick_us: 0,
            config,
        }
    }

    /// Negotiated (PD in, PD out) maxima for `mode`.
    pub fn pd_limits(&self, mode: Mode) -> (usize, usize) {
        let ceiling = self.config.max_pd_len(mode);
        let com = self.sm.com();
        (
            ceiling.min(com.pd_in_len as usize),
            ceiling.min(com.pd_out_len as usize),
        )
    }

    /// The mode whose limits apply to requests issued now.
    pub fn effective_mode(&self) -> Mode {
        match self.state {
            DlState::ModeSwitching { target } => target,
            state => state.link_mode().unwrap_or(Mode::Inactive),
        }
    }

    /// Feeds `event` to the link state machine and logs the change.
    pub(crate) fn transition(&mut self, event: DlEvent) {
        let next = dl::process_event(self.state, event);
        if next != self.state {
            link_info!(self, "{} -> {} ({:?})", self.state, next, event);
            self.state = next;
        }
    }
}

/// Routes `result` to the confirmation matching `kind`.
pub(crate) fn deliver<A: Application + ?Sized>(
    app: &mut A,
    kind: ServiceKind,
    result: ServiceResult,
    meta: LinkContext,
) {
    if let Some(result) = sm::confirm(app, kind, result) {
        al::confirm(app, kind, result, meta);
    }
}

/// Closes the transaction of `kind` with `result`, if it is open.
pub(crate) fn finish<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    kind: ServiceKind,
    result: ServiceResult,
) {
    if context.transactions.take(kind).is_some() {
        deliver(app, kind, result, context.meta());
    }
}

/// Fails every open transaction whose kind satisfies `select`.
pub(crate) fn fail_where<T: Transceiver, A: Application + ?Sized>(
    context: &mut DeviceContext<T>,
    app: &mut A,
    error: IoLinkError,
    select: impl Fn(ServiceKind) -> bool,
) {
    let meta = context.meta();
    for transaction in context.transactions.take_where(select) {
        deliver(app, transaction.kind(), ServiceResult::failure(error), meta);
    }
}
