//! Service transactions and their result wrapper.
//!
//! Confirmations carry no request token, so a device keeps at most one
//! outstanding transaction per service kind and rejects a second one.

use crate::al::IsduResponse;
use crate::hal::IoLinkError;
use crate::sm::{DeviceCom, DeviceIdent};
use crate::types::Mode;
use alloc::vec::Vec;
use core::fmt;

/// The services that may be outstanding on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceKind {
    SetMode,
    GetMode,
    SetIdent,
    GetIdent,
    SetCom,
    GetCom,
    /// AL process data (PD in) update.
    Transfer,
    /// AL device event.
    Event,
    /// Answer to a parameter access requested by the master.
    Isdu,
}

impl ServiceKind {
    pub const COUNT: usize = 9;

    pub const ALL: [ServiceKind; ServiceKind::COUNT] = [
        ServiceKind::SetMode,
        ServiceKind::GetMode,
        ServiceKind::SetIdent,
        ServiceKind::GetIdent,
        ServiceKind::SetCom,
        ServiceKind::GetCom,
        ServiceKind::Transfer,
        ServiceKind::Event,
        ServiceKind::Isdu,
    ];

    /// Services that travel as out-of-cycle service frames, in dispatch order.
    pub const OUT_OF_CYCLE: [ServiceKind; 6] = [
        ServiceKind::Event,
        ServiceKind::Isdu,
        ServiceKind::SetIdent,
        ServiceKind::GetIdent,
        ServiceKind::SetCom,
        ServiceKind::GetCom,
    ];

    fn slot(self) -> usize {
        match self {
            ServiceKind::SetMode => 0,
            ServiceKind::GetMode => 1,
            ServiceKind::SetIdent => 2,
            ServiceKind::GetIdent => 3,
            ServiceKind::SetCom => 4,
            ServiceKind::GetCom => 5,
            ServiceKind::Transfer => 6,
            ServiceKind::Event => 7,
            ServiceKind::Isdu => 8,
        }
    }

    /// Six-bit code used in the service frame header.
    pub fn code(self) -> u8 {
        match self {
            ServiceKind::SetMode => 0x01,
            ServiceKind::GetMode => 0x02,
            ServiceKind::SetIdent => 0x03,
            ServiceKind::GetIdent => 0x04,
            ServiceKind::SetCom => 0x05,
            ServiceKind::GetCom => 0x06,
            ServiceKind::Transfer => 0x07,
            ServiceKind::Event => 0x08,
            ServiceKind::Isdu => 0x09,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(ServiceKind::SetMode),
            0x02 => Some(ServiceKind::GetMode),
            0x03 => Some(ServiceKind::SetIdent),
            0x04 => Some(ServiceKind::GetIdent),
            0x05 => Some(ServiceKind::SetCom),
            0x06 => Some(ServiceKind::GetCom),
            0x07 => Some(ServiceKind::Transfer),
            0x08 => Some(ServiceKind::Event),
            0x09 => Some(ServiceKind::Isdu),
            _ => None,
        }
    }

    /// Services that can only complete over an established link.
    pub fn needs_link(self) -> bool {
        matches!(self, ServiceKind::Transfer | ServiceKind::Event | ServiceKind::Isdu)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The payload of a request, one variant per service kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    SetMode(Mode),
    GetMode,
    SetIdent(DeviceIdent),
    GetIdent,
    SetCom(DeviceCom),
    GetCom,
    Transfer(Vec<u8>),
    Event(u16),
    Isdu(IsduResponse),
}

impl ServiceRequest {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceRequest::SetMode(_) => ServiceKind::SetMode,
            ServiceRequest::GetMode => ServiceKind::GetMode,
            ServiceRequest::SetIdent(_) => ServiceKind::SetIdent,
            ServiceRequest::GetIdent => ServiceKind::GetIdent,
            ServiceRequest::SetCom(_) => ServiceKind::SetCom,
            ServiceRequest::GetCom => ServiceKind::GetCom,
            ServiceRequest::Transfer(_) => ServiceKind::Transfer,
            ServiceRequest::Event(_) => ServiceKind::Event,
            ServiceRequest::Isdu(_) => ServiceKind::Isdu,
        }
    }
}

/// Outcome of a transaction plus optional returned bytes.
///
/// Handed by value to exactly one confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResult {
    pub outcome: Result<(), IoLinkError>,
    pub payload: Option<Vec<u8>>,
}

impl ServiceResult {
    pub fn success(payload: Option<Vec<u8>>) -> Self {
        Self { outcome: Ok(()), payload }
    }

    pub fn failure(error: IoLinkError) -> Self {
        Self { outcome: Err(error), payload: None }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<IoLinkError> {
        self.outcome.err()
    }

    /// Converts into a plain `Result`, yielding the payload on success.
    pub fn into_result(self) -> Result<Option<Vec<u8>>, IoLinkError> {
        self.outcome.map(|()| self.payload)
    }
}

/// One outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub request: ServiceRequest,
    pub issued_us: u64,
    /// Set while the request rides on a frame that has not completed yet.
    pub dispatched: bool,
}

impl Transaction {
    pub fn kind(&self) -> ServiceKind {
        self.request.kind()
    }
}

/// Request slots, one per service kind.
#[derive(Debug, Default)]
pub struct TransactionTable {
    slots: [Option<Transaction>; ServiceKind::COUNT],
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupies the slot for the request's kind.
    ///
    /// Fails with `DeviceNotReady` if that kind is already outstanding.
    pub fn open(&mut self, request: ServiceRequest, now_us: u64) -> Result<(), IoLinkError> {
        let slot = &mut self.slots[request.kind().slot()];
        if slot.is_some() {
            return Err(IoLinkError::DeviceNotReady);
        }
        *slot = Some(Transaction {
            request,
            issued_us: now_us,
            dispatched: false,
        });
        Ok(())
    }

    pub fn is_open(&self, kind: ServiceKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&Transaction> {
        self.slots[kind.slot()].as_ref()
    }

    /// Returns the transaction if it is open and not yet riding on a frame.
    pub fn pending(&self, kind: ServiceKind) -> Option<&Transaction> {
        self.get(kind).filter(|t| !t.dispatched)
    }

    pub fn mark_dispatched(&mut self, kind: ServiceKind, dispatched: bool) {
        if let Some(transaction) = self.slots[kind.slot()].as_mut() {
            transaction.dispatched = dispatched;
        }
    }

    /// Returns every dispatched transaction to the pending state.
    pub fn requeue_dispatched(&mut self) {
        self.slots
            .iter_mut()
            .flatten()
            .for_each(|transaction| transaction.dispatched = false);
    }

    /// Frees the slot and hands the transaction to the caller for confirmation.
    pub fn take(&mut self, kind: ServiceKind) -> Option<Transaction> {
        self.slots[kind.slot()].take()
    }

    /// The first out-of-cycle service waiting for a frame.
    pub fn next_out_of_cycle(&self) -> Option<&Transaction> {
        ServiceKind::OUT_OF_CYCLE
            .iter()
            .find_map(|kind| self.pending(*kind))
    }

    /// Empties every slot.
    pub fn drain(&mut self) -> Vec<Transaction> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// Removes every transaction whose kind satisfies `select`.
    pub fn take_where(&mut self, select: impl Fn(ServiceKind) -> bool) -> Vec<Transaction> {
        self.slots
            .iter_mut()
            .filter(|slot| matches!(slot, Some(t) if select(t.kind())))
            .filter_map(Option::take)
            .collect()
    }

    pub fn outstanding(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_second_request_of_same_kind_is_busy() {
        let mut table = TransactionTable::new();
        assert_eq!(table.open(ServiceRequest::GetIdent, 0), Ok(()));
        assert_eq!(
            table.open(ServiceRequest::GetIdent, 5),
            Err(IoLinkError::DeviceNotReady)
        );
        // Other kinds are independent.
        assert_eq!(table.open(ServiceRequest::GetCom, 5), Ok(()));
        assert_eq!(table.outstanding(), 2);
        assert_eq!(table.get(ServiceKind::GetIdent).map(|t| t.issued_us), Some(0));
    }

    #[test]
    fn test_take_frees_the_slot() {
        let mut table = TransactionTable::new();
        table.open(ServiceRequest::Transfer(vec![1, 2]), 0).unwrap();
        let taken = table.take(ServiceKind::Transfer).unwrap();
        assert_eq!(taken.request, ServiceRequest::Transfer(vec![1, 2]));
        assert!(!table.is_open(ServiceKind::Transfer));
        assert!(table.open(ServiceRequest::Transfer(vec![3]), 1).is_ok());
    }

    #[test]
    fn test_out_of_cycle_order_skips_dispatched() {
        let mut table = TransactionTable::new();
        table.open(ServiceRequest::GetCom, 0).unwrap();
        table.open(ServiceRequest::Event(0x1800), 0).unwrap();
        assert_eq!(table.next_out_of_cycle().map(Transaction::kind), Some(ServiceKind::Event));

        table.mark_dispatched(ServiceKind::Event, true);
        assert_eq!(table.next_out_of_cycle().map(Transaction::kind), Some(ServiceKind::GetCom));

        table.requeue_dispatched();
        assert_eq!(table.next_out_of_cycle().map(Transaction::kind), Some(ServiceKind::Event));
    }

    #[test]
    fn test_drain_empties_everything() {
        let mut table = TransactionTable::new();
        table.open(ServiceRequest::SetMode(Mode::Com2), 0).unwrap();
        table.open(ServiceRequest::GetMode, 0).unwrap();
        assert_eq!(table.drain().len(), 2);
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn test_take_where_keeps_unselected() {
        let mut table = TransactionTable::new();
        table.open(ServiceRequest::Transfer(vec![1]), 0).unwrap();
        table.open(ServiceRequest::GetIdent, 0).unwrap();
        let taken = table.take_where(ServiceKind::needs_link);
        assert_eq!(taken.len(), 1);
        assert!(table.is_open(ServiceKind::GetIdent));
        assert!(!table.is_open(ServiceKind::Transfer));
    }

    #[test]
    fn test_service_result_accessors() {
        let ok = ServiceResult::success(Some(vec![0x02]));
        assert!(ok.is_success());
        assert_eq!(ok.into_result(), Ok(Some(vec![0x02])));

        let failed = ServiceResult::failure(IoLinkError::Timeout);
        assert_eq!(failed.error(), Some(IoLinkError::Timeout));
        assert_eq!(failed.into_result(), Err(IoLinkError::Timeout));
    }

    #[test]
    fn test_service_codes_round_trip() {
        for kind in ServiceKind::ALL {
            assert_eq!(ServiceKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ServiceKind::from_code(0x3F), None);
    }
}
