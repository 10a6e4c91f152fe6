//! Data Link Layer state machine.

pub mod retry;

pub use retry::{LinkErrorCounters, RetryCounter};

use crate::types::Mode;
use core::fmt;

/// Link states of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DlState {
    /// SIO, no communication.
    #[default]
    Inactive,
    /// An accepted mode switch awaits transceiver confirmation.
    ModeSwitching { target: Mode },
    /// Communicating, ready to start the next frame exchange.
    Active(Mode),
    /// A frame exchange is in progress.
    Transferring { mode: Mode },
    /// Communication stopped; only a fresh mode-set leaves this state.
    Fault,
}

impl DlState {
    /// The wire mode implied by the state, if communication is established.
    pub fn link_mode(self) -> Option<Mode> {
        match self {
            DlState::Active(mode) | DlState::Transferring { mode } => Some(mode),
            _ => None,
        }
    }

    /// True if link-bound services (PD update, events) can be accepted.
    pub fn has_link(self) -> bool {
        match self {
            DlState::Active(_) | DlState::Transferring { .. } => true,
            DlState::ModeSwitching { target } => target.is_active(),
            DlState::Inactive | DlState::Fault => false,
        }
    }

    /// States from which an accepted mode-set is started immediately.
    pub fn can_start_mode_switch(self) -> bool {
        matches!(self, DlState::Inactive | DlState::Active(_) | DlState::Fault)
    }
}

impl fmt::Display for DlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DlState::Inactive => write!(f, "Inactive"),
            DlState::ModeSwitching { target } => write!(f, "ModeSwitching({})", target),
            DlState::Active(mode) => write!(f, "Active({})", mode),
            DlState::Transferring { mode } => write!(f, "Transferring({})", mode),
            DlState::Fault => write!(f, "Fault"),
        }
    }
}

/// Inputs to the link state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlEvent {
    /// The transceiver accepted a switch to the given mode.
    ModeSetAccepted(Mode),
    /// The transceiver confirmed the given mode.
    ModeConfirmed(Mode),
    /// The mode switch timer expired.
    ModeSwitchTimeout,
    /// The transceiver accepted a frame.
    TransferAccepted,
    /// A frame exchange completed with a valid master frame.
    TransferSucceeded,
    /// A frame exchange failed in a way that will be retried.
    RecoverableError,
    /// Retries exhausted, protocol violation, cycle supervision or hardware
    /// fault.
    FatalError,
}

/// Computes the next link state. Every (state, event) pair has a defined
/// result; pairs without a transition keep the current state.
pub fn process_event(state: DlState, event: DlEvent) -> DlState {
    match (state, event) {
        // Fatal errors win over everything.
        (_, DlEvent::FatalError) => DlState::Fault,

        // --- Mode handling ---
        (
            DlState::Inactive | DlState::Active(_) | DlState::Fault,
            DlEvent::ModeSetAccepted(target),
        ) => DlState::ModeSwitching { target },
        (DlState::ModeSwitching { target }, DlEvent::ModeConfirmed(mode)) if mode == target => {
            if mode.is_active() {
                DlState::Active(mode)
            } else {
                DlState::Inactive
            }
        }
        // Confirmation of a mode that was not requested.
        (DlState::ModeSwitching { .. }, DlEvent::ModeConfirmed(_)) => DlState::Fault,
        (DlState::ModeSwitching { .. }, DlEvent::ModeSwitchTimeout) => DlState::Fault,

        // --- Cyclic exchange ---
        (DlState::Active(mode), DlEvent::TransferAccepted) => DlState::Transferring { mode },
        (
            DlState::Transferring { mode },
            DlEvent::TransferSucceeded | DlEvent::RecoverableError,
        ) => DlState::Active(mode),

        // Stale or out-of-place events.
        (current, _) => current,
    }
}
