use crate::types::{Mode, ModeError};
use alloc::vec::Vec;
use core::fmt;

/// Defines a portable, descriptive Error type for the IO-Link device stack.
///
/// Every confirmation that does not succeed carries exactly one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IoLinkError {
    /// A request was malformed or the transceiver refused its parameters.
    InvalidParameter,
    /// A timer expired before the expected confirmation arrived.
    Timeout,
    /// A received frame failed checksum verification.
    ChecksumError,
    /// The transceiver reported a parity, framing or overrun fault.
    FrameError,
    /// A payload exceeds the negotiated maximum for the current mode.
    BufferOverflow,
    /// The service is busy or the link is in the wrong state for the request.
    DeviceNotReady,
    /// The transceiver reported a fault it cannot recover from.
    HardwareError,
    /// An out-of-sequence confirmation or an invalid control code was received.
    ProtocolError,
    /// The request addressed a device that does not exist.
    InvalidHandle,
}

impl IoLinkError {
    /// Errors that the data link layer retries locally before escalating.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            IoLinkError::ChecksumError | IoLinkError::FrameError | IoLinkError::Timeout
        )
    }

    /// Non-zero octet identifying the error when it travels on the wire.
    pub fn code(self) -> u8 {
        match self {
            IoLinkError::InvalidParameter => 0x01,
            IoLinkError::Timeout => 0x02,
            IoLinkError::ChecksumError => 0x03,
            IoLinkError::FrameError => 0x04,
            IoLinkError::BufferOverflow => 0x05,
            IoLinkError::DeviceNotReady => 0x06,
            IoLinkError::HardwareError => 0x07,
            IoLinkError::ProtocolError => 0x08,
            IoLinkError::InvalidHandle => 0x09,
        }
    }
}

impl fmt::Display for IoLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "Invalid or malformed request parameter"),
            Self::Timeout => write!(f, "Timer expired before the expected confirmation"),
            Self::ChecksumError => write!(f, "Frame checksum verification failed"),
            Self::FrameError => write!(f, "Transceiver reported a corrupted frame"),
            Self::BufferOverflow => write!(f, "Payload exceeds the negotiated maximum length"),
            Self::DeviceNotReady => write!(f, "Device is busy or not in a suitable state"),
            Self::HardwareError => write!(f, "Unrecoverable transceiver fault"),
            Self::ProtocolError => write!(f, "Out-of-sequence or invalid protocol element"),
            Self::InvalidHandle => write!(f, "Unknown or destroyed device handle"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IoLinkError {}

// --- From Implementations for Error Conversion ---

impl From<ModeError> for IoLinkError {
    fn from(_: ModeError) -> Self {
        IoLinkError::InvalidParameter
    }
}

impl From<TransferFault> for IoLinkError {
    fn from(fault: TransferFault) -> Self {
        match fault {
            TransferFault::Parity | TransferFault::Framing | TransferFault::Overrun => {
                IoLinkError::FrameError
            }
        }
    }
}

/// Supplementary status of a failed transfer as reported by the UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFault {
    /// UART detected a parity error.
    Parity,
    /// Invalid UART stop bit detected.
    Framing,
    /// Octet collision within the UART.
    Overrun,
}

/// Asynchronous completions reported by the transceiver.
///
/// These are polled once per tick; the transceiver must queue them until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlIndication {
    /// A previously accepted `set_mode` request has taken effect.
    ModeSwitched(Mode),
    /// A previously accepted transfer completed; carries the frame received
    /// from the master during the exchange.
    TransferComplete(Vec<u8>),
    /// A previously accepted transfer failed on the wire.
    TransferFailed(TransferFault),
    /// The line driver reported a fault (e.g., short circuit, overtemperature).
    HardwareFault,
}

/// Hardware Abstraction Layer (HAL) for the IO-Link transceiver.
///
/// This trait abstracts the line driver and UART so that the protocol logic
/// stays platform-agnostic (no_std). Both requests only report whether the
/// transceiver accepted them; the outcome arrives later via `poll_indication`.
pub trait Transceiver {
    /// Requests a switch of the C/Q line to `mode`.
    ///
    /// Returns `false` if the mode is unsupported or the driver refuses it.
    fn set_mode(&mut self, mode: Mode) -> bool;

    /// Hands a single frame to the wire.
    ///
    /// Returns `false` if the transceiver cannot accept a transfer right now.
    fn transfer(&mut self, frame: &[u8]) -> bool;

    /// Returns the next pending indication, if any.
    fn poll_indication(&mut self) -> Option<PlIndication>;
}
