use core::convert::TryFrom;
use core::fmt;

/// Identifies one device instance managed by a host.
///
/// Requests addressed to a host-side registry carry this id instead of a raw
/// pointer or a global table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub u8);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

impl From<u8> for DeviceId {
    fn from(value: u8) -> Self {
        DeviceId(value)
    }
}

// --- Protocol Constants ---

/// Absolute upper bound for process data in either direction (32 octets).
pub const MAX_PD_LEN: usize = 32;

/// Length of the frame header octet.
pub const FRAME_HEADER_LEN: usize = 1;

/// Length of the trailing checksum octet.
pub const FRAME_CHECKSUM_LEN: usize = 1;

/// Mode-switch supervision used when no configuration overrides it (400 ms).
pub const DEFAULT_MODE_SWITCH_TIMEOUT_US: u32 = 400_000;

/// Transfer supervision used when no configuration overrides it (10 ms).
pub const DEFAULT_TRANSFER_TIMEOUT_US: u32 = 10_000;

/// MaxCycleTime used when no configuration overrides it (500 ms).
pub const DEFAULT_MAX_CYCLE_TIME_US: u32 = 500_000;

/// Consecutive recoverable transfer failures tolerated before escalation.
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Wire mode of the C/Q line.
///
/// `Inactive` is the SIO (standard I/O) state, the three `Com` variants are
/// the IO-Link transmission rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Mode {
    #[default]
    Inactive = 0x00,
    Com1 = 0x01,
    Com2 = 0x02,
    Com3 = 0x03,
}

impl Mode {
    /// Returns true for the three communication modes.
    pub fn is_active(self) -> bool {
        !matches!(self, Mode::Inactive)
    }

    /// Nominal transmission rate in bit/s, 0 for SIO.
    pub fn baud_rate(self) -> u32 {
        match self {
            Mode::Inactive => 0,
            Mode::Com1 => 4_800,
            Mode::Com2 => 38_400,
            Mode::Com3 => 230_400,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Inactive => write!(f, "SIO"),
            Mode::Com1 => write!(f, "COM1"),
            Mode::Com2 => write!(f, "COM2"),
            Mode::Com3 => write!(f, "COM3"),
        }
    }
}

/// Error type for invalid mode codes.
#[derive(Debug, PartialEq, Eq)]
pub enum ModeError {
    /// The code does not name a wire mode.
    InvalidCode(u8),
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeError::InvalidCode(value) => {
                write!(f, "Invalid mode code: {:#04x}. Valid codes are 0x00-0x03.", value)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ModeError {}

impl TryFrom<u8> for Mode {
    type Error = ModeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Mode::Inactive),
            0x01 => Ok(Mode::Com1),
            0x02 => Ok(Mode::Com2),
            0x03 => Ok(Mode::Com3),
            _ => Err(ModeError::InvalidCode(value)),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        mode as u8
    }
}
