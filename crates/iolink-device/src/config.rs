use crate::hal::IoLinkError;
use crate::sm::{DeviceCom, DeviceIdent};
use crate::types::{
    DEFAULT_MAX_CYCLE_TIME_US, DEFAULT_MAX_RETRIES, DEFAULT_MODE_SWITCH_TIMEOUT_US,
    DEFAULT_TRANSFER_TIMEOUT_US, MAX_PD_LEN, Mode,
};

/// Static configuration of one device instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Supervision of a mode switch, in microseconds.
    pub mode_switch_timeout_us: u32,
    /// Supervision of a single frame exchange, in microseconds.
    pub transfer_timeout_us: u32,
    /// MaxCycleTime in microseconds. 0 disables cycle supervision.
    pub max_cycle_time_us: u32,
    /// Consecutive recoverable failures retried before the link faults.
    pub max_retries: u8,
    /// Maximum process data length per mode, in octets.
    pub max_pd_com1: u8,
    pub max_pd_com2: u8,
    pub max_pd_com3: u8,
    /// Identification loaded into the parameter store at startup.
    pub ident: DeviceIdent,
    /// Communication parameters loaded into the parameter store at startup.
    pub com: DeviceCom,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mode_switch_timeout_us: DEFAULT_MODE_SWITCH_TIMEOUT_US,
            transfer_timeout_us: DEFAULT_TRANSFER_TIMEOUT_US,
            max_cycle_time_us: DEFAULT_MAX_CYCLE_TIME_US,
            max_retries: DEFAULT_MAX_RETRIES,
            max_pd_com1: 8,
            max_pd_com2: 16,
            max_pd_com3: 32,
            ident: DeviceIdent::default(),
            com: DeviceCom::default(),
        }
    }
}

impl DeviceConfig {
    /// Checks the configuration before a device is built from it.
    pub fn validate(&self) -> Result<(), IoLinkError> {
        if self.mode_switch_timeout_us == 0 || self.transfer_timeout_us == 0 {
            return Err(IoLinkError::InvalidParameter);
        }
        let limits = [self.max_pd_com1, self.max_pd_com2, self.max_pd_com3];
        if limits.iter().any(|&len| len as usize > MAX_PD_LEN) {
            return Err(IoLinkError::InvalidParameter);
        }
        self.ident.validate()?;
        self.com.validate()
    }

    /// Configured process data ceiling for `mode`; 0 in SIO.
    pub fn max_pd_len(&self, mode: Mode) -> usize {
        let len = match mode {
            Mode::Inactive => 0,
            Mode::Com1 => self.max_pd_com1,
            Mode::Com2 => self.max_pd_com2,
            Mode::Com3 => self.max_pd_com3,
        };
        (len as usize).min(MAX_PD_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode_switch_timeout_us, 400_000);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_per_mode_limits() {
        let config = DeviceConfig::default();
        assert_eq!(config.max_pd_len(Mode::Inactive), 0);
        assert_eq!(config.max_pd_len(Mode::Com1), 8);
        assert_eq!(config.max_pd_len(Mode::Com3), 32);
    }

    #[test]
    fn test_rejects_oversized_limit_and_zero_timeouts() {
        let mut config = DeviceConfig { max_pd_com2: 40, ..Default::default() };
        assert_eq!(config.validate(), Err(IoLinkError::InvalidParameter));

        config.max_pd_com2 = 16;
        config.transfer_timeout_us = 0;
        assert_eq!(config.validate(), Err(IoLinkError::InvalidParameter));
    }
}
