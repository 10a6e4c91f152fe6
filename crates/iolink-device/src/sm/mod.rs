//! System Management: device identification, communication parameters and
//! device mode, each as a request/confirmation pair.

use crate::hal::IoLinkError;
use crate::service::{ServiceKind, ServiceRequest, ServiceResult};
use crate::types::{MAX_PD_LEN, Mode};
use alloc::vec;
use alloc::vec::Vec;
use core::convert::TryFrom;

/// Largest value representable in the 24-bit device id.
pub const MAX_DEVICE_ID: u32 = 0x00FF_FFFF;

/// Confirmations delivered to the management caller.
///
/// Every request issued through a device ends in exactly one call here.
pub trait SmServices {
    fn sm_set_device_ident_cnf(&mut self, result: ServiceResult);
    fn sm_get_device_ident_cnf(&mut self, result: ServiceResult);
    fn sm_set_device_com_cnf(&mut self, result: ServiceResult);
    fn sm_get_device_com_cnf(&mut self, result: ServiceResult);
    fn sm_set_device_mode_cnf(&mut self, result: ServiceResult);
    fn sm_get_device_mode_cnf(&mut self, result: ServiceResult);
}

/// Vendor id, device id and function id triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdent {
    pub vendor_id: u16,
    /// 24-bit value.
    pub device_id: u32,
    pub function_id: u16,
}

impl DeviceIdent {
    pub const ENCODED_LEN: usize = 7;

    pub fn new(vendor_id: u16, device_id: u32, function_id: u16) -> Result<Self, IoLinkError> {
        let ident = Self { vendor_id, device_id, function_id };
        ident.validate()?;
        Ok(ident)
    }

    pub fn validate(&self) -> Result<(), IoLinkError> {
        if self.device_id > MAX_DEVICE_ID {
            return Err(IoLinkError::InvalidParameter);
        }
        Ok(())
    }

    /// Big-endian: vendor (2), device (3), function (2).
    pub fn to_bytes(&self) -> Vec<u8> {
        let vendor = self.vendor_id.to_be_bytes();
        let device = self.device_id.to_be_bytes();
        let function = self.function_id.to_be_bytes();
        vec![vendor[0], vendor[1], device[1], device[2], device[3], function[0], function[1]]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IoLinkError> {
        let bytes: &[u8; Self::ENCODED_LEN] = bytes
            .try_into()
            .map_err(|_| IoLinkError::InvalidParameter)?;
        Ok(Self {
            vendor_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            device_id: u32::from_be_bytes([0, bytes[2], bytes[3], bytes[4]]),
            function_id: u16::from_be_bytes([bytes[5], bytes[6]]),
        })
    }
}

/// Communication parameters negotiated with the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceCom {
    /// Fastest mode the device supports.
    pub supported_mode: Mode,
    /// MinCycleTime in units of 100 us.
    pub min_cycle_time: u8,
    pub msequence_capability: u8,
    pub revision_id: u8,
    pub pd_in_len: u8,
    pub pd_out_len: u8,
}

impl Default for DeviceCom {
    fn default() -> Self {
        Self {
            supported_mode: Mode::Com2,
            min_cycle_time: 23,
            msequence_capability: 0,
            revision_id: 0x11,
            pd_in_len: 4,
            pd_out_len: 4,
        }
    }
}

impl DeviceCom {
    pub const ENCODED_LEN: usize = 6;

    pub fn validate(&self) -> Result<(), IoLinkError> {
        if !self.supported_mode.is_active() {
            return Err(IoLinkError::InvalidParameter);
        }
        if self.pd_in_len as usize > MAX_PD_LEN || self.pd_out_len as usize > MAX_PD_LEN {
            return Err(IoLinkError::InvalidParameter);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        vec![
            u8::from(self.supported_mode),
            self.min_cycle_time,
            self.msequence_capability,
            self.revision_id,
            self.pd_in_len,
            self.pd_out_len,
        ]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IoLinkError> {
        let bytes: &[u8; Self::ENCODED_LEN] = bytes
            .try_into()
            .map_err(|_| IoLinkError::InvalidParameter)?;
        let com = Self {
            supported_mode: Mode::try_from(bytes[0])?,
            min_cycle_time: bytes[1],
            msequence_capability: bytes[2],
            revision_id: bytes[3],
            pd_in_len: bytes[4],
            pd_out_len: bytes[5],
        };
        com.validate()?;
        Ok(com)
    }
}

/// Device-side parameter store behind the SM services.
#[derive(Debug, Clone, Default)]
pub struct SystemManagement {
    ident: DeviceIdent,
    com: DeviceCom,
}

impl SystemManagement {
    pub fn new(ident: DeviceIdent, com: DeviceCom) -> Self {
        Self { ident, com }
    }

    pub fn ident(&self) -> &DeviceIdent {
        &self.ident
    }

    pub fn com(&self) -> &DeviceCom {
        &self.com
    }

    /// Request-time validation of SM payloads.
    pub fn validate(request: &ServiceRequest) -> Result<(), IoLinkError> {
        match request {
            ServiceRequest::SetIdent(ident) => ident.validate(),
            ServiceRequest::SetCom(com) => com.validate(),
            _ => Ok(()),
        }
    }

    /// Payload carried by the service frame for an ident/com request.
    pub fn frame_payload(&self, request: &ServiceRequest) -> Vec<u8> {
        match request {
            ServiceRequest::SetIdent(ident) => ident.to_bytes(),
            ServiceRequest::SetCom(com) => com.to_bytes(),
            ServiceRequest::GetIdent => self.ident.to_bytes(),
            ServiceRequest::GetCom => self.com.to_bytes(),
            _ => Vec::new(),
        }
    }

    /// Applies a completed ident/com request to the store and builds its
    /// confirmation.
    pub fn complete(&mut self, request: &ServiceRequest) -> ServiceResult {
        match request {
            ServiceRequest::SetIdent(ident) => {
                self.ident = *ident;
                ServiceResult::success(None)
            }
            ServiceRequest::SetCom(com) => {
                self.com = *com;
                ServiceResult::success(None)
            }
            ServiceRequest::GetIdent => ServiceResult::success(Some(self.ident.to_bytes())),
            ServiceRequest::GetCom => ServiceResult::success(Some(self.com.to_bytes())),
            _ => ServiceResult::failure(IoLinkError::InvalidParameter),
        }
    }
}

/// Routes a confirmation to the matching `SmServices` method.
///
/// Returns the result back if `kind` is not an SM service.
pub(crate) fn confirm<S: SmServices + ?Sized>(
    host: &mut S,
    kind: ServiceKind,
    result: ServiceResult,
) -> Option<ServiceResult> {
    match kind {
        ServiceKind::SetIdent => host.sm_set_device_ident_cnf(result),
        ServiceKind::GetIdent => host.sm_get_device_ident_cnf(result),
        ServiceKind::SetCom => host.sm_set_device_com_cnf(result),
        ServiceKind::GetCom => host.sm_get_device_com_cnf(result),
        ServiceKind::SetMode => host.sm_set_device_mode_cnf(result),
        ServiceKind::GetMode => host.sm_get_device_mode_cnf(result),
        ServiceKind::Transfer | ServiceKind::Event | ServiceKind::Isdu => return Some(result),
    }
    None
}
