//! Frame codec for the single frame exchanged per cycle.
//!
//! Device to master: `[header][payload..][ckt]`. Header bits 7-6 hold the
//! frame kind, bits 5-0 the service code (service frames) or the PD-valid
//! flag in bit 0 (process data frames).
//!
//! Master to device: `[control][isdu..][pd_out..][ckt]`, control 0 meaning no
//! code. Bit 7 of the control octet announces a parameter request (see
//! `al::isdu`) between the control octet and the output data.
//!
//! `ckt` carries the 6-bit compressed checksum in its low bits.

use crate::al::IsduRequest;
use crate::hal::IoLinkError;
use crate::service::ServiceKind;
use crate::types::{FRAME_CHECKSUM_LEN, FRAME_HEADER_LEN};
use alloc::vec::Vec;
use core::convert::TryFrom;

/// Seed of the checksum accumulator (IO-Link A.1.6).
const CHECKSUM_SEED: u8 = 0x52;

const KIND_SHIFT: u8 = 6;
const KIND_PROCESS_DATA: u8 = 0b00;
const KIND_SERVICE: u8 = 0b01;
const CODE_MASK: u8 = 0x3F;
const PD_VALID_FLAG: u8 = 0x01;
const ISDU_FLAG: u8 = 0x80;

/// Computes the 6-bit checksum over `data`.
///
/// All octets are XORed into the seed, then the 8-bit result is folded into
/// six bits: bits 0-3 are the XOR of adjacent pairs, bits 4 and 5 the XOR of
/// the even and odd bit positions respectively.
pub fn checksum(data: &[u8]) -> u8 {
    let acc = data.iter().fold(CHECKSUM_SEED, |acc, byte| acc ^ byte);
    let bit = |n: u8| (acc >> n) & 1;

    let c0 = bit(1) ^ bit(0);
    let c1 = bit(3) ^ bit(2);
    let c2 = bit(5) ^ bit(4);
    let c3 = bit(7) ^ bit(6);
    let c4 = bit(6) ^ bit(4) ^ bit(2) ^ bit(0);
    let c5 = bit(7) ^ bit(5) ^ bit(3) ^ bit(1);

    (c5 << 5) | (c4 << 4) | (c3 << 3) | (c2 << 2) | (c1 << 1) | c0
}

/// Appends the checksum octet, computed with that octet zeroed.
fn seal(mut frame: Vec<u8>) -> Vec<u8> {
    frame.push(0);
    let ckt = checksum(&frame);
    if let Some(last) = frame.last_mut() {
        *last = ckt;
    }
    frame
}

/// Verifies and strips the checksum octet, returning the body.
fn unseal(frame: &[u8]) -> Result<&[u8], IoLinkError> {
    if frame.len() < FRAME_HEADER_LEN + FRAME_CHECKSUM_LEN {
        return Err(IoLinkError::ChecksumError);
    }
    let (body, ckt) = frame.split_at(frame.len() - FRAME_CHECKSUM_LEN);
    let received = ckt[0];
    if received & !CODE_MASK != 0 {
        return Err(IoLinkError::ChecksumError);
    }
    let mut scratch = Vec::with_capacity(frame.len());
    scratch.extend_from_slice(body);
    scratch.push(0);
    if checksum(&scratch) != received {
        return Err(IoLinkError::ChecksumError);
    }
    Ok(body)
}

/// In-band signal piggy-backed on a master frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCode {
    /// Input process data valid.
    PdInValid = 0x01,
    /// Input process data invalid.
    PdInInvalid = 0x02,
    /// Output process data valid.
    PdOutValid = 0x03,
    /// Output process data invalid or missing.
    PdOutInvalid = 0x04,
    /// The master requests a reset of the device application.
    ApplicationReset = 0x05,
}

impl ControlCode {
    /// Decodes the control octet. `Ok(None)` means no code was sent.
    pub fn decode(value: u8) -> Result<Option<Self>, IoLinkError> {
        match value {
            0x00 => Ok(None),
            other => ControlCode::try_from(other).map(Some),
        }
    }
}

impl TryFrom<u8> for ControlCode {
    type Error = IoLinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ControlCode::PdInValid),
            0x02 => Ok(ControlCode::PdInInvalid),
            0x03 => Ok(ControlCode::PdOutValid),
            0x04 => Ok(ControlCode::PdOutInvalid),
            0x05 => Ok(ControlCode::ApplicationReset),
            _ => Err(IoLinkError::ProtocolError),
        }
    }
}

impl From<ControlCode> for u8 {
    fn from(code: ControlCode) -> Self {
        code as u8
    }
}

/// A frame sent from the device to the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFrame {
    /// Cyclic input process data.
    ProcessData { valid: bool, data: Vec<u8> },
    /// An out-of-cycle service multiplexed onto the cycle.
    Service { kind: ServiceKind, payload: Vec<u8> },
}

impl DeviceFrame {
    pub fn encode(&self) -> Vec<u8> {
        let (header, body) = match self {
            DeviceFrame::ProcessData { valid, data } => {
                let flag = if *valid { PD_VALID_FLAG } else { 0 };
                ((KIND_PROCESS_DATA << KIND_SHIFT) | flag, data)
            }
            DeviceFrame::Service { kind, payload } => {
                ((KIND_SERVICE << KIND_SHIFT) | (kind.code() & CODE_MASK), payload)
            }
        };
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len() + FRAME_CHECKSUM_LEN);
        frame.push(header);
        frame.extend_from_slice(body);
        seal(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, IoLinkError> {
        let body = unseal(frame)?;
        let header = body[0];
        let payload = body[FRAME_HEADER_LEN..].to_vec();
        match header >> KIND_SHIFT {
            KIND_PROCESS_DATA => Ok(DeviceFrame::ProcessData {
                valid: header & PD_VALID_FLAG != 0,
                data: payload,
            }),
            KIND_SERVICE => {
                let kind = ServiceKind::from_code(header & CODE_MASK)
                    .ok_or(IoLinkError::ProtocolError)?;
                Ok(DeviceFrame::Service { kind, payload })
            }
            _ => Err(IoLinkError::ProtocolError),
        }
    }
}

/// A frame received from the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterFrame {
    pub control: Option<ControlCode>,
    pub isdu: Option<IsduRequest>,
    pub pd_out: Vec<u8>,
}

impl MasterFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + self.pd_out.len() + FRAME_CHECKSUM_LEN);
        let control = self.control.map(u8::from).unwrap_or(0);
        match &self.isdu {
            Some(request) => {
                frame.push(control | ISDU_FLAG);
                request.encode_into(&mut frame);
            }
            None => frame.push(control),
        }
        frame.extend_from_slice(&self.pd_out);
        seal(frame)
    }

    /// Checksum failures are reported as `ChecksumError`; an unknown control
    /// code or a malformed parameter request as `ProtocolError`, an oversized
    /// parameter value as `BufferOverflow`.
    pub fn decode(frame: &[u8]) -> Result<Self, IoLinkError> {
        let body = unseal(frame)?;
        let control = ControlCode::decode(body[0] & !ISDU_FLAG)?;
        let mut rest = &body[FRAME_HEADER_LEN..];
        let isdu = if body[0] & ISDU_FLAG != 0 {
            let (request, used) = IsduRequest::decode(rest)?;
            rest = &rest[used..];
            Some(request)
        } else {
            None
        };
        Ok(MasterFrame {
            control,
            isdu,
            pd_out: rest.to_vec(),
        })
    }
}
