//! Indexed parameter access (ISDU) initiated by the master.
//!
//! A request rides in a master frame right after the control octet:
//! `[op][index hi][index lo][subindex]`, followed by `[len][data..]` for
//! writes. The device answers on a later service frame with
//! `[status][index hi][index lo][subindex][data..]`, status 0 meaning success.

use crate::hal::IoLinkError;
use crate::service::ServiceResult;
use alloc::vec::Vec;

/// Largest parameter value carried in either direction, in octets.
pub const MAX_ISDU_DATA_LEN: usize = 32;

const OP_READ: u8 = 0x01;
const OP_WRITE: u8 = 0x02;
const ADDRESS_LEN: usize = 4;
const STATUS_OK: u8 = 0x00;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsduRequest {
    Read { index: u16, subindex: u8 },
    Write { index: u16, subindex: u8, data: Vec<u8> },
}

impl IsduRequest {
    pub fn index(&self) -> u16 {
        match self {
            IsduRequest::Read { index, .. } | IsduRequest::Write { index, .. } => *index,
        }
    }

    pub fn subindex(&self) -> u8 {
        match self {
            IsduRequest::Read { subindex, .. } | IsduRequest::Write { subindex, .. } => *subindex,
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let index = self.index().to_be_bytes();
        match self {
            IsduRequest::Read { subindex, .. } => {
                out.extend_from_slice(&[OP_READ, index[0], index[1], *subindex]);
            }
            IsduRequest::Write { subindex, data, .. } => {
                out.extend_from_slice(&[OP_WRITE, index[0], index[1], *subindex]);
                out.push(data.len() as u8);
                out.extend_from_slice(data);
            }
        }
    }

    /// Decodes a request from the front of `bytes`, returning it together
    /// with the number of octets it occupied.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), IoLinkError> {
        if bytes.len() < ADDRESS_LEN {
            return Err(IoLinkError::ProtocolError);
        }
        let index = u16::from_be_bytes([bytes[1], bytes[2]]);
        let subindex = bytes[3];
        match bytes[0] {
            OP_READ => Ok((IsduRequest::Read { index, subindex }, ADDRESS_LEN)),
            OP_WRITE => {
                let len = *bytes.get(ADDRESS_LEN).ok_or(IoLinkError::ProtocolError)? as usize;
                if len > MAX_ISDU_DATA_LEN {
                    return Err(IoLinkError::BufferOverflow);
                }
                let start = ADDRESS_LEN + 1;
                let data = bytes
                    .get(start..start + len)
                    .ok_or(IoLinkError::ProtocolError)?
                    .to_vec();
                Ok((IsduRequest::Write { index, subindex, data }, start + len))
            }
            _ => Err(IoLinkError::ProtocolError),
        }
    }
}

/// The application's answer to an `IsduRequest`, waiting for its frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsduResponse {
    pub index: u16,
    pub subindex: u8,
    /// Read value (empty for writes) or the reason the access failed.
    pub outcome: Result<Vec<u8>, IoLinkError>,
}

impl IsduResponse {
    pub fn to_bytes(&self) -> Vec<u8> {
        let index = self.index.to_be_bytes();
        let status = match &self.outcome {
            Ok(_) => STATUS_OK,
            Err(e) => e.code(),
        };
        let mut bytes = Vec::with_capacity(ADDRESS_LEN + MAX_ISDU_DATA_LEN);
        bytes.extend_from_slice(&[status, index[0], index[1], self.subindex]);
        if let Ok(data) = &self.outcome {
            bytes.extend_from_slice(data);
        }
        bytes
    }

    /// Confirmation handed to the application once the answer reached the
    /// master.
    pub fn to_result(&self) -> ServiceResult {
        match &self.outcome {
            Ok(data) if data.is_empty() => ServiceResult::success(None),
            Ok(data) => ServiceResult::success(Some(data.clone())),
            Err(e) => ServiceResult::failure(*e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_write_request_layout() {
        let request = IsduRequest::Write { index: 0x0040, subindex: 2, data: vec![0xCA, 0xFE] };
        let mut bytes = Vec::new();
        request.encode_into(&mut bytes);
        assert_eq!(bytes, vec![OP_WRITE, 0x00, 0x40, 0x02, 0x02, 0xCA, 0xFE]);

        bytes.push(0x77);
        assert_eq!(IsduRequest::decode(&bytes), Ok((request, 7)));
    }

    #[test]
    fn test_malformed_requests() {
        assert_eq!(IsduRequest::decode(&[OP_READ, 0x00]), Err(IoLinkError::ProtocolError));
        assert_eq!(IsduRequest::decode(&[0x07, 0, 0, 0]), Err(IoLinkError::ProtocolError));
        assert_eq!(
            IsduRequest::decode(&[OP_WRITE, 0, 1, 0, 33]),
            Err(IoLinkError::BufferOverflow)
        );
        // Announced length runs past the frame.
        assert_eq!(
            IsduRequest::decode(&[OP_WRITE, 0, 1, 0, 3, 0xAA]),
            Err(IoLinkError::ProtocolError)
        );
    }

    #[test]
    fn test_response_status() {
        let ok = IsduResponse { index: 0x0010, subindex: 0, outcome: Ok(vec![0x41]) };
        assert_eq!(ok.to_bytes(), vec![STATUS_OK, 0x00, 0x10, 0x00, 0x41]);
        assert_eq!(ok.to_result(), ServiceResult::success(Some(vec![0x41])));

        let failed = IsduResponse {
            index: 0x0010,
            subindex: 1,
            outcome: Err(IoLinkError::BufferOverflow),
        };
        assert_eq!(
            failed.to_bytes(),
            vec![IoLinkError::BufferOverflow.code(), 0x00, 0x10, 0x01]
        );
        assert_eq!(failed.to_result(), ServiceResult::failure(IoLinkError::BufferOverflow));
    }
}
