use crate::hal::IoLinkError;
use alloc::vec::Vec;

/// A process data image with an explicit validity flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessDataBuffer {
    data: Vec<u8>,
    max_len: usize,
    valid: bool,
}

impl ProcessDataBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            data: Vec::new(),
            max_len,
            valid: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn check_len(&self, len: usize) -> Result<(), IoLinkError> {
        if len > self.max_len {
            return Err(IoLinkError::BufferOverflow);
        }
        Ok(())
    }

    /// Replaces the content and marks the buffer valid.
    pub fn store(&mut self, data: &[u8]) -> Result<(), IoLinkError> {
        self.check_len(data.len())?;
        self.data.clear();
        self.data.extend_from_slice(data);
        self.valid = true;
        Ok(())
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Applies a new negotiated maximum; content beyond it is dropped.
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
        self.data.truncate(max_len);
    }
}
