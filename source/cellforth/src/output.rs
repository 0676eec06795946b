use alloc::{borrow::Cow, string::String, vec::Vec};

/// Bytes written by `TYPE` and friends, held until the host drains them.
pub struct OutputBuf {
    buf: Vec<u8>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    OutputFull,
    FormattingErr,
}

impl OutputBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push_bstr(&mut self, bstr: &[u8]) -> Result<(), OutputError> {
        if self.buf.len() + bstr.len() > self.capacity {
            return Err(OutputError::OutputFull);
        }
        self.buf.extend_from_slice(bstr);
        Ok(())
    }

    pub fn push_str(&mut self, stir: &str) -> Result<(), OutputError> {
        self.push_bstr(stir.as_bytes())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The buffered text. Bytes that are not UTF-8 are replaced.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }
}

impl core::fmt::Write for OutputBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.push_str(s).map_err(|_| core::fmt::Error)
    }
}
