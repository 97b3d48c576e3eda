//! Bounds-checked little-endian reader over a byte slice
//!
//! The GGUF header parser works on a prefix of the file whose size is only a
//! guess. Every read here checks the remaining length first and reports
//! [`InsufficientData`] instead of panicking, which is what drives the
//! adaptive buffer growth in [`crate::loader::gguf::parse_gguf`].

/// A read would run past the end of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient data at position {position}: needed {needed} bytes, {available} available")]
pub struct InsufficientData {
    pub position: usize,
    pub needed: u64,
    pub available: usize,
}

/// Sequential typed reader over a fixed byte buffer
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn insufficient(&self, needed: u64) -> InsufficientData {
        InsufficientData {
            position: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    /// Take `len` bytes and advance
    pub fn read_bytes(&mut self, len: u64) -> Result<&'a [u8], InsufficientData> {
        if len > self.remaining() as u64 {
            return Err(self.insufficient(len));
        }
        let len = len as usize;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], InsufficientData> {
        let bytes = self.read_bytes(N as u64)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, InsufficientData> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, InsufficientData> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, InsufficientData> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, InsufficientData> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, InsufficientData> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, InsufficientData> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Full 64-bit read; tensor offsets in large files need all of it
    pub fn read_u64(&mut self) -> Result<u64, InsufficientData> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, InsufficientData> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, InsufficientData> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, InsufficientData> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// One byte, any non-zero value is `true`
    pub fn read_bool(&mut self) -> Result<bool, InsufficientData> {
        Ok(self.read_u8()? != 0)
    }

    /// u64 length prefix followed by UTF-8 bytes (decoded lossily)
    ///
    /// The length is checked against the remaining buffer before anything is
    /// allocated, so a corrupt length cannot trigger a huge allocation.
    pub fn read_string(&mut self) -> Result<String, InsufficientData> {
        let start = self.pos;
        let len = self.read_u64()?;
        match self.read_bytes(len) {
            Ok(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Err(e) => {
                self.pos = start;
                Err(InsufficientData {
                    position: start,
                    needed: len.saturating_add(8),
                    available: e.available + 8,
                })
            }
        }
    }
}
