use std::io;

use crate::engine::errors::PostingError;

pub const MAX_VUINT32_LEN: usize = 5;
pub const MAX_VUINT64_LEN: usize = 10;

/// Number of bytes `v` takes as a VInt: `ceil(bits(v) / 7)`, at least 1.
#[inline]
pub fn vuint_len(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// VInt bytes of `v` in a stack buffer, with the used length.
#[inline]
pub fn vuint64_bytes(mut v: u64) -> ([u8; MAX_VUINT64_LEN], usize) {
    let mut buf = [0u8; MAX_VUINT64_LEN];
    let mut n = 0;
    while v >= 0x80 {
        buf[n] = (v as u8) | 0x80;
        v >>= 7;
        n += 1;
    }
    buf[n] = v as u8;
    (buf, n + 1)
}

#[inline]
pub fn encode_vuint64(v: u64, dst: &mut Vec<u8>) -> usize {
    let (buf, n) = vuint64_bytes(v);
    dst.extend_from_slice(&buf[..n]);
    n
}

#[inline]
pub fn encode_vuint32(v: u32, dst: &mut Vec<u8>) -> usize {
    encode_vuint64(v as u64, dst)
}

/// Sequential byte source shared by codecs and stream readers.
pub trait ByteRead {
    fn read_u8(&mut self) -> Result<u8, PostingError>;

    fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<(), PostingError>;

    fn read_vuint64(&mut self) -> Result<u64, PostingError> {
        let mut value = 0u64;
        for i in 0..MAX_VUINT64_LEN {
            let byte = self.read_u8()?;
            let shift = 7 * i as u32;
            let bits = (byte & 0x7f) as u64;
            if shift == 63 && bits > 1 {
                return Err(PostingError::corruption("VInt overflows 64 bits"));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(PostingError::corruption("VInt longer than 10 bytes"))
    }

    fn read_vuint32(&mut self) -> Result<u32, PostingError> {
        let v = self.read_vuint64()?;
        u32::try_from(v).map_err(|_| PostingError::corruption(format!("VInt {v} exceeds u32")))
    }

    fn read_u32_le(&mut self) -> Result<u32, PostingError> {
        let mut b = [0u8; 4];
        self.read_exact_into(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }
}

impl ByteRead for &[u8] {
    fn read_u8(&mut self) -> Result<u8, PostingError> {
        let (&first, rest) = self
            .split_first()
            .ok_or_else(|| PostingError::corruption("unexpected end of bytes"))?;
        *self = rest;
        Ok(first)
    }

    fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<(), PostingError> {
        if self.len() < dst.len() {
            return Err(PostingError::corruption(format!(
                "need {} bytes, {} left",
                dst.len(),
                self.len()
            )));
        }
        let (head, rest) = self.split_at(dst.len());
        dst.copy_from_slice(head);
        *self = rest;
        Ok(())
    }
}

/// The stream-writer collaborator: any `io::Write` plus VInt helpers.
pub trait VarIntWrite: io::Write {
    fn write_vuint32(&mut self, v: u32) -> io::Result<usize> {
        let (buf, n) = vuint64_bytes(v as u64);
        self.write_all(&buf[..n])?;
        Ok(n)
    }
}

impl<W: io::Write + ?Sized> VarIntWrite for W {}
