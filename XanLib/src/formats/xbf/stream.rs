//! Bounded little-endian reader shared by the XBF codecs
//!
//! Every read is checked against the bytes left in the stream before any
//! buffer is allocated, so a corrupt count surfaces as
//! [`Error::TruncatedInput`] instead of a huge allocation.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Sequential reader over a seekable XBF stream.
///
/// Offsets are counted from the stream position the reader was created at,
/// so errors report the same offsets whether a scene is read from a buffer
/// or from the middle of a larger stream.
#[derive(Debug)]
pub struct XbfReader<R> {
    inner: R,
    base: u64,
    pos: u64,
    len: u64,
}

impl<R: Read + Seek> XbfReader<R> {
    /// Wrap a stream, starting at its current position.
    pub fn new(mut inner: R) -> Result<Self> {
        let base = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(base))?;
        Ok(Self {
            inner,
            base,
            pos: 0,
            len: end.saturating_sub(base),
        })
    }

    /// Current offset from the starting position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes between the starting position and the end of the stream.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    /// Bytes left between the current offset and the end of the stream.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Move to an offset returned by [`position`](Self::position).
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(self.base + pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Give back the wrapped stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn ensure(&self, needed: u64) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                needed,
                available,
            });
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len() as u64;
        self.ensure(needed)?;
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += needed;
                Ok(())
            }
            // The stream shrank underneath us
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::TruncatedInput {
                offset: self.pos,
                needed,
                available: self.remaining(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure(len as u64)?;
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read everything up to the end of the stream.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let len = usize::try_from(self.remaining())
            .map_err(|_| Error::mismatch("remaining stream does not fit in memory"))?;
        self.read_bytes(len)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(&self.read_array::<2>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(&self.read_array::<4>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(&self.read_array::<4>()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(&self.read_array::<8>()?))
    }

    /// Read `count` fixed-size records of `N` bytes each in one block.
    pub fn read_records<T, const N: usize>(
        &mut self,
        count: usize,
        decode: impl Fn(&[u8; N]) -> T,
    ) -> Result<Vec<T>> {
        let total = count
            .checked_mul(N)
            .ok_or_else(|| Error::mismatch(format!("{count} records of {N} bytes overflow")))?;
        let block = self.read_bytes(total)?;
        Ok(block
            .chunks_exact(N)
            .filter_map(|chunk| <&[u8; N]>::try_from(chunk).ok())
            .map(decode)
            .collect())
    }

    pub fn read_u32_list(&mut self, count: usize) -> Result<Vec<u32>> {
        self.read_records::<_, 4>(count, |b| LittleEndian::read_u32(b))
    }

    pub fn read_i32_list(&mut self, count: usize) -> Result<Vec<i32>> {
        self.read_records::<_, 4>(count, |b| LittleEndian::read_i32(b))
    }

    pub fn read_i16_list(&mut self, count: usize) -> Result<Vec<i16>> {
        self.read_records::<_, 2>(count, |b| LittleEndian::read_i16(b))
    }

    /// Read `count` runs of `M` little-endian `f32` values.
    pub fn read_f32_arrays<const M: usize>(&mut self, count: usize) -> Result<Vec<[f32; M]>> {
        let total = count
            .checked_mul(M * 4)
            .ok_or_else(|| Error::mismatch(format!("{count} float arrays overflow")))?;
        let block = self.read_bytes(total)?;
        Ok(block.chunks_exact(M * 4).map(read_f32_array::<M>).collect())
    }
}

/// Decode `M` little-endian `f32` values from the front of `bytes`.
pub(crate) fn read_f32_array<const M: usize>(bytes: &[u8]) -> [f32; M] {
    let mut out = [0f32; M];
    LittleEndian::read_f32_into(&bytes[..M * 4], &mut out);
    out
}

/// Interpret a signed count read from the file.
pub(crate) fn checked_count(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::mismatch(format!("negative {what}: {value}")))
}

/// Convert a list length to the signed 32-bit count used on the wire.
pub(crate) fn wire_count(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::mismatch(format!("{what} {len} exceeds i32 range")))
}
