//! Bit-level output sinks and byte-level input sources.
//!
//! The encoder emits single bits through a [`BitSink`]; the decoder pulls
//! whole bytes through a [`ByteSource`]. Both are bounds-checked by default.

use tracing::trace;

use crate::error::{CabacError, Result};

/// Appendable, bit-packed (MSB first) output buffer.
pub trait BitSink {
    /// Append one bit.
    fn put_bit(&mut self, bit: bool) -> Result<()>;

    /// Append the low `n` bits of `value`, most significant first.
    fn put_bits(&mut self, value: u32, n: u32) -> Result<()> {
        debug_assert!(n <= 32);
        for i in (0..n).rev() {
            self.put_bit((value >> i) & 1 != 0)?;
        }
        Ok(())
    }

    /// Zero-pad to the next byte boundary.
    fn align(&mut self) -> Result<()> {
        while self.bits_written() % 8 != 0 {
            self.put_bit(false)?;
        }
        Ok(())
    }

    /// Total bits appended so far.
    fn bits_written(&self) -> u64;

    /// Maximum number of bytes the sink accepts.
    fn capacity(&self) -> usize;

    /// Bytes written so far; the last byte may be partial.
    fn data(&self) -> &[u8];
}

/// Sink writing into a caller-provided fixed buffer.
#[derive(Debug)]
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> SliceSink<'a> {
    /// Create a sink over `buf`; its length is the capacity.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Number of bytes touched, counting a partial last byte.
    pub fn len(&self) -> usize {
        self.byte_pos + usize::from(self.bit_pos != 0)
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BitSink for SliceSink<'_> {
    fn put_bit(&mut self, bit: bool) -> Result<()> {
        let Some(byte) = self.buf.get_mut(self.byte_pos) else {
            trace!(capacity = self.buf.len(), "CABAC sink overflow");
            return Err(CabacError::BufferOverflow {
                capacity: self.buf.len(),
            });
        };
        if self.bit_pos == 0 {
            *byte = 0;
        }
        *byte |= (bit as u8) << (7 - self.bit_pos);
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(())
    }

    fn bits_written(&self) -> u64 {
        self.byte_pos as u64 * 8 + self.bit_pos as u64
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn data(&self) -> &[u8] {
        &self.buf[..self.len()]
    }
}

/// Growable sink with an upper size limit.
#[derive(Debug, Clone)]
pub struct VecSink {
    data: Vec<u8>,
    bit_pos: u8,
    max_bytes: usize,
}

impl VecSink {
    /// Create a sink that preallocates `initial_capacity` bytes and refuses
    /// to grow past `max_bytes`.
    pub fn new(initial_capacity: usize, max_bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(initial_capacity.min(max_bytes)),
            bit_pos: 0,
            max_bytes,
        }
    }

    /// Create an effectively unbounded sink.
    pub fn unbounded() -> Self {
        Self::new(0, usize::MAX)
    }

    /// Take the written bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl BitSink for VecSink {
    fn put_bit(&mut self, bit: bool) -> Result<()> {
        if self.bit_pos == 0 {
            if self.data.len() >= self.max_bytes {
                trace!(capacity = self.max_bytes, "CABAC sink overflow");
                return Err(CabacError::BufferOverflow {
                    capacity: self.max_bytes,
                });
            }
            self.data.push(0);
        }
        if let Some(last) = self.data.last_mut() {
            *last |= (bit as u8) << (7 - self.bit_pos);
        }
        self.bit_pos = (self.bit_pos + 1) & 7;
        Ok(())
    }

    fn bits_written(&self) -> u64 {
        let partial = if self.bit_pos == 0 { 0 } else { 8 - self.bit_pos as u64 };
        self.data.len() as u64 * 8 - partial
    }

    fn capacity(&self) -> usize {
        self.max_bytes
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Byte-granular input for the decoder.
///
/// Implementations must yield identical bytes; they differ only in how
/// running off the end is handled.
pub trait ByteSource {
    /// Pull the next byte.
    fn next_byte(&mut self) -> Result<u8>;

    /// Bytes pulled so far.
    fn position(&self) -> usize;

    /// Bytes left in the input.
    fn remaining(&self) -> usize;
}

/// Bounds-checked source over a byte slice. Reading past the end is a
/// [`CabacError::BufferUnderrun`].
#[derive(Debug, Clone)]
pub struct CheckedSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CheckedSource<'a> {
    /// Create a source over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSource for CheckedSource<'_> {
    #[inline]
    fn next_byte(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                Ok(byte)
            }
            None => {
                trace!(position = self.pos, "CABAC source underrun");
                Err(CabacError::BufferUnderrun { position: self.pos })
            }
        }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Source that skips bounds checks and trusts the caller's padding.
///
/// Only available with the `unchecked` feature.
#[cfg(feature = "unchecked")]
#[derive(Debug, Clone)]
pub struct PaddedSource<'a> {
    data: &'a [u8],
    pos: usize,
}

#[cfg(feature = "unchecked")]
impl<'a> PaddedSource<'a> {
    /// Create an unchecked source over `data`.
    ///
    /// # Safety
    ///
    /// `data` must hold a complete stream ending in a terminate symbol, and
    /// the caller must stop decoding once [`decode_terminate`] reports the
    /// end. A corrupt or truncated stream makes the decoder read past `data`.
    ///
    /// [`decode_terminate`]: crate::CabacDecoder::decode_terminate
    pub unsafe fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

#[cfg(feature = "unchecked")]
impl ByteSource for PaddedSource<'_> {
    #[inline]
    fn next_byte(&mut self) -> Result<u8> {
        debug_assert!(self.pos < self.data.len(), "padded source overrun");
        // SAFETY: the constructor's contract keeps `pos` inside `data`.
        let byte = unsafe { *self.data.get_unchecked(self.pos) };
        self.pos += 1;
        Ok(byte)
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}
