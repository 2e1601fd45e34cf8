//! CABAC arithmetic encoder.
//!
//! `low` is a 10-bit register and `range` a 9-bit interval width. Bits
//! whose value may still flip through a later carry are counted in
//! `outstanding` and released once the carry question is settled.

use tracing::debug;

use crate::binarization::BinEncoder;
use crate::bitio::{BitSink, VecSink};
use crate::context::ContextState;
use crate::error::{CabacError, Result};
use crate::tables::StateTable;

/// Initial interval width.
pub const ENCODER_INITIAL_RANGE: u32 = 0x1FE;

/// The interval is renormalized whenever `range` drops below this.
pub const ENCODER_RENORM_THRESHOLD: u32 = 0x100;

/// Lower edge of the upper half of the 10-bit `low` register.
const HALF: u32 = 0x200;

/// Encoder buffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderConfig {
    /// Bytes preallocated for the output.
    pub initial_capacity: usize,
    /// Hard limit on the output size in bytes.
    pub max_bytes: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4096,
            max_bytes: usize::MAX,
        }
    }
}

impl EncoderConfig {
    /// Limit the output to `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Preallocate `initial_capacity` bytes.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }
}

/// CABAC encoder writing into a [`BitSink`].
#[derive(Debug)]
pub struct CabacEncoder<'t, S> {
    table: &'t StateTable,
    sink: S,
    /// Interval lower bound (10 bits).
    low: u32,
    /// Interval width (9 bits).
    range: u32,
    /// Deferred bits awaiting carry resolution.
    outstanding: u32,
    /// The first output bit is implied and never written.
    first_bit: bool,
    terminated: bool,
}

impl<'t> CabacEncoder<'t, VecSink> {
    /// Create an encoder with a growable output buffer.
    pub fn with_config(table: &'t StateTable, config: &EncoderConfig) -> Self {
        Self::new(table, VecSink::new(config.initial_capacity, config.max_bytes))
    }
}

impl<'t, S: BitSink> CabacEncoder<'t, S> {
    /// Create an encoder over `sink` using `table`.
    pub fn new(table: &'t StateTable, sink: S) -> Self {
        debug!(capacity = sink.capacity(), "Initializing CABAC encoder");
        Self {
            table,
            sink,
            low: 0,
            range: ENCODER_INITIAL_RANGE,
            outstanding: 0,
            first_bit: true,
            terminated: false,
        }
    }

    /// Encode `bit` with the probability model in `ctx`, updating the model.
    pub fn encode_context_bit(&mut self, ctx: &mut ContextState, bit: bool) -> Result<()> {
        self.ensure_active()?;
        let state = ctx.index();
        self.table.check(state)?;

        let range_lps = self.table.lps_range(state, ((self.range >> 6) & 3) as usize) as u32;
        if bit == ctx.mps() {
            self.range -= range_lps;
            ctx.set(self.table.next_mps(state));
        } else {
            self.low += self.range - range_lps;
            self.range = range_lps;
            ctx.set(self.table.next_lps(state));
        }

        self.renormalize()
    }

    /// Encode an equiprobable bit.
    pub fn encode_bypass(&mut self, bit: bool) -> Result<()> {
        self.ensure_active()?;
        self.low <<= 1;
        if bit {
            self.low += self.range;
        }

        if self.low < HALF {
            self.put_bit(false)?;
        } else if self.low < 2 * HALF {
            self.outstanding += 1;
            self.low -= HALF;
        } else {
            self.put_bit(true)?;
            self.low -= 2 * HALF;
        }
        Ok(())
    }

    /// Encode the end-of-unit flag.
    ///
    /// With `bit == true` the stream is flushed, padded to a byte boundary
    /// and closed. Returns the number of whole bytes written so far, which
    /// after the flush is the full stream length.
    pub fn encode_terminate(&mut self, bit: bool) -> Result<usize> {
        self.ensure_active()?;
        self.range -= 2;
        if bit {
            self.low += self.range;
            self.range = 2;
            self.renormalize()?;
            self.put_bit((self.low >> 9) & 1 != 0)?;
            // Two more bits of low; the last one doubles as the stop bit.
            self.sink.put_bits(((self.low >> 7) & 3) | 1, 2)?;
            self.sink.align()?;
            self.terminated = true;
            debug!(bytes = self.bytes_written(), "CABAC stream terminated");
        } else {
            self.renormalize()?;
        }
        Ok(self.bytes_written())
    }

    /// Bits emitted to the sink, not counting deferred ones.
    pub fn bits_written(&self) -> u64 {
        self.sink.bits_written()
    }

    /// Bits held back until a later carry decides their value.
    pub fn pending_bits(&self) -> u32 {
        self.outstanding
    }

    /// Whole bytes emitted to the sink; a partial trailing byte is not counted.
    pub fn bytes_written(&self) -> usize {
        (self.sink.bits_written() / 8) as usize
    }

    /// Whether the terminate symbol has been written.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Encoded bytes so far.
    pub fn data(&self) -> &[u8] {
        self.sink.data()
    }

    /// State table in use.
    pub fn table(&self) -> &'t StateTable {
        self.table
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the encoder and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_active(&self) -> Result<()> {
        if self.terminated {
            Err(CabacError::Terminated)
        } else {
            Ok(())
        }
    }

    fn renormalize(&mut self) -> Result<()> {
        while self.range < ENCODER_RENORM_THRESHOLD {
            if self.low < ENCODER_RENORM_THRESHOLD {
                self.put_bit(false)?;
            } else if self.low < HALF {
                self.outstanding += 1;
                self.low -= ENCODER_RENORM_THRESHOLD;
            } else {
                self.put_bit(true)?;
                self.low -= HALF;
            }
            self.range <<= 1;
            self.low <<= 1;
        }
        Ok(())
    }

    fn put_bit(&mut self, bit: bool) -> Result<()> {
        if self.first_bit {
            self.first_bit = false;
        } else {
            self.sink.put_bit(bit)?;
        }
        while self.outstanding > 0 {
            self.sink.put_bit(!bit)?;
            self.outstanding -= 1;
        }
        Ok(())
    }
}

impl<S: BitSink> BinEncoder for CabacEncoder<'_, S> {
    #[inline]
    fn encode_context_bit(&mut self, ctx: &mut ContextState, bit: bool) -> Result<()> {
        CabacEncoder::encode_context_bit(self, ctx, bit)
    }

    #[inline]
    fn encode_bypass(&mut self, bit: bool) -> Result<()> {
        CabacEncoder::encode_bypass(self, bit)
    }
}
