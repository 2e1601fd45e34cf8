//! CABAC arithmetic decoder.
//!
//! The 9-bit offset is kept in `low` scaled by 2^8; the eight bits below it
//! hold not-yet-consumed lookahead from the source, so the source is read
//! a whole byte at a time.

use tracing::debug;

use crate::binarization::BinDecoder;
use crate::bitio::{ByteSource, CheckedSource};
use crate::context::ContextState;
use crate::error::{CabacError, Result};
use crate::tables::StateTable;

/// Bits of lookahead held below the offset.
pub const LOOKAHEAD_BITS: u32 = 8;

/// Initial interval width, scaled.
pub const DECODER_INITIAL_RANGE: u32 = 0x1FE << LOOKAHEAD_BITS;

/// The interval is renormalized whenever `range` drops below this.
pub const DECODER_RENORM_THRESHOLD: u32 = 0x100 << LOOKAHEAD_BITS;

/// CABAC decoder reading from a [`ByteSource`].
#[derive(Debug)]
pub struct CabacDecoder<'t, S> {
    table: &'t StateTable,
    source: S,
    /// Scaled offset plus lookahead.
    low: u32,
    /// Scaled interval width.
    range: u32,
    /// Lookahead bits left before the next byte is needed.
    bits_left: u32,
    terminated: bool,
}

impl<'t, 'a> CabacDecoder<'t, CheckedSource<'a>> {
    /// Create a bounds-checked decoder over `data`.
    pub fn new(table: &'t StateTable, data: &'a [u8]) -> Result<Self> {
        Self::with_source(table, CheckedSource::new(data))
    }
}

impl<'t, S: ByteSource> CabacDecoder<'t, S> {
    /// Create a decoder over an arbitrary byte source.
    ///
    /// Reads the first two bytes to seed the offset.
    pub fn with_source(table: &'t StateTable, mut source: S) -> Result<Self> {
        debug!(input_bytes = source.remaining(), "Initializing CABAC decoder");
        let b0 = source.next_byte()? as u32;
        let b1 = source.next_byte()? as u32;
        let low = (b0 << 9) + (b1 << 1);
        if low >= DECODER_INITIAL_RANGE {
            return Err(CabacError::CorruptStream(format!(
                "initial offset {} outside the coding interval",
                low >> LOOKAHEAD_BITS
            )));
        }

        Ok(Self {
            table,
            source,
            low,
            range: DECODER_INITIAL_RANGE,
            bits_left: LOOKAHEAD_BITS - 1,
            terminated: false,
        })
    }

    /// Decode one bit with the probability model in `ctx`, updating the model.
    pub fn decode_context_bit(&mut self, ctx: &mut ContextState) -> Result<bool> {
        self.ensure_active()?;
        let state = ctx.index();
        self.table.check(state)?;
        let mps = ctx.mps();

        let range_lps =
            (self.table.lps_range(state, ((self.range >> 14) & 3) as usize) as u32) << LOOKAHEAD_BITS;
        self.range -= range_lps;

        let bit = if self.low < self.range {
            ctx.set(self.table.next_mps(state));
            mps
        } else {
            self.low -= self.range;
            self.range = range_lps;
            ctx.set(self.table.next_lps(state));
            !mps
        };

        self.renormalize()?;
        Ok(bit)
    }

    /// Decode an equiprobable bit.
    pub fn decode_bypass(&mut self) -> Result<bool> {
        self.ensure_active()?;
        self.shift_low()?;
        if self.low < self.range {
            Ok(false)
        } else {
            self.low -= self.range;
            Ok(true)
        }
    }

    /// Check for the end-of-unit flag.
    ///
    /// Returns 0 if the stream continues, otherwise the number of input bytes
    /// the stream occupies. After a nonzero result the decoder is closed.
    pub fn decode_terminate(&mut self) -> Result<usize> {
        self.ensure_active()?;
        self.range -= 2 << LOOKAHEAD_BITS;
        if self.low < self.range {
            self.renormalize()?;
            Ok(0)
        } else {
            self.terminated = true;
            let consumed = self.source.position();
            debug!(bytes = consumed, "CABAC stream terminated");
            Ok(consumed)
        }
    }

    /// Like [`decode_terminate`](Self::decode_terminate), but a continuing
    /// stream is a [`CabacError::TerminationMismatch`].
    pub fn expect_terminate(&mut self) -> Result<usize> {
        match self.decode_terminate()? {
            0 => Err(CabacError::TerminationMismatch {
                position: self.source.position(),
            }),
            consumed => Ok(consumed),
        }
    }

    /// Bytes pulled from the source so far.
    pub fn position(&self) -> usize {
        self.source.position()
    }

    /// Whether the terminate symbol has been decoded.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// State table in use.
    pub fn table(&self) -> &'t StateTable {
        self.table
    }

    /// Consume the decoder and return its source.
    pub fn into_source(self) -> S {
        self.source
    }

    fn ensure_active(&self) -> Result<()> {
        if self.terminated {
            Err(CabacError::Terminated)
        } else {
            Ok(())
        }
    }

    fn renormalize(&mut self) -> Result<()> {
        while self.range < DECODER_RENORM_THRESHOLD {
            self.range <<= 1;
            self.shift_low()?;
        }
        Ok(())
    }

    /// Double `low`, pulling in a fresh byte first if the lookahead is spent.
    ///
    /// The byte lands below the offset, where it cannot affect a comparison
    /// against `range`; it is therefore only fetched once a bit of it is
    /// about to move into the offset.
    #[inline]
    fn shift_low(&mut self) -> Result<()> {
        if self.bits_left == 0 {
            self.low += self.source.next_byte()? as u32;
            self.bits_left = LOOKAHEAD_BITS;
        }
        self.low <<= 1;
        self.bits_left -= 1;
        Ok(())
    }
}

impl<S: ByteSource> BinDecoder for CabacDecoder<'_, S> {
    #[inline]
    fn decode_context_bit(&mut self, ctx: &mut ContextState) -> Result<bool> {
        CabacDecoder::decode_context_bit(self, ctx)
    }

    #[inline]
    fn decode_bypass(&mut self) -> Result<bool> {
        CabacDecoder::decode_bypass(self)
    }
}
