//! Binarizations built on the arithmetic coding primitives.
//!
//! Every routine here is a provided method on [`BinEncoder`] / [`BinDecoder`]
//! and only uses the two required primitives, so any coder implementing
//! them gets the full set. Context slices passed in start at the syntax
//! element's base context; offsets below are relative to that base.

use crate::context::{context_at, ContextState};
use crate::error::{CabacError, Result};

/// Contexts used by [`BinEncoder::encode_symbol`] and
/// [`BinEncoder::encode_symbol2`].
pub const SYMBOL_CONTEXTS: usize = 32;

/// Exponent contexts are 1..=10; longer prefixes reuse the last one.
const SYMBOL_EXP_BASE: usize = 1;
/// Sign contexts are 11..=21, chosen by the capped exponent.
const SYMBOL_SIGN_BASE: usize = 11;
/// Mantissa contexts are 22..=31, chosen by bit position.
const SYMBOL_MANTISSA_BASE: usize = 22;
/// Exponent and mantissa context selection saturates here.
const SYMBOL_CONTEXT_CAP: u32 = 9;

/// Lowest starting order accepted by the adaptive Golomb-Rice code.
pub const MIN_SYMBOL2_LOG2: i32 = -4;

fn require_symbol_contexts(contexts: &[ContextState]) -> Result<()> {
    if contexts.len() < SYMBOL_CONTEXTS {
        return Err(CabacError::InvalidContext {
            index: SYMBOL_CONTEXTS - 1,
            len: contexts.len(),
        });
    }
    Ok(())
}

/// Escape-group context of the adaptive Golomb-Rice code, if it exists.
fn symbol2_escape_index(log2: i32) -> Option<usize> {
    usize::try_from(4 + log2).ok().filter(|&i| i < SYMBOL_CONTEXTS)
}

fn check_symbol2_order(log2: i32) -> Result<()> {
    if log2 < MIN_SYMBOL2_LOG2 || symbol2_escape_index(log2).is_none() {
        return Err(CabacError::InvalidParameter(format!(
            "Golomb-Rice order {} outside {}..={}",
            log2,
            MIN_SYMBOL2_LOG2,
            SYMBOL_CONTEXTS as i32 - 5
        )));
    }
    Ok(())
}

/// Largest value the adaptive Golomb-Rice code can carry from order `log2`
/// before it runs out of escape contexts.
fn symbol2_capacity(log2: i32) -> u64 {
    let last = SYMBOL_CONTEXTS as i32 - 5;
    let mut r: u64 = if log2 >= 0 { 1 << log2 } else { 1 };
    let mut total = 0u64;
    for order in log2..last {
        total += r;
        if order + 1 > 0 {
            r <<= 1;
        }
    }
    total + r - 1
}

fn to_signed(magnitude: u64, negative: bool) -> Result<i32> {
    let value = if negative {
        -(magnitude as i64)
    } else {
        magnitude as i64
    };
    i32::try_from(value)
        .map_err(|_| CabacError::CorruptStream(format!("decoded magnitude {} overflows i32", magnitude)))
}

/// Encoding side of the binarization layer.
pub trait BinEncoder {
    /// Encode `bit` with the adaptive model in `ctx`.
    fn encode_context_bit(&mut self, ctx: &mut ContextState, bit: bool) -> Result<()>;

    /// Encode an equiprobable bit.
    fn encode_bypass(&mut self, bit: bool) -> Result<()>;

    /// Encode the low `n` bits of `value` as bypass bits, most significant first.
    fn encode_bypass_bits(&mut self, value: u32, n: u32) -> Result<()> {
        for i in (0..n.min(32)).rev() {
            self.encode_bypass((value >> i) & 1 != 0)?;
        }
        Ok(())
    }

    /// Encode the low `n` bits of `value`, least significant first, each on
    /// its own context `contexts[i]`.
    fn encode_fixed(&mut self, contexts: &mut [ContextState], value: u32, n: u32) -> Result<()> {
        for i in 0..n.min(32) {
            self.encode_context_bit(context_at(contexts, i as usize)?, (value >> i) & 1 != 0)?;
        }
        Ok(())
    }

    /// Truncated unary code: `v` ones then a zero, the zero omitted when
    /// `truncated` and `v == max`. Bit `i` uses context `min(i, max_context_index)`.
    fn encode_unary(
        &mut self,
        contexts: &mut [ContextState],
        v: u32,
        max: u32,
        max_context_index: usize,
        truncated: bool,
    ) -> Result<()> {
        if v > max {
            return Err(CabacError::InvalidParameter(format!(
                "unary value {} exceeds maximum {}",
                v, max
            )));
        }
        for i in 0..v {
            self.encode_context_bit(context_at(contexts, (i as usize).min(max_context_index))?, true)?;
        }
        if !truncated || v < max {
            self.encode_context_bit(context_at(contexts, (v as usize).min(max_context_index))?, false)?;
        }
        Ok(())
    }

    /// Unary prefix capped at `max` followed by a k-th order Exp-Golomb
    /// bypass suffix (UEGk), with an optional bypass sign bit.
    fn encode_ueg(
        &mut self,
        contexts: &mut [ContextState],
        v: i32,
        max: u32,
        is_signed: bool,
        k: u32,
        max_context_index: usize,
    ) -> Result<()> {
        if max == 0 {
            return Err(CabacError::InvalidParameter("UEGk prefix maximum must be at least 1".into()));
        }
        if k > 31 {
            return Err(CabacError::InvalidParameter(format!("Exp-Golomb order {} too large", k)));
        }
        if !is_signed && v < 0 {
            return Err(CabacError::InvalidParameter(format!(
                "negative value {} for unsigned code",
                v
            )));
        }

        if v == 0 {
            return self.encode_context_bit(context_at(contexts, 0)?, false);
        }

        let a = v.unsigned_abs();
        let prefix = a.min(max);
        for i in 0..prefix {
            self.encode_context_bit(context_at(contexts, (i as usize).min(max_context_index))?, true)?;
        }

        if a < max {
            self.encode_context_bit(context_at(contexts, (a as usize).min(max_context_index))?, false)?;
        } else {
            let mut rem = (a - max) as u64;
            let mut m = 1u64 << k;
            while rem >= m {
                self.encode_bypass(true)?;
                rem -= m;
                m <<= 1;
            }
            self.encode_bypass(false)?;
            while m > 1 {
                m >>= 1;
                self.encode_bypass(rem & m != 0)?;
            }
        }

        if is_signed {
            self.encode_bypass(v < 0)?;
        }
        Ok(())
    }

    /// Exponential integer code with every bit context-coded.
    ///
    /// Uses [`SYMBOL_CONTEXTS`] contexts: 0 flags nonzero, 1..=10 code the
    /// exponent in unary, 11..=21 the sign and 22..=31 the mantissa.
    fn encode_symbol(&mut self, contexts: &mut [ContextState], v: i32, is_signed: bool) -> Result<()> {
        require_symbol_contexts(contexts)?;
        if !is_signed && v < 0 {
            return Err(CabacError::InvalidParameter(format!(
                "negative value {} for unsigned symbol",
                v
            )));
        }

        if v == 0 {
            return self.encode_context_bit(&mut contexts[0], false);
        }
        self.encode_context_bit(&mut contexts[0], true)?;

        let a = v.unsigned_abs();
        let e = a.ilog2();
        for i in 0..e {
            let idx = SYMBOL_EXP_BASE + i.min(SYMBOL_CONTEXT_CAP) as usize;
            self.encode_context_bit(&mut contexts[idx], true)?;
        }
        let idx = SYMBOL_EXP_BASE + e.min(SYMBOL_CONTEXT_CAP) as usize;
        self.encode_context_bit(&mut contexts[idx], false)?;

        for i in (0..e).rev() {
            let idx = SYMBOL_MANTISSA_BASE + i.min(SYMBOL_CONTEXT_CAP) as usize;
            self.encode_context_bit(&mut contexts[idx], (a >> i) & 1 != 0)?;
        }

        if is_signed {
            let idx = SYMBOL_SIGN_BASE + e.min(SYMBOL_CONTEXT_CAP + 1) as usize;
            self.encode_context_bit(&mut contexts[idx], v < 0)?;
        }
        Ok(())
    }

    /// Adaptive Golomb-Rice code for non-negative values.
    ///
    /// Starting at order `log2`, each context-coded 1 on context `4 + log2`
    /// removes one bucket of size `2^log2` and raises the order; the
    /// remainder follows in `log2` context-coded bits (contexts `31 - i`).
    fn encode_symbol2(&mut self, contexts: &mut [ContextState], v: u32, log2: i32) -> Result<()> {
        require_symbol_contexts(contexts)?;
        check_symbol2_order(log2)?;
        let capacity = symbol2_capacity(log2);
        if v as u64 > capacity {
            return Err(CabacError::InvalidParameter(format!(
                "value {} exceeds Golomb-Rice capacity {} at order {}",
                v, capacity, log2
            )));
        }

        let mut log2 = log2;
        let mut r: u64 = if log2 >= 0 { 1 << log2 } else { 1 };
        let mut v = v as u64;

        while v >= r {
            self.encode_context_bit(&mut contexts[4 + log2 as usize], true)?;
            v -= r;
            log2 += 1;
            if log2 > 0 {
                r <<= 1;
            }
        }
        self.encode_context_bit(&mut contexts[4 + log2 as usize], false)?;

        for i in (0..log2.max(0)).rev() {
            self.encode_context_bit(&mut contexts[31 - i as usize], (v >> i) & 1 != 0)?;
        }
        Ok(())
    }
}

/// Decoding side of the binarization layer; mirrors [`BinEncoder`] exactly.
pub trait BinDecoder {
    /// Decode a bit with the adaptive model in `ctx`.
    fn decode_context_bit(&mut self, ctx: &mut ContextState) -> Result<bool>;

    /// Decode an equiprobable bit.
    fn decode_bypass(&mut self) -> Result<bool>;

    /// Decode `n` bypass bits, most significant first.
    fn decode_bypass_bits(&mut self, n: u32) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..n.min(32) {
            value = (value << 1) | self.decode_bypass()? as u32;
        }
        Ok(value)
    }

    /// Decode `n` context-coded bits, least significant first.
    fn decode_fixed(&mut self, contexts: &mut [ContextState], n: u32) -> Result<u32> {
        let mut value = 0u32;
        for i in 0..n.min(32) {
            if self.decode_context_bit(context_at(contexts, i as usize)?)? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    /// Decode a truncated unary code.
    fn decode_unary(
        &mut self,
        contexts: &mut [ContextState],
        max: u32,
        max_context_index: usize,
        truncated: bool,
    ) -> Result<u32> {
        for i in 0..max {
            if !self.decode_context_bit(context_at(contexts, (i as usize).min(max_context_index))?)? {
                return Ok(i);
            }
        }
        if truncated {
            return Ok(max);
        }
        if self.decode_context_bit(context_at(contexts, (max as usize).min(max_context_index))?)? {
            return Err(CabacError::CorruptStream(format!("unary code longer than {}", max)));
        }
        Ok(max)
    }

    /// Decode a UEGk value.
    fn decode_ueg(
        &mut self,
        contexts: &mut [ContextState],
        max: u32,
        is_signed: bool,
        k: u32,
        max_context_index: usize,
    ) -> Result<i32> {
        if max == 0 {
            return Err(CabacError::InvalidParameter("UEGk prefix maximum must be at least 1".into()));
        }
        if k > 31 {
            return Err(CabacError::InvalidParameter(format!("Exp-Golomb order {} too large", k)));
        }

        if !self.decode_context_bit(context_at(contexts, 0)?)? {
            return Ok(0);
        }

        let mut value = max as u64;
        for i in 1..max {
            if !self.decode_context_bit(context_at(contexts, (i as usize).min(max_context_index))?)? {
                value = i as u64;
                break;
            }
        }

        if value == max as u64 {
            let mut m = 1u64 << k;
            while self.decode_bypass()? {
                value += m;
                m <<= 1;
                if m > 1 << 32 {
                    return Err(CabacError::CorruptStream("Exp-Golomb escape too long".into()));
                }
            }
            let mut rem = 0u64;
            while m > 1 {
                m >>= 1;
                rem = (rem << 1) | self.decode_bypass()? as u64;
            }
            value += rem;
        }

        let negative = is_signed && self.decode_bypass()?;
        to_signed(value, negative)
    }

    /// Decode an exponential integer symbol.
    fn decode_symbol(&mut self, contexts: &mut [ContextState], is_signed: bool) -> Result<i32> {
        require_symbol_contexts(contexts)?;
        if !self.decode_context_bit(&mut contexts[0])? {
            return Ok(0);
        }

        let mut e = 0u32;
        while self.decode_context_bit(&mut contexts[SYMBOL_EXP_BASE + e.min(SYMBOL_CONTEXT_CAP) as usize])? {
            e += 1;
            if e > 31 {
                return Err(CabacError::CorruptStream("symbol exponent too large".into()));
            }
        }

        let mut a = 1u64;
        for i in (0..e).rev() {
            let bit = self.decode_context_bit(&mut contexts[SYMBOL_MANTISSA_BASE + i.min(SYMBOL_CONTEXT_CAP) as usize])?;
            a = (a << 1) | bit as u64;
        }

        let negative = is_signed
            && self.decode_context_bit(&mut contexts[SYMBOL_SIGN_BASE + e.min(SYMBOL_CONTEXT_CAP + 1) as usize])?;
        to_signed(a, negative)
    }

    /// Decode an adaptive Golomb-Rice value starting at order `log2`.
    fn decode_symbol2(&mut self, contexts: &mut [ContextState], log2: i32) -> Result<u32> {
        require_symbol_contexts(contexts)?;
        check_symbol2_order(log2)?;

        let mut log2 = log2;
        let mut r: u64 = if log2 >= 0 { 1 << log2 } else { 1 };
        let mut v = 0u64;
        let overrun = || CabacError::CorruptStream("Golomb-Rice escape too long".into());

        loop {
            let idx = symbol2_escape_index(log2).ok_or_else(overrun)?;
            if !self.decode_context_bit(&mut contexts[idx])? {
                break;
            }
            v += r;
            log2 += 1;
            if log2 > 0 {
                r <<= 1;
            }
        }

        for i in (0..log2.max(0)).rev() {
            if self.decode_context_bit(&mut contexts[31 - i as usize])? {
                v += 1 << i;
            }
        }

        u32::try_from(v).map_err(|_| CabacError::CorruptStream(format!("Golomb-Rice value {} overflows u32", v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records bins without arithmetic coding. Contexts are preset to their
    /// own offset and never updated, so a context's state names it.
    #[derive(Default)]
    struct BinLog {
        bins: Vec<(Option<u8>, bool)>,
    }

    impl BinEncoder for BinLog {
        fn encode_context_bit(&mut self, ctx: &mut ContextState, bit: bool) -> Result<()> {
            self.bins.push((Some(ctx.index()), bit));
            Ok(())
        }

        fn encode_bypass(&mut self, bit: bool) -> Result<()> {
            self.bins.push((None, bit));
            Ok(())
        }
    }

    fn log_bins(f: impl FnOnce(&mut BinLog, &mut [ContextState]) -> Result<()>) -> Vec<(Option<u8>, bool)> {
        let mut contexts: Vec<ContextState> = (0..SYMBOL_CONTEXTS as u8).filter_map(ContextState::new).collect();
        let mut log = BinLog::default();
        f(&mut log, &mut contexts).unwrap();
        log.bins
    }

    #[test]
    fn test_unary_context_advance() {
        let bins = log_bins(|log, ctx| log.encode_unary(ctx, 4, 8, 2, false));
        assert_eq!(
            bins,
            vec![
                (Some(0), true),
                (Some(1), true),
                (Some(2), true),
                (Some(2), true),
                (Some(2), false),
            ]
        );
    }

    #[test]
    fn test_truncated_unary_omits_terminator() {
        let bins = log_bins(|log, ctx| log.encode_unary(ctx, 3, 3, 5, true));
        assert_eq!(bins.len(), 3);
        assert!(bins.iter().all(|&(_, bit)| bit));
    }

    #[test]
    fn test_unary_rejects_value_above_max() {
        let mut contexts = [ContextState::default(); 4];
        let mut log = BinLog::default();
        assert!(matches!(
            log.encode_unary(&mut contexts, 5, 4, 3, true),
            Err(CabacError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_ueg_escape_layout() {
        // v = 10, max = 3, k = 0: three prefix ones, remainder 7 spans the
        // groups 1 + 2 + 4, leaving 0 in a 3-bit suffix, then the sign.
        let bins = log_bins(|log, ctx| log.encode_ueg(ctx, -10, 3, true, 0, 2));
        let expected = vec![
            (Some(0), true),
            (Some(1), true),
            (Some(2), true),
            (None, true),
            (None, true),
            (None, true),
            (None, false),
            (None, false),
            (None, false),
            (None, false),
            (None, true),
        ];
        assert_eq!(bins, expected);
    }

    #[test]
    fn test_ueg_short_value_uses_contexts_only() {
        let bins = log_bins(|log, ctx| log.encode_ueg(ctx, 2, 14, false, 0, 4));
        assert_eq!(bins, vec![(Some(0), true), (Some(1), true), (Some(2), false)]);
    }

    #[test]
    fn test_ueg_rejects_bad_parameters() {
        let mut contexts = [ContextState::default(); 4];
        let mut log = BinLog::default();
        assert!(log.encode_ueg(&mut contexts, 1, 0, false, 0, 1).is_err());
        assert!(log.encode_ueg(&mut contexts, -1, 3, false, 0, 1).is_err());
        assert!(log.encode_ueg(&mut contexts, 1, 3, false, 32, 1).is_err());
    }

    #[test]
    fn test_symbol_context_layout() {
        // 13 = 0b1101: exponent 3, mantissa 101.
        let bins = log_bins(|log, ctx| log.encode_symbol(ctx, -13, true));
        assert_eq!(
            bins,
            vec![
                (Some(0), true),
                (Some(1), true),
                (Some(2), true),
                (Some(3), true),
                (Some(4), false),
                (Some(24), true),
                (Some(23), false),
                (Some(22), true),
                (Some(14), true),
            ]
        );
    }

    #[test]
    fn test_symbol_large_exponent_reuses_contexts() {
        let bins = log_bins(|log, ctx| log.encode_symbol(ctx, 1 << 12, false));
        let exponent: Vec<_> = bins[1..14].iter().map(|&(c, _)| c.unwrap()).collect();
        assert_eq!(exponent, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10]);
        assert_eq!(bins[14].0, Some(31));
        assert_eq!(bins.last().unwrap().0, Some(22));
    }

    #[test]
    fn test_symbol_needs_full_context_set() {
        let mut contexts = [ContextState::default(); 8];
        let mut log = BinLog::default();
        assert!(matches!(
            log.encode_symbol(&mut contexts, 1, false),
            Err(CabacError::InvalidContext { index: 31, len: 8 })
        ));
    }

    #[test]
    fn test_symbol2_layout() {
        // Order 1: buckets 2, 4 are removed from 7, leaving 1 in 3 bits.
        let bins = log_bins(|log, ctx| log.encode_symbol2(ctx, 7, 1));
        assert_eq!(
            bins,
            vec![
                (Some(5), true),
                (Some(6), true),
                (Some(7), false),
                (Some(29), false),
                (Some(30), false),
                (Some(31), true),
            ]
        );
    }

    #[test]
    fn test_symbol2_negative_order() {
        let bins = log_bins(|log, ctx| log.encode_symbol2(ctx, 2, -2));
        assert_eq!(bins, vec![(Some(2), true), (Some(3), true), (Some(4), false)]);
    }

    #[test]
    fn test_symbol2_rejects_order_out_of_range() {
        let mut contexts = [ContextState::default(); SYMBOL_CONTEXTS];
        let mut log = BinLog::default();
        assert!(log.encode_symbol2(&mut contexts, 1, -5).is_err());
        assert!(log.encode_symbol2(&mut contexts, 1, 28).is_err());
        assert!(log.encode_symbol2(&mut contexts, 1, 27).is_ok());
    }

    #[test]
    fn test_symbol2_capacity_bounds() {
        assert_eq!(symbol2_capacity(27), (1 << 27) - 1);
        assert_eq!(symbol2_capacity(0), (1 << 28) - 2);
        assert_eq!(symbol2_capacity(-4), (1 << 28) + 2);
    }

    #[test]
    fn test_symbol2_oversized_value_writes_nothing() {
        use crate::encoder::{CabacEncoder, EncoderConfig};
        use crate::tables::StateTable;

        let mut contexts = [ContextState::default(); SYMBOL_CONTEXTS];
        let mut enc = CabacEncoder::with_config(StateTable::h264(), &EncoderConfig::default());
        enc.encode_context_bit(&mut contexts[0], true).unwrap();
        let before = contexts;
        let bits = enc.bits_written();
        let pending = enc.pending_bits();

        assert!(matches!(enc.encode_symbol2(&mut contexts, u32::MAX, 0), Err(CabacError::InvalidParameter(_))));
        assert_eq!(contexts, before);
        assert_eq!(enc.bits_written(), bits);
        assert_eq!(enc.pending_bits(), pending);

        let capacity = symbol2_capacity(2) as u32;
        let mut log = BinLog::default();
        assert!(log.encode_symbol2(&mut contexts, capacity + 1, 2).is_err());
        assert!(log.bins.is_empty());
        assert_eq!(log_bins(|log, ctx| log.encode_symbol2(ctx, capacity, 2)).last(), Some(&(Some(31), true)));
    }

    /// Plays back recorded bins, checking each is read from the context
    /// (or bypass path) it was written with.
    struct BinReplay {
        bins: std::vec::IntoIter<(Option<u8>, bool)>,
    }

    impl BinDecoder for BinReplay {
        fn decode_context_bit(&mut self, ctx: &mut ContextState) -> Result<bool> {
            match self.bins.next() {
                Some((Some(index), bit)) if index == ctx.index() => Ok(bit),
                other => Err(CabacError::CorruptStream(format!("unexpected bin {:?}", other))),
            }
        }

        fn decode_bypass(&mut self) -> Result<bool> {
            match self.bins.next() {
                Some((None, bit)) => Ok(bit),
                other => Err(CabacError::CorruptStream(format!("unexpected bin {:?}", other))),
            }
        }
    }

    fn replay(bins: Vec<(Option<u8>, bool)>) -> (BinReplay, Vec<ContextState>) {
        let contexts = (0..SYMBOL_CONTEXTS as u8).filter_map(ContextState::new).collect();
        (BinReplay { bins: bins.into_iter() }, contexts)
    }

    #[test]
    fn test_decoders_mirror_encoders() {
        let (mut r, mut ctx) = replay(log_bins(|log, ctx| log.encode_ueg(ctx, -10, 3, true, 0, 2)));
        assert_eq!(r.decode_ueg(&mut ctx, 3, true, 0, 2), Ok(-10));
        assert!(r.bins.next().is_none());

        let (mut r, mut ctx) = replay(log_bins(|log, ctx| log.encode_symbol(ctx, -13, true)));
        assert_eq!(r.decode_symbol(&mut ctx, true), Ok(-13));
        assert!(r.bins.next().is_none());

        let (mut r, mut ctx) = replay(log_bins(|log, ctx| log.encode_symbol2(ctx, 7, 1)));
        assert_eq!(r.decode_symbol2(&mut ctx, 1), Ok(7));
        assert!(r.bins.next().is_none());

        let (mut r, mut ctx) = replay(log_bins(|log, ctx| log.encode_unary(ctx, 3, 3, 5, true)));
        assert_eq!(r.decode_unary(&mut ctx, 3, 5, true), Ok(3));
        assert!(r.bins.next().is_none());
    }

    #[test]
    fn test_overlong_unary_is_corrupt() {
        let (mut r, mut ctx) = replay(vec![(Some(0), true), (Some(1), true), (Some(1), true)]);
        assert!(matches!(
            r.decode_unary(&mut ctx, 2, 1, false),
            Err(CabacError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_overlong_symbol_exponent_is_corrupt() {
        let mut bins = vec![(Some(0), true)];
        bins.extend((0..40u8).map(|i| (Some(1 + i.min(9)), true)));
        let (mut r, mut ctx) = replay(bins);
        assert!(matches!(
            r.decode_symbol(&mut ctx, false),
            Err(CabacError::CorruptStream(_))
        ));
    }
}
