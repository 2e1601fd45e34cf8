#![no_main]

//! Fuzz target for the CABAC decoder.
//!
//! Drives a bounds-checked decoder over arbitrary bytes with an arbitrary
//! sequence of decode operations. Every outcome must be a value or an error.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use transcode_cabac::{BinDecoder, CabacDecoder, ContextState, StateTable, SYMBOL_CONTEXTS};

#[derive(Arbitrary, Debug)]
struct DecoderInput {
    /// Initial context states
    contexts: [u8; SYMBOL_CONTEXTS],
    operations: Vec<DecodeOperation>,
    data: Vec<u8>,
}

#[derive(Arbitrary, Debug, Clone)]
enum DecodeOperation {
    ContextBit(u8),
    Bypass,
    BypassBits(u8),
    Fixed(u8),
    Unary { max: u8, max_ctx: u8, truncated: bool },
    Ueg { max: u8, signed: bool, k: u8, max_ctx: u8 },
    Symbol { signed: bool },
    Symbol2 { log2: i8 },
    Terminate,
}

fuzz_target!(|input: DecoderInput| {
    let mut contexts: Vec<ContextState> = input
        .contexts
        .iter()
        .map(|&s| ContextState::new(s & 0x7F).unwrap_or_default())
        .collect();

    let Ok(mut decoder) = CabacDecoder::new(StateTable::h264(), &input.data) else {
        return;
    };

    for op in input.operations.iter().take(256) {
        let result = match *op {
            DecodeOperation::ContextBit(ctx) => decoder
                .decode_context_bit(&mut contexts[ctx as usize % SYMBOL_CONTEXTS])
                .map(drop),
            DecodeOperation::Bypass => decoder.decode_bypass().map(drop),
            DecodeOperation::BypassBits(n) => decoder.decode_bypass_bits(n as u32 % 33).map(drop),
            DecodeOperation::Fixed(n) => decoder.decode_fixed(&mut contexts, n as u32 % 33).map(drop),
            DecodeOperation::Unary { max, max_ctx, truncated } => decoder
                .decode_unary(&mut contexts, max as u32, max_ctx as usize % SYMBOL_CONTEXTS, truncated)
                .map(drop),
            DecodeOperation::Ueg { max, signed, k, max_ctx } => decoder
                .decode_ueg(&mut contexts, max as u32, signed, k as u32, max_ctx as usize % SYMBOL_CONTEXTS)
                .map(drop),
            DecodeOperation::Symbol { signed } => decoder.decode_symbol(&mut contexts, signed).map(drop),
            DecodeOperation::Symbol2 { log2 } => decoder.decode_symbol2(&mut contexts, log2 as i32).map(drop),
            DecodeOperation::Terminate => match decoder.decode_terminate() {
                Ok(consumed) => {
                    assert!(consumed <= input.data.len());
                    if consumed > 0 {
                        break;
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if result.is_err() {
            break;
        }
    }
});
