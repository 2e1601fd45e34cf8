#![no_main]

//! Fuzz target for encode/decode symmetry.
//!
//! Encodes an arbitrary operation sequence and checks that decoding the
//! stream reproduces every value and the final context states.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use transcode_cabac::{
    BinDecoder, BinEncoder, CabacDecoder, CabacEncoder, ContextState, EncoderConfig, StateTable, SYMBOL_CONTEXTS,
};

#[derive(Arbitrary, Debug, Clone)]
enum EncodeOperation {
    ContextBit(u8, bool),
    Bypass(bool),
    Ueg(i32, u8, u8),
    Symbol(i32),
    Continue,
}

fuzz_target!(|ops: Vec<EncodeOperation>| {
    let mut enc_contexts = vec![ContextState::default(); SYMBOL_CONTEXTS];
    let mut encoder = CabacEncoder::with_config(StateTable::h264(), &EncoderConfig::default());

    for op in &ops {
        let result = match *op {
            EncodeOperation::ContextBit(ctx, bit) => {
                encoder.encode_context_bit(&mut enc_contexts[ctx as usize % SYMBOL_CONTEXTS], bit)
            }
            EncodeOperation::Bypass(bit) => encoder.encode_bypass(bit),
            EncodeOperation::Ueg(v, max, k) => {
                encoder.encode_ueg(&mut enc_contexts, v, (max as u32 % 16).max(1), true, k as u32 % 8, 8)
            }
            EncodeOperation::Symbol(v) => encoder.encode_symbol(&mut enc_contexts, v, true),
            EncodeOperation::Continue => encoder.encode_terminate(false).map(drop),
        };
        assert!(result.is_ok(), "encoding failed: {:?}", result);
    }
    let len = encoder.encode_terminate(true).expect("terminate");
    let data = encoder.into_sink().into_vec();

    let mut contexts = vec![ContextState::default(); SYMBOL_CONTEXTS];
    let mut decoder = CabacDecoder::new(StateTable::h264(), &data).expect("decoder init");
    for op in &ops {
        match *op {
            EncodeOperation::ContextBit(ctx, bit) => {
                let decoded = decoder.decode_context_bit(&mut contexts[ctx as usize % SYMBOL_CONTEXTS]);
                assert_eq!(decoded, Ok(bit));
            }
            EncodeOperation::Bypass(bit) => assert_eq!(decoder.decode_bypass(), Ok(bit)),
            EncodeOperation::Ueg(v, max, k) => {
                let decoded = decoder.decode_ueg(&mut contexts, (max as u32 % 16).max(1), true, k as u32 % 8, 8);
                assert_eq!(decoded, Ok(v));
            }
            EncodeOperation::Symbol(v) => assert_eq!(decoder.decode_symbol(&mut contexts, true), Ok(v)),
            EncodeOperation::Continue => assert_eq!(decoder.decode_terminate(), Ok(0)),
        }
    }
    assert_eq!(decoder.decode_terminate(), Ok(len));
    assert_eq!(contexts, enc_contexts);
});
