//! # Transcode CABAC
//!
//! Context-adaptive binary arithmetic coding as used by H.264/AVC, plus the
//! binarizations codecs build on top of it.
//!
//! ## Layers
//!
//! - [`StateTable`] - the 128-entry probability state machine, expanded from
//!   the standardized 64-state base tables
//! - [`ContextState`] / [`ContextArray`] - caller-owned adaptive contexts
//! - [`CabacEncoder`] / [`CabacDecoder`] - the arithmetic core, one type per
//!   direction, writing to a [`BitSink`] or reading from a [`ByteSource`]
//! - [`BinEncoder`] / [`BinDecoder`] - unary, UEGk, exponential symbol and
//!   adaptive Golomb-Rice codes
//!
//! ## Example
//!
//! ```
//! use transcode_cabac::{init_decoder, init_encoder, BinDecoder, BinEncoder, ContextArray, StateTable};
//!
//! let table = StateTable::h264();
//! let mut contexts = ContextArray::new(4);
//! let mut buf = [0u8; 64];
//!
//! let mut encoder = init_encoder(table, &mut buf);
//! encoder.encode_ueg(contexts.as_mut_slice(), -10, 3, true, 0, 2).unwrap();
//! let len = encoder.encode_terminate(true).unwrap();
//!
//! contexts.reset();
//! let mut decoder = init_decoder(table, &buf[..len]).unwrap();
//! assert_eq!(decoder.decode_ueg(contexts.as_mut_slice(), 3, true, 0, 2).unwrap(), -10);
//! assert_eq!(decoder.decode_terminate().unwrap(), len);
//! ```
//!
//! ## Safety
//!
//! All input is bounds-checked by default. The `unchecked` feature exposes
//! [`bitio::PaddedSource`], which trusts the caller to supply a complete,
//! terminated stream.

#![warn(missing_docs)]

pub mod binarization;
pub mod bitio;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod tables;

pub use binarization::{BinDecoder, BinEncoder, SYMBOL_CONTEXTS};
pub use bitio::{BitSink, ByteSource, CheckedSource, SliceSink, VecSink};
pub use context::{ContextArray, ContextState};
pub use decoder::CabacDecoder;
pub use encoder::{CabacEncoder, EncoderConfig};
pub use error::{CabacError, Result};
pub use tables::{StateTable, BASE_STATE_COUNT, MAX_STATES};

/// Build an expanded state table from base tables.
///
/// The result is immutable; build it once and share it between streams.
pub fn init_state_tables(
    lps_range: &[[u8; 4]],
    mps_next: &[u8],
    lps_next: &[u8],
) -> Result<StateTable> {
    StateTable::new(lps_range, mps_next, lps_next)
}

/// Start an encoder writing into `buffer`; the buffer length is the capacity.
pub fn init_encoder<'t, 'a>(table: &'t StateTable, buffer: &'a mut [u8]) -> CabacEncoder<'t, SliceSink<'a>> {
    CabacEncoder::new(table, SliceSink::new(buffer))
}

/// Start a bounds-checked decoder over `bytes`.
pub fn init_decoder<'t, 'a>(table: &'t StateTable, bytes: &'a [u8]) -> Result<CabacDecoder<'t, CheckedSource<'a>>> {
    CabacDecoder::new(table, bytes)
}

/// Return every context to state 0, as at the start of an independent stream.
pub fn reset_context(contexts: &mut [ContextState]) {
    contexts.fill(ContextState::default());
}
